//! Balance mutation HTTP handlers.
//!
//! This module implements the ledger mutation endpoints:
//! - POST /api/v1/accounts/:id/deposit - Add money to an account
//! - POST /api/v1/accounts/:id/withdraw - Remove money from an account
//! - POST /api/v1/transfers - Move money between accounts
//!
//! Every mutation is recorded in the transaction log by the ledger service.

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{
        account::{AmountRequest, BalanceResponse, TransferRequest},
        user::Identity,
    },
    routes::AppState,
};

/// Deposit into an account the caller owns.
///
/// # Request Body
///
/// ```json
/// {
///   "amount": "150.00"
/// }
/// ```
///
/// # Response (200)
///
/// ```json
/// {
///   "account_id": "550e8400-...",
///   "balance": "150.00"
/// }
/// ```
pub async fn deposit(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(account_id): Path<Uuid>,
    Json(request): Json<AmountRequest>,
) -> Result<Json<BalanceResponse>, AppError> {
    let balance = state
        .ledger
        .deposit(account_id, identity.user_id, request.amount)
        .await?;

    Ok(Json(BalanceResponse {
        account_id,
        balance,
    }))
}

/// Withdraw from an account the caller owns.
///
/// # Validation
///
/// - Account must have sufficient balance (422 otherwise, nothing changes)
pub async fn withdraw(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(account_id): Path<Uuid>,
    Json(request): Json<AmountRequest>,
) -> Result<Json<BalanceResponse>, AppError> {
    let balance = state
        .ledger
        .withdraw(account_id, identity.user_id, request.amount)
        .await?;

    Ok(Json(BalanceResponse {
        account_id,
        balance,
    }))
}

/// Transfer money between accounts.
///
/// # Atomicity
///
/// Both accounts are updated in a single unit together with one `transfer`
/// log row. Either all of it is committed or none of it.
///
/// # Validation
///
/// - Source account must belong to the caller
/// - Destination may be any live account
/// - Source must have sufficient balance
/// - Accounts must be different
///
/// # Response
///
/// 204 No Content on success.
pub async fn transfer(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(request): Json<TransferRequest>,
) -> Result<StatusCode, AppError> {
    state
        .ledger
        .transfer(
            identity.user_id,
            request.from_account_id,
            request.to_account_id,
            request.amount,
        )
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
