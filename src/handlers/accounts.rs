//! Account management HTTP handlers.
//!
//! This module implements the account-related API endpoints:
//! - POST /api/v1/accounts - Open a new account
//! - GET /api/v1/accounts/:id - Get account by ID
//! - GET /api/v1/accounts - List the caller's accounts

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{
        account::{AccountResponse, CreateAccountRequest},
        user::Identity,
    },
    routes::AppState,
};

/// Open a new account for the authenticated user.
///
/// # Endpoint
///
/// `POST /api/v1/accounts`
///
/// # Request Body
///
/// ```json
/// {
///   "initial_balance": "100.00"  // optional, defaults to 0
/// }
/// ```
///
/// # Response
///
/// - **Success (201 Created)**: Returns the created account
/// - **Error (400)**: Negative or over-precise initial balance
/// - **Error (401)**: Missing or unknown session token
/// - **Error (500)**: Account could not be stored
pub async fn create_account(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(request): Json<CreateAccountRequest>,
) -> Result<(StatusCode, Json<AccountResponse>), AppError> {
    let account = state
        .ledger
        .create_account(identity.user_id, request.initial_balance)
        .await?;

    Ok((StatusCode::CREATED, Json(account.into())))
}

/// Get a specific account by ID.
///
/// Returns 404 if the account doesn't exist, was deleted, OR belongs to a
/// different user (prevents leaking existence of other accounts).
pub async fn get_account(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(account_id): Path<Uuid>,
) -> Result<Json<AccountResponse>, AppError> {
    let account = state
        .ledger
        .get_account(account_id, identity.user_id)
        .await?;

    Ok(Json(account.into()))
}

/// List all live accounts of the authenticated user, oldest first.
pub async fn list_accounts(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<Vec<AccountResponse>>, AppError> {
    let accounts = state.ledger.accounts_for_user(identity.user_id).await?;

    Ok(Json(accounts.into_iter().map(Into::into).collect()))
}
