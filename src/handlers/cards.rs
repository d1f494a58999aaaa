//! Card HTTP handlers.
//!
//! - POST /api/v1/cards - Issue the card of an account
//! - GET /api/v1/cards - List the caller's cards (masked)
//! - POST /api/v1/payments/card - Pay with a card number and code

use axum::{Extension, Json, extract::State, http::StatusCode};

use crate::{
    error::AppError,
    models::{
        card::{
            CardPaymentRequest, CardSummary, IssueCardRequest, IssuedCardResponse, PaymentResponse,
        },
        user::Identity,
    },
    routes::AppState,
};

/// Issue a card for an account the caller owns.
///
/// The plaintext number and code are in this response and nowhere else.
///
/// # Response
///
/// - **Success (201 Created)**: number, code, `MM/YY` expiry
/// - **Error (404)**: account not found or not owned by the caller
/// - **Error (409)**: account already has a card
pub async fn issue_card(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(request): Json<IssueCardRequest>,
) -> Result<(StatusCode, Json<IssuedCardResponse>), AppError> {
    let card = state
        .cards
        .issue_card(identity.user_id, request.account_id)
        .await?;

    Ok((StatusCode::CREATED, Json(card.into())))
}

pub async fn list_cards(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<Vec<CardSummary>>, AppError> {
    let cards = state.cards.cards_for_user(identity.user_id).await?;
    Ok(Json(cards))
}

/// Pay with a card.
///
/// The card authenticates the payment; the session only gates access to
/// the endpoint.
///
/// # Response
///
/// - **Success (200)**: `{ "balance": "380.00" }`
/// - **Error (403)**: wrong code or expired card
/// - **Error (404)**: unknown card number
/// - **Error (422)**: insufficient funds
pub async fn pay_with_card(
    State(state): State<AppState>,
    Extension(_identity): Extension<Identity>,
    Json(request): Json<CardPaymentRequest>,
) -> Result<Json<PaymentResponse>, AppError> {
    let balance = state
        .cards
        .pay_with_card(&request.card_number, &request.code, request.amount)
        .await?;

    Ok(Json(PaymentResponse { balance }))
}
