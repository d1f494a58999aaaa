//! Error types and HTTP error response handling.
//!
//! This module defines all application errors and how they are converted
//! into HTTP responses with appropriate status codes and JSON bodies.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::{security::CryptoError, store::StoreError};

/// Application-wide error type.
///
/// # Error Categories
///
/// - **Domain Errors**: expected outcomes of a ledger or card operation
///   (`AccountNotFound`, `InsufficientFunds`, `CardAlreadyExists`, `CardNotFound`,
///   `InvalidCode`, `CardExpired`). Callers branch on the variant, never on the message.
/// - **Request Errors**: the request itself is malformed or unauthenticated
/// - **Opaque Failures**: storage and encryption errors. The atomic unit they
///   happened in has been rolled back and their detail is never sent to clients.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Account does not exist, is soft-deleted, or doesn't belong to the caller.
    ///
    /// Returns HTTP 404 Not Found.
    #[error("Account not found")]
    AccountNotFound,

    /// Balance is lower than the requested debit.
    ///
    /// Returns HTTP 422 Unprocessable Entity.
    #[error("Insufficient funds")]
    InsufficientFunds,

    /// The account already has a card.
    ///
    /// Returns HTTP 409 Conflict.
    #[error("A card has already been issued for this account")]
    CardAlreadyExists,

    /// No card matches the supplied number.
    ///
    /// Returns HTTP 404 Not Found.
    #[error("Card not found")]
    CardNotFound,

    /// Verification code does not match the stored hash.
    ///
    /// Returns HTTP 403 Forbidden.
    #[error("Invalid card verification code")]
    InvalidCode,

    /// Card expiry date has passed.
    ///
    /// Returns HTTP 403 Forbidden.
    #[error("Card has expired")]
    CardExpired,

    /// Account could not be created.
    ///
    /// Returns HTTP 500 Internal Server Error.
    #[error("Account creation failed")]
    AccountCreationFailed,

    /// Bearer token is missing, unknown, or inactive.
    ///
    /// Returns HTTP 401 Unauthorized.
    #[error("Unauthorized")]
    Unauthorized,

    /// Request body or parameters are invalid.
    ///
    /// Returns HTTP 400 Bad Request.
    /// The String contains details about what was invalid.
    #[error("Invalid request")]
    InvalidRequest(String),

    /// Card number encryption, decryption or code hashing failed.
    #[error("Encryption failure: {0}")]
    Encryption(#[from] CryptoError),

    /// Storage operation failed (connection error, query error, rolled back unit).
    #[error("Persistence failure: {0}")]
    Persistence(#[from] StoreError),
}

impl AppError {
    /// Stable machine-readable code for the response body.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::AccountNotFound => "account_not_found",
            AppError::InsufficientFunds => "insufficient_funds",
            AppError::CardAlreadyExists => "card_already_exists",
            AppError::CardNotFound => "card_not_found",
            AppError::InvalidCode => "invalid_code",
            AppError::CardExpired => "card_expired",
            AppError::AccountCreationFailed => "account_creation_failed",
            AppError::Unauthorized => "unauthorized",
            AppError::InvalidRequest(_) => "invalid_request",
            AppError::Encryption(_) | AppError::Persistence(_) => "internal_error",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::AccountNotFound | AppError::CardNotFound => StatusCode::NOT_FOUND,
            AppError::InsufficientFunds => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::CardAlreadyExists => StatusCode::CONFLICT,
            AppError::InvalidCode | AppError::CardExpired => StatusCode::FORBIDDEN,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            AppError::AccountCreationFailed
            | AppError::Encryption(_)
            | AppError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Convert AppError into an HTTP response.
///
/// # Response Format
///
/// All errors return JSON in this format:
/// ```json
/// {
///   "error": {
///     "code": "error_type",
///     "message": "Human-readable error message"
///   }
/// }
/// ```
///
/// Encryption and persistence failures are logged here and answered with a
/// generic message, so key material and raw SQL errors never reach the client.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();

        let message = match &self {
            AppError::InvalidRequest(msg) => msg.clone(),
            AppError::Encryption(_) | AppError::Persistence(_) => {
                tracing::error!(error = %self, "request failed with internal error");
                "An internal error occurred".to_string()
            }
            _ => self.to_string(),
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}
