//! Session token authentication middleware.
//!
//! This middleware intercepts every protected request to:
//! 1. Extract the session token from the Authorization header
//! 2. Hash it and resolve it to a user through the store
//! 3. Inject the caller's [`Identity`] into the request
//! 4. Reject unauthorized requests with HTTP 401

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use sha2::{Digest, Sha256};

use crate::{error::AppError, models::user::Identity, routes::AppState};

/// Session token authentication middleware function.
///
/// # Flow
///
/// 1. Extract `Authorization: Bearer <token>` header from request
/// 2. Hash the `<token>` using SHA-256
/// 3. Look up an active session with that hash
/// 4. If found: inject `Identity` into request, call next handler
/// 5. If not found: return 401 Unauthorized error
///
/// Handlers extract the result with `Extension<Identity>`.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = request
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .filter(|token| !token.is_empty())
        .ok_or(AppError::Unauthorized)?;

    let token_hash = hash_token(token);

    let identity: Identity = state
        .store
        .find_identity_by_token_hash(&token_hash)
        .await?
        .ok_or(AppError::Unauthorized)?;

    request.extensions_mut().insert(identity);

    Ok(next.run(request).await)
}

/// SHA-256 hex digest of a session token, the form it is stored in.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}
