//! User and identity models.
//!
//! Users are registered and authenticated elsewhere. This service only reads
//! them: to resolve the caller of a request and to address payment notifications.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Represents a user record from the database.
///
/// # Database Table
///
/// Maps to the `users` table. The password hash column exists for the
/// login service and is never selected here.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

/// Verified caller of a request.
///
/// Inserted into the request extensions by the auth middleware and extracted
/// by handlers to scope every ledger and card operation to its owner.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Identity {
    pub user_id: Uuid,
    pub email: String,
    pub username: String,
}
