//! Account data models and API request/response types.
//!
//! This module defines:
//! - `Account`: Database entity representing a ledger account
//! - `NewAccount`: Values for inserting an account
//! - Request bodies for account creation, deposits, withdrawals and transfers
//! - `AccountResponse` / `BalanceResponse`: Response bodies returned to clients

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Represents an account record from the database.
///
/// # Database Table
///
/// Maps to the `accounts` table. Each account:
/// - Belongs to one user (via `user_id`)
/// - Has a fixed-point balance (`NUMERIC(14, 2)`), never negative once committed
/// - Is only mutated by the ledger service
#[derive(Debug, Clone, PartialEq, sqlx::FromRow, Serialize)]
pub struct Account {
    /// Unique identifier for this account
    pub id: Uuid,

    /// User that owns this account
    ///
    /// Every ledger operation is scoped by this column, so one user can never
    /// see or move another user's money.
    pub user_id: Uuid,

    /// Current balance
    ///
    /// Must be >= 0 (enforced by the ledger and by a database CHECK constraint).
    pub balance: Decimal,

    /// Currency code (ISO 4217, 3 letters)
    pub currency: String,

    /// Soft-delete flag. Deleted accounts are treated as not found.
    pub is_deleted: bool,

    /// Timestamp when account was created
    pub created_at: DateTime<Utc>,

    /// Timestamp of last balance update
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Whether `user_id` owns this account and it is still live.
    pub fn is_owned_by(&self, user_id: Uuid) -> bool {
        self.user_id == user_id && !self.is_deleted
    }
}

/// Values needed to insert an account.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub user_id: Uuid,
    pub balance: Decimal,
    pub currency: String,
}

/// Request body for creating a new account.
///
/// # JSON Example
///
/// ```json
/// {
///   "initial_balance": "0.00"
/// }
/// ```
///
/// The owner is always the authenticated user and the currency is the ledger currency.
#[derive(Debug, Default, Deserialize)]
pub struct CreateAccountRequest {
    /// Initial balance (defaults to 0 if not provided)
    #[serde(default)]
    pub initial_balance: Decimal,
}

/// Request body for deposits and withdrawals.
///
/// # JSON Example
///
/// ```json
/// {
///   "amount": "150.00"
/// }
/// ```
#[derive(Debug, Deserialize)]
pub struct AmountRequest {
    pub amount: Decimal,
}

/// Request to transfer money between accounts.
///
/// # JSON Example
///
/// ```json
/// {
///   "from_account_id": "550e8400-e29b-41d4-a716-446655440000",
///   "to_account_id": "660e8400-e29b-41d4-a716-446655440001",
///   "amount": "75.00"
/// }
/// ```
///
/// # Atomicity Guarantee
///
/// BOTH accounts are updated in the same database transaction.
/// If debit fails, credit doesn't happen. If credit fails, debit is rolled back.
#[derive(Debug, Deserialize)]
pub struct TransferRequest {
    /// Account to transfer from (must belong to the caller)
    pub from_account_id: Uuid,

    /// Account to transfer to (any live account)
    pub to_account_id: Uuid,

    pub amount: Decimal,
}

/// Response body for account endpoints.
///
/// # JSON Example
///
/// ```json
/// {
///   "id": "550e8400-e29b-41d4-a716-446655440000",
///   "balance": "150.00",
///   "currency": "RUB",
///   "created_at": "2025-12-20T10:00:00Z",
///   "updated_at": "2025-12-20T10:00:00Z"
/// }
/// ```
#[derive(Debug, Serialize)]
pub struct AccountResponse {
    pub id: Uuid,
    pub balance: Decimal,
    pub currency: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Convert database Account to API AccountResponse.
///
/// This removes the internal `user_id` and `is_deleted` fields.
impl From<Account> for AccountResponse {
    fn from(account: Account) -> Self {
        Self {
            id: account.id,
            balance: account.balance,
            currency: account.currency,
            created_at: account.created_at,
            updated_at: account.updated_at,
        }
    }
}

/// Balance after a deposit or withdrawal.
#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub account_id: Uuid,
    pub balance: Decimal,
}
