//! Transaction log models.
//!
//! Every committed balance mutation is documented by exactly one row in the
//! append-only `transactions` table, written inside the same database
//! transaction as the balance update itself.

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of money movement recorded in the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Deposit,
    Withdraw,
    Transfer,
    Payment,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Deposit => "deposit",
            TransactionType::Withdraw => "withdraw",
            TransactionType::Transfer => "transfer",
            TransactionType::Payment => "payment",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for TransactionType {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "deposit" => Ok(TransactionType::Deposit),
            "withdraw" => Ok(TransactionType::Withdraw),
            "transfer" => Ok(TransactionType::Transfer),
            "payment" => Ok(TransactionType::Payment),
            other => Err(format!("unknown transaction type: {other}")),
        }
    }
}

/// Represents a transaction record from the database.
///
/// # Database Table
///
/// Maps to the `transactions` table. Each transaction:
/// - Is immutable once written
/// - Has a strictly positive amount (enforced by CHECK constraint)
/// - For deposits, withdrawals and payments references the same account on both sides
#[derive(Debug, Clone, PartialEq, sqlx::FromRow, Serialize)]
pub struct Transaction {
    /// Unique identifier for this transaction
    pub id: Uuid,

    /// Account debited (or the single account for deposit/withdraw/payment)
    pub from_account_id: Uuid,

    /// Account credited (or the single account for deposit/withdraw/payment)
    pub to_account_id: Uuid,

    pub amount: Decimal,

    #[sqlx(try_from = "String")]
    pub transaction_type: TransactionType,

    /// Currency code (ISO 4217)
    pub currency: String,

    /// When transaction was created
    pub created_at: DateTime<Utc>,
}

/// Values for appending a row to the transaction log.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub from_account_id: Uuid,
    pub to_account_id: Uuid,
    pub amount: Decimal,
    pub transaction_type: TransactionType,
    pub currency: String,
}

impl NewTransaction {
    /// Log entry for an operation touching a single account.
    pub fn single(
        account_id: Uuid,
        amount: Decimal,
        transaction_type: TransactionType,
        currency: &str,
    ) -> Self {
        Self {
            from_account_id: account_id,
            to_account_id: account_id,
            amount,
            transaction_type,
            currency: currency.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(TransactionType::Deposit)]
    #[case(TransactionType::Withdraw)]
    #[case(TransactionType::Transfer)]
    #[case(TransactionType::Payment)]
    fn stored_name_parses_back(#[case] kind: TransactionType) {
        assert_eq!(TransactionType::try_from(kind.to_string()), Ok(kind));
    }

    #[test]
    fn unknown_stored_name_is_rejected() {
        assert!(TransactionType::try_from("credit".to_string()).is_err());
    }
}
