//! Card models for issuance, listing and payment.
//!
//! # Security
//!
//! - The stored card number is AES-256-GCM ciphertext, never the plaintext PAN
//! - The stored verification code is an Argon2 hash, never the plaintext code
//! - Plaintext number and code are only returned once, by issuance

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Card record from the database.
///
/// # Database Table
///
/// Maps to the `cards` table. `account_id` and `number_index` are both UNIQUE,
/// which is what keeps "one card per account" true under concurrent issuance.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Card {
    pub id: Uuid,
    pub account_id: Uuid,

    /// hex(nonce || ciphertext || tag)
    pub encrypted_number: String,

    /// hex(HMAC-SHA256(index key, PAN)), used for equality lookup by number
    pub number_index: String,

    /// Argon2 PHC string of the verification code
    pub code_hash: String,

    pub expired_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Values for inserting a card.
#[derive(Debug, Clone)]
pub struct NewCard {
    pub account_id: Uuid,
    pub encrypted_number: String,
    pub number_index: String,
    pub code_hash: String,
    pub expired_at: DateTime<Utc>,
}

/// Card joined with its account, as read for listing.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CardSummaryRow {
    pub id: Uuid,
    pub account_id: Uuid,
    pub encrypted_number: String,
    pub balance: Decimal,
    pub currency: String,
    pub expired_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Plaintext card details handed to the caller exactly once.
#[derive(Clone)]
pub struct IssuedCard {
    pub id: Uuid,
    pub account_id: Uuid,
    pub number: String,
    pub code: String,
    pub expired_at: DateTime<Utc>,
}

impl fmt::Debug for IssuedCard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IssuedCard")
            .field("id", &self.id)
            .field("account_id", &self.account_id)
            .field("number", &mask_number(&self.number))
            .field("code", &"***")
            .field("expired_at", &self.expired_at)
            .finish()
    }
}

/// Mask every digit but the last four: `**** **** **** 1234`.
pub fn mask_number(number: &str) -> String {
    format!("{MASK_PREFIX}{}", last_four(number))
}

/// Last four characters of a card number, or an empty string for short input.
pub fn last_four(number: &str) -> &str {
    if number.len() < 4 {
        return "";
    }
    &number[number.len() - 4..]
}

const MASK_PREFIX: &str = "**** **** **** ";

/// Placeholder shown when a stored number cannot be decrypted.
pub const UNREADABLE_NUMBER: &str = "**** **** **** ****";

/// Request to issue a card for an account.
///
/// # JSON Example
///
/// ```json
/// {
///   "account_id": "550e8400-e29b-41d4-a716-446655440000"
/// }
/// ```
#[derive(Debug, Deserialize)]
pub struct IssueCardRequest {
    pub account_id: Uuid,
}

/// Response returned once, when a card is issued.
///
/// # JSON Example
///
/// ```json
/// {
///   "id": "770e8400-e29b-41d4-a716-446655440002",
///   "account_id": "550e8400-e29b-41d4-a716-446655440000",
///   "number": "4000123412341234",
///   "code": "042",
///   "expiry": "05/27",
///   "expired_at": "2027-05-20T10:00:00Z"
/// }
/// ```
#[derive(Serialize)]
pub struct IssuedCardResponse {
    pub id: Uuid,
    pub account_id: Uuid,
    pub number: String,
    pub code: String,
    /// `MM/YY`
    pub expiry: String,
    pub expired_at: DateTime<Utc>,
}

impl From<IssuedCard> for IssuedCardResponse {
    fn from(card: IssuedCard) -> Self {
        Self {
            id: card.id,
            account_id: card.account_id,
            expiry: card.expired_at.format("%m/%y").to_string(),
            number: card.number,
            code: card.code,
            expired_at: card.expired_at,
        }
    }
}

/// Card as listed for its owner. The verification code is never included.
#[derive(Debug, Clone, Serialize)]
pub struct CardSummary {
    pub id: Uuid,
    pub account_id: Uuid,
    pub balance: Decimal,
    pub currency: String,
    pub masked_number: String,
    pub expired_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Request to pay with a card.
///
/// # JSON Example
///
/// ```json
/// {
///   "card_number": "4000 1234 1234 1234",
///   "code": "042",
///   "amount": "120.00"
/// }
/// ```
#[derive(Deserialize)]
pub struct CardPaymentRequest {
    pub card_number: String,
    pub code: String,
    pub amount: Decimal,
}

/// Response after a successful card payment.
#[derive(Debug, Serialize)]
pub struct PaymentResponse {
    pub balance: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_keeps_only_last_four_digits() {
        assert_eq!(mask_number("4000123412345678"), "**** **** **** 5678");
        assert_eq!(last_four("123"), "");
    }

    #[test]
    fn issued_card_debug_output_is_redacted() {
        let card = IssuedCard {
            id: Uuid::new_v4(),
            account_id: Uuid::new_v4(),
            number: "4000123412345678".to_string(),
            code: "042".to_string(),
            expired_at: Utc::now(),
        };

        let debug = format!("{card:?}");
        assert!(!debug.contains("4000123412345678"));
        assert!(!debug.contains("042"));
        assert!(debug.contains("5678"));
    }
}
