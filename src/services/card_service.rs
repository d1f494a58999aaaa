//! Card service - issuance, listing and card payments.
//!
//! # Card Lifecycle
//!
//! 1. **Issue**: a Luhn-valid 16-digit number and a 3-digit code are generated
//!    for an account the caller owns. Only ciphertext, a keyed index and a code
//!    hash are stored; the plaintext is returned to the caller once.
//! 2. **List**: numbers are decrypted and masked to their last four digits.
//! 3. **Pay**: the card is found by its number index, the code is verified,
//!    and the linked account is debited through the ledger. The owner is then
//!    notified, best-effort.

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Months, Utc};
use rand::Rng;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{
    error::AppError,
    luhn::{self, CARD_NUMBER_LENGTH},
    models::{
        account::Account,
        card::{CardSummary, IssuedCard, NewCard, UNREADABLE_NUMBER, last_four, mask_number},
        notification::PaymentNotification,
    },
    security::{CardVault, CryptoError},
    services::{
        ledger_service::{LedgerService, validate_amount},
        notification_service::{Notifier, NotifyError},
    },
    store::{Conflict, Store, StoreError},
};

/// Issuance gives up after this many card-number collisions in a row.
const MAX_NUMBER_ATTEMPTS: usize = 3;

const EXPIRY_BASE_MONTHS: u32 = 5;
const EXPIRY_JITTER_MONTHS: u32 = 24;

#[derive(Clone)]
pub struct CardService {
    store: Arc<dyn Store>,
    ledger: LedgerService,
    vault: Arc<CardVault>,
    notifier: Arc<dyn Notifier>,
    notify_timeout: Duration,
}

impl CardService {
    pub fn new(
        store: Arc<dyn Store>,
        ledger: LedgerService,
        vault: Arc<CardVault>,
        notifier: Arc<dyn Notifier>,
        notify_timeout: Duration,
    ) -> Self {
        Self {
            store,
            ledger,
            vault,
            notifier,
            notify_timeout,
        }
    }

    /// Issue the card of an account owned by `user_id`.
    ///
    /// # Errors
    ///
    /// - `AccountNotFound`: account absent, deleted or owned by someone else
    /// - `CardAlreadyExists`: the account already has a card, including when a
    ///   concurrent issuance won the race
    pub async fn issue_card(
        &self,
        user_id: Uuid,
        account_id: Uuid,
    ) -> Result<IssuedCard, AppError> {
        let account = self
            .store
            .find_account_for_user(account_id, user_id)
            .await?
            .ok_or(AppError::AccountNotFound)?;

        if self.store.find_card_by_account(account.id).await?.is_some() {
            tracing::warn!(%account_id, "card issuance rejected: account already has a card");
            return Err(AppError::CardAlreadyExists);
        }

        let code = generate_code();
        let code_hash = self.hash_code(code.clone()).await?;
        let jitter = rand::rng().random_range(0..EXPIRY_JITTER_MONTHS);
        let expired_at = expiry_after(Utc::now(), jitter);

        for _ in 0..MAX_NUMBER_ATTEMPTS {
            let number = luhn::generate(CARD_NUMBER_LENGTH);
            let new_card = NewCard {
                account_id: account.id,
                encrypted_number: self.vault.encrypt_number(&number)?,
                number_index: self.vault.number_index(&number),
                code_hash: code_hash.clone(),
                expired_at,
            };

            match self.store.insert_card(new_card).await {
                Ok(card) => {
                    tracing::info!(%account_id, card_id = %card.id, "card issued");
                    return Ok(IssuedCard {
                        id: card.id,
                        account_id: card.account_id,
                        number,
                        code,
                        expired_at: card.expired_at,
                    });
                }
                Err(StoreError::Conflict(Conflict::CardNumber)) => {
                    tracing::warn!(%account_id, "card number collision, regenerating");
                }
                Err(StoreError::Conflict(Conflict::CardForAccount)) => {
                    tracing::warn!(%account_id, "card issuance lost race to a concurrent one");
                    return Err(AppError::CardAlreadyExists);
                }
                Err(e) => return Err(e.into()),
            }
        }

        tracing::error!(%account_id, "card issuance failed: no free card number");
        Err(StoreError::Conflict(Conflict::CardNumber).into())
    }

    /// Cards of every live account owned by `user_id`, with masked numbers.
    ///
    /// A number that fails to decrypt is shown as a fully masked placeholder
    /// instead of failing the whole listing.
    pub async fn cards_for_user(&self, user_id: Uuid) -> Result<Vec<CardSummary>, AppError> {
        let rows = self.store.list_card_summaries_by_user(user_id).await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let masked_number = match self.vault.decrypt_number(&row.encrypted_number) {
                    Ok(number) => mask_number(&number),
                    Err(error) => {
                        tracing::warn!(card_id = %row.id, %error, "stored card number unreadable");
                        UNREADABLE_NUMBER.to_string()
                    }
                };

                CardSummary {
                    id: row.id,
                    account_id: row.account_id,
                    balance: row.balance,
                    currency: row.currency,
                    masked_number,
                    expired_at: row.expired_at,
                    created_at: row.created_at,
                }
            })
            .collect())
    }

    /// Pay `amount` with a card number and its verification code.
    ///
    /// # Process
    ///
    /// 1. Normalise the number and find the card by its keyed index
    /// 2. Verify the code, then the expiry date
    /// 3. Debit the linked account and log a `payment` in one unit
    /// 4. Notify the owner (failures are logged, never returned)
    ///
    /// # Errors
    ///
    /// - `InvalidRequest`: amount not positive
    /// - `CardNotFound`: malformed number or no card with that number
    /// - `InvalidCode`: code does not match
    /// - `CardExpired`: the card is past its expiry date
    /// - `AccountNotFound`: linked account missing or deleted
    /// - `InsufficientFunds`: balance lower than `amount`
    pub async fn pay_with_card(
        &self,
        card_number: &str,
        code: &str,
        amount: Decimal,
    ) -> Result<Decimal, AppError> {
        validate_amount(amount)?;

        let number = normalize_number(card_number).ok_or(AppError::CardNotFound)?;

        let card = self
            .store
            .find_card_by_number_index(&self.vault.number_index(&number))
            .await?
            .ok_or(AppError::CardNotFound)?;

        if !self.verify_code(code.to_string(), card.code_hash.clone()).await? {
            tracing::warn!(card_id = %card.id, "card payment rejected: invalid code");
            return Err(AppError::InvalidCode);
        }

        if card.expired_at <= Utc::now() {
            tracing::warn!(card_id = %card.id, "card payment rejected: card expired");
            return Err(AppError::CardExpired);
        }

        let account = self
            .store
            .find_account(card.account_id)
            .await?
            .ok_or(AppError::AccountNotFound)?;

        let balance = self.ledger.pay(account.id, account.user_id, amount).await?;

        self.notify_owner(&account, last_four(&number), amount, balance)
            .await;

        Ok(balance)
    }

    async fn notify_owner(
        &self,
        account: &Account,
        card_last4: &str,
        amount: Decimal,
        balance: Decimal,
    ) {
        let user = match self.store.find_user(account.user_id).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                tracing::warn!(account_id = %account.id, "payment notification skipped: no owner");
                return;
            }
            Err(error) => {
                tracing::warn!(account_id = %account.id, %error, "payment notification skipped");
                return;
            }
        };

        let notification = PaymentNotification {
            to: user.email,
            name: user.username,
            card_last4: card_last4.to_string(),
            amount,
            balance,
            currency: account.currency.clone(),
            date: Utc::now(),
        };

        let delivery = self.notifier.notify(&notification);
        let outcome = tokio::time::timeout(self.notify_timeout, delivery)
            .await
            .unwrap_or(Err(NotifyError::Timeout));

        if let Err(error) = outcome {
            tracing::warn!(account_id = %account.id, %error, "payment notification failed");
        }
    }

    // Argon2 is CPU-bound, keep it off the async workers
    async fn hash_code(&self, code: String) -> Result<String, AppError> {
        let vault = Arc::clone(&self.vault);
        let hash = tokio::task::spawn_blocking(move || vault.hash_code(&code))
            .await
            .map_err(|_| CryptoError::Hash)??;
        Ok(hash)
    }

    async fn verify_code(&self, code: String, code_hash: String) -> Result<bool, AppError> {
        let vault = Arc::clone(&self.vault);
        let verified = tokio::task::spawn_blocking(move || vault.verify_code(&code, &code_hash))
            .await
            .map_err(|_| CryptoError::Hash)?;
        Ok(verified)
    }
}

/// Random verification code, `001` to `999`.
fn generate_code() -> String {
    format!("{:03}", rand::rng().random_range(1..=999))
}

/// Expiry of a card issued at `issued_at`: 5 months plus `jitter_months`.
fn expiry_after(issued_at: DateTime<Utc>, jitter_months: u32) -> DateTime<Utc> {
    let months = Months::new(EXPIRY_BASE_MONTHS + jitter_months);
    issued_at.checked_add_months(months).unwrap_or(issued_at)
}

/// Strip spaces and dashes. `None` unless the rest is a Luhn-valid 16-digit number.
pub fn normalize_number(input: &str) -> Option<String> {
    let number: String = input.chars().filter(|c| !matches!(c, ' ' | '-')).collect();

    if number.len() == CARD_NUMBER_LENGTH && luhn::is_valid(&number) {
        Some(number)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;

    #[rstest]
    #[case("4111111111111111", Some("4111111111111111"))]
    #[case("4111 1111 1111 1111", Some("4111111111111111"))]
    #[case("4111-1111-1111-1111", Some("4111111111111111"))]
    #[case("4111111111111112", None)]
    #[case("79927398713", None)]
    #[case("4111x11111111111", None)]
    #[case("", None)]
    fn normalizes_card_numbers(#[case] input: &str, #[case] expected: Option<&str>) {
        assert_eq!(normalize_number(input).as_deref(), expected);
    }

    #[test]
    fn codes_are_three_digits_and_never_zero() {
        for _ in 0..200 {
            let code = generate_code();
            assert_eq!(code.len(), 3);
            assert!(code.bytes().all(|b| b.is_ascii_digit()));
            assert_ne!(code, "000");
        }
    }

    #[rstest]
    #[case(0, 2025, 6)]
    #[case(23, 2027, 5)]
    fn expiry_is_five_to_twenty_eight_months_out(
        #[case] jitter: u32,
        #[case] year: i32,
        #[case] month: u32,
    ) {
        let issued_at = Utc.with_ymd_and_hms(2025, 1, 15, 12, 0, 0).unwrap();
        let expiry = expiry_after(issued_at, jitter);

        assert_eq!(expiry, Utc.with_ymd_and_hms(year, month, 15, 12, 0, 0).unwrap());
    }
}
