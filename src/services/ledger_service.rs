//! Ledger service - Core business logic for account balances.
//!
//! This service handles:
//! - Account creation
//! - Deposits, withdrawals and card debits on a single account
//! - Transfers between two accounts
//! - Balance validation
//!
//! # Atomicity Guarantees
//!
//! Every balance mutation happens inside one storage unit together with the
//! transaction-log row that documents it. Either both are committed or
//! neither is; an error at any step drops the unit and rolls it back.
//!
//! # Locking
//!
//! Rows are read with the unit's exclusive lock before being changed, so two
//! concurrent withdrawals on one account cannot both pass the balance check.
//! Transfers lock their two accounts in ascending id order whatever the
//! direction, so opposite transfers between the same pair cannot deadlock.

use std::sync::Arc;

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{
        account::{Account, NewAccount},
        transaction::{NewTransaction, Transaction, TransactionType},
    },
    store::{LedgerUnit, Store},
};

/// Largest number of fractional digits an amount may carry.
const MAX_AMOUNT_SCALE: u32 = 2;

/// Largest value a `NUMERIC(14, 2)` column holds: 999 999 999 999.99.
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(0x107A_3FFF, 0x5AF3, 0, false, 2);

#[derive(Clone)]
pub struct LedgerService {
    store: Arc<dyn Store>,
    currency: String,
}

impl LedgerService {
    pub fn new(store: Arc<dyn Store>, currency: impl Into<String>) -> Self {
        Self {
            store,
            currency: currency.into(),
        }
    }

    /// Open an account for a user.
    ///
    /// A non-zero initial balance is recorded as a deposit in the same unit.
    ///
    /// # Errors
    ///
    /// - `InvalidRequest`: initial balance is negative or too precise
    /// - `AccountCreationFailed`: storage rejected the insert
    pub async fn create_account(
        &self,
        user_id: Uuid,
        initial_balance: Decimal,
    ) -> Result<Account, AppError> {
        if initial_balance < Decimal::ZERO {
            return Err(AppError::InvalidRequest(
                "Initial balance cannot be negative".to_string(),
            ));
        }
        if !initial_balance.is_zero() {
            validate_amount(initial_balance)?;
        }

        let account = self
            .insert_account(user_id, initial_balance)
            .await
            .map_err(|error| {
                tracing::error!(%user_id, %error, "account creation failed");
                AppError::AccountCreationFailed
            })?;

        tracing::info!(%user_id, account_id = %account.id, "account created");
        Ok(account)
    }

    async fn insert_account(
        &self,
        user_id: Uuid,
        initial_balance: Decimal,
    ) -> Result<Account, AppError> {
        let mut unit = self.store.begin().await?;

        let account = unit
            .insert_account(NewAccount {
                user_id,
                balance: initial_balance,
                currency: self.currency.clone(),
            })
            .await?;

        if !initial_balance.is_zero() {
            unit.append_transaction(NewTransaction::single(
                account.id,
                initial_balance,
                TransactionType::Deposit,
                &account.currency,
            ))
            .await?;
        }

        unit.commit().await?;
        Ok(account)
    }

    /// Read one account owned by `user_id`.
    pub async fn get_account(&self, account_id: Uuid, user_id: Uuid) -> Result<Account, AppError> {
        self.store
            .find_account_for_user(account_id, user_id)
            .await?
            .ok_or(AppError::AccountNotFound)
    }

    /// All live accounts of a user. Read-only, takes no locks.
    pub async fn accounts_for_user(&self, user_id: Uuid) -> Result<Vec<Account>, AppError> {
        Ok(self.store.list_accounts_by_user(user_id).await?)
    }

    /// Add money to an account owned by `user_id`. Returns the new balance.
    ///
    /// # Errors
    ///
    /// - `InvalidRequest`: amount is not positive
    /// - `AccountNotFound`: account is absent, deleted or owned by someone else
    pub async fn deposit(
        &self,
        account_id: Uuid,
        user_id: Uuid,
        amount: Decimal,
    ) -> Result<Decimal, AppError> {
        self.apply(account_id, user_id, amount, TransactionType::Deposit)
            .await
    }

    /// Remove money from an account owned by `user_id`. Returns the new balance.
    ///
    /// # Errors
    ///
    /// - `InvalidRequest`: amount is not positive
    /// - `AccountNotFound`: account is absent, deleted or owned by someone else
    /// - `InsufficientFunds`: balance is lower than `amount`; nothing is changed
    pub async fn withdraw(
        &self,
        account_id: Uuid,
        user_id: Uuid,
        amount: Decimal,
    ) -> Result<Decimal, AppError> {
        self.apply(account_id, user_id, amount, TransactionType::Withdraw)
            .await
    }

    /// Withdrawal logged as a card payment, in the same unit as the debit.
    pub(crate) async fn pay(
        &self,
        account_id: Uuid,
        user_id: Uuid,
        amount: Decimal,
    ) -> Result<Decimal, AppError> {
        self.apply(account_id, user_id, amount, TransactionType::Payment)
            .await
    }

    async fn apply(
        &self,
        account_id: Uuid,
        user_id: Uuid,
        amount: Decimal,
        kind: TransactionType,
    ) -> Result<Decimal, AppError> {
        validate_amount(amount)?;

        let mut unit = self.store.begin().await?;

        let locked = unit.lock_account(account_id).await?;
        let account = match locked {
            Some(account) if account.is_owned_by(user_id) => account,
            _ => return abort(unit, AppError::AccountNotFound).await,
        };

        let new_balance = match kind {
            TransactionType::Deposit => match credit(account.balance, amount) {
                Ok(balance) => balance,
                Err(error) => return abort(unit, error).await,
            },
            _ if account.balance < amount => {
                tracing::warn!(%account_id, %amount, "{kind} rejected: insufficient funds");
                return abort(unit, AppError::InsufficientFunds).await;
            }
            _ => account.balance - amount,
        };

        unit.update_balance(account.id, new_balance).await?;
        unit.append_transaction(NewTransaction::single(
            account.id,
            amount,
            kind,
            &account.currency,
        ))
        .await?;

        // Commit atomically
        unit.commit().await?;

        tracing::info!(%account_id, %amount, balance = %new_balance, "{kind} committed");
        Ok(new_balance)
    }

    /// Move money from an account owned by `user_id` to any live account.
    ///
    /// # Process
    ///
    /// 1. Check the caller owns the source account
    /// 2. Start a unit and lock both accounts in ascending id order
    /// 3. Re-read both balances under lock and check the source covers `amount`
    /// 4. Debit source, credit destination
    /// 5. Record one `transfer` transaction
    /// 6. Commit (or roll everything back on error)
    ///
    /// # Errors
    ///
    /// - `InvalidRequest`: amount not positive, same account on both sides, or currency mismatch
    /// - `AccountNotFound`: source not owned by caller, or either account missing
    /// - `InsufficientFunds`: source balance is lower than `amount`
    pub async fn transfer(
        &self,
        user_id: Uuid,
        from_account_id: Uuid,
        to_account_id: Uuid,
        amount: Decimal,
    ) -> Result<Transaction, AppError> {
        validate_amount(amount)?;

        if from_account_id == to_account_id {
            return Err(AppError::InvalidRequest(
                "Cannot transfer to same account".to_string(),
            ));
        }

        self.store
            .find_account_for_user(from_account_id, user_id)
            .await?
            .ok_or(AppError::AccountNotFound)?;

        let mut unit = self.store.begin().await?;

        let (source, destination) = if from_account_id < to_account_id {
            let source = unit.lock_account(from_account_id).await?;
            let destination = unit.lock_account(to_account_id).await?;
            (source, destination)
        } else {
            let destination = unit.lock_account(to_account_id).await?;
            let source = unit.lock_account(from_account_id).await?;
            (source, destination)
        };

        let (source, destination) = match (source, destination) {
            (Some(source), Some(destination)) if source.is_owned_by(user_id) => {
                (source, destination)
            }
            _ => return abort(unit, AppError::AccountNotFound).await,
        };

        if source.currency != destination.currency {
            return abort(
                unit,
                AppError::InvalidRequest("Accounts use different currencies".to_string()),
            )
            .await;
        }

        if source.balance < amount {
            tracing::warn!(%from_account_id, %amount, "transfer rejected: insufficient funds");
            return abort(unit, AppError::InsufficientFunds).await;
        }

        let credited = match credit(destination.balance, amount) {
            Ok(balance) => balance,
            Err(error) => return abort(unit, error).await,
        };

        unit.update_balance(source.id, source.balance - amount)
            .await?;
        unit.update_balance(destination.id, credited).await?;

        let transaction = unit
            .append_transaction(NewTransaction {
                from_account_id,
                to_account_id,
                amount,
                transaction_type: TransactionType::Transfer,
                currency: source.currency.clone(),
            })
            .await?;

        // Commit ALL changes atomically
        unit.commit().await?;

        tracing::info!(%from_account_id, %to_account_id, %amount, "transfer committed");
        Ok(transaction)
    }
}

/// Amounts must be strictly positive, at most [`MAX_AMOUNT`], with at most
/// two decimal places.
pub fn validate_amount(amount: Decimal) -> Result<(), AppError> {
    if amount <= Decimal::ZERO {
        return Err(AppError::InvalidRequest(
            "Amount must be positive".to_string(),
        ));
    }
    if amount > MAX_AMOUNT {
        return Err(AppError::InvalidRequest(
            "Amount exceeds the maximum".to_string(),
        ));
    }
    if amount.normalize().scale() > MAX_AMOUNT_SCALE {
        return Err(AppError::InvalidRequest(
            "Amount has too many decimal places".to_string(),
        ));
    }
    Ok(())
}

/// Balance after crediting `amount`, if it still fits the balance column.
fn credit(balance: Decimal, amount: Decimal) -> Result<Decimal, AppError> {
    balance
        .checked_add(amount)
        .filter(|balance| *balance <= MAX_AMOUNT)
        .ok_or_else(|| AppError::InvalidRequest("Balance would exceed the maximum".to_string()))
}

/// Roll the unit back and fail with `error`.
///
/// A failed rollback is only logged: the unit is discarded either way and the
/// caller still gets the domain error.
async fn abort<T>(unit: Box<dyn LedgerUnit>, error: AppError) -> Result<T, AppError> {
    if let Err(rollback_error) = unit.rollback().await {
        tracing::error!(%rollback_error, %error, "rollback failed");
    }
    Err(error)
}
