//! Storage layer for accounts, the transaction log, cards and users.
//!
//! Services talk to storage through the traits in this module so the same
//! ledger and card logic runs against PostgreSQL in production and against
//! the in-process store in tests.
//!
//! # Atomic units
//!
//! Every balance mutation happens inside a [`LedgerUnit`] obtained from
//! [`AccountStore::begin`]. A unit locks the rows it reads, stages updates and
//! transaction-log appends, and makes all of them visible together on
//! [`LedgerUnit::commit`]. Dropping a unit without committing discards
//! everything it staged.

use async_trait::async_trait;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::models::{
    account::{Account, NewAccount},
    card::{Card, CardSummaryRow, NewCard},
    transaction::{NewTransaction, Transaction},
    user::{Identity, User},
};

pub mod memory;
pub mod postgres;

/// Unique constraint that rejected an insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conflict {
    /// `cards.account_id` is already taken
    CardForAccount,
    /// `cards.number_index` is already taken
    CardNumber,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("unique constraint violated: {0:?}")]
    Conflict(Conflict),

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Accounts and the atomic units that mutate them.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Start an atomic unit of work.
    async fn begin(&self) -> Result<Box<dyn LedgerUnit>, StoreError>;

    /// Plain read, no lock.
    async fn find_account(&self, id: Uuid) -> Result<Option<Account>, StoreError>;

    /// Plain read of a live account owned by `user_id`, no lock.
    async fn find_account_for_user(
        &self,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Account>, StoreError>;

    /// Live accounts of a user, oldest first.
    async fn list_accounts_by_user(&self, user_id: Uuid) -> Result<Vec<Account>, StoreError>;
}

/// One atomic unit: one ledger mutation plus its transaction-log write.
#[async_trait]
pub trait LedgerUnit: Send {
    async fn insert_account(&mut self, account: NewAccount) -> Result<Account, StoreError>;

    /// Load a live account and hold an exclusive lock on it until the unit ends.
    async fn lock_account(&mut self, id: Uuid) -> Result<Option<Account>, StoreError>;

    async fn update_balance(&mut self, id: Uuid, balance: Decimal) -> Result<(), StoreError>;

    async fn append_transaction(
        &mut self,
        transaction: NewTransaction,
    ) -> Result<Transaction, StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}

#[async_trait]
pub trait CardStore: Send + Sync {
    async fn find_card_by_account(&self, account_id: Uuid) -> Result<Option<Card>, StoreError>;

    async fn find_card_by_number_index(
        &self,
        number_index: &str,
    ) -> Result<Option<Card>, StoreError>;

    /// Insert a card. Fails with [`StoreError::Conflict`] when the account
    /// already has a card or the number index is taken.
    async fn insert_card(&self, card: NewCard) -> Result<Card, StoreError>;

    /// Cards of all live accounts owned by `user_id`, joined with their balance.
    async fn list_card_summaries_by_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<CardSummaryRow>, StoreError>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_user(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    /// Resolve an active session token (by its SHA-256 hex digest) to the caller.
    async fn find_identity_by_token_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<Identity>, StoreError>;

    /// Connectivity probe for health checks.
    async fn ping(&self) -> Result<(), StoreError>;
}

/// Everything the services need from storage.
pub trait Store: AccountStore + CardStore + UserStore {}

impl<T: AccountStore + CardStore + UserStore> Store for T {}
