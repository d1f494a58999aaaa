//! In-process storage.
//!
//! Holds all rows behind one async mutex. A [`MemoryLedgerUnit`] owns that
//! mutex for its whole lifetime, so units are fully serialized (the strongest
//! form of row locking), and it stages every write until `commit`.
//!
//! Used by the test suites; it can also be told to fail transaction-log
//! writes to exercise rollback paths.

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use super::{AccountStore, CardStore, Conflict, LedgerUnit, StoreError, UserStore};
use crate::models::{
    account::{Account, NewAccount},
    card::{Card, CardSummaryRow, NewCard},
    transaction::{NewTransaction, Transaction},
    user::{Identity, User},
};

#[derive(Debug, Default)]
struct State {
    accounts: HashMap<Uuid, Account>,
    transactions: Vec<Transaction>,
    cards: Vec<Card>,
    users: HashMap<Uuid, User>,
    /// token hash -> user id
    session_tokens: HashMap<String, Uuid>,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
    fail_transaction_log: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following transaction-log append fail (or succeed again).
    pub fn fail_transaction_log_writes(&self, fail: bool) {
        self.fail_transaction_log.store(fail, Ordering::SeqCst);
    }

    pub async fn add_user(&self, username: &str, email: &str) -> User {
        let user = User {
            id: Uuid::new_v4(),
            username: username.to_string(),
            email: email.to_string(),
            created_at: Utc::now(),
        };
        self.state.lock().await.users.insert(user.id, user.clone());
        user
    }

    pub async fn add_session_token(&self, token_hash: &str, user_id: Uuid) {
        self.state
            .lock()
            .await
            .session_tokens
            .insert(token_hash.to_string(), user_id);
    }

    /// Account row as stored, including soft-deleted ones.
    pub async fn account(&self, id: Uuid) -> Option<Account> {
        self.state.lock().await.accounts.get(&id).cloned()
    }

    pub async fn soft_delete_account(&self, id: Uuid) {
        if let Some(account) = self.state.lock().await.accounts.get_mut(&id) {
            account.is_deleted = true;
        }
    }

    /// Committed transaction-log rows, oldest first.
    pub async fn transactions(&self) -> Vec<Transaction> {
        self.state.lock().await.transactions.clone()
    }

    /// Committed card rows.
    pub async fn cards(&self) -> Vec<Card> {
        self.state.lock().await.cards.clone()
    }
}

pub struct MemoryLedgerUnit {
    state: OwnedMutexGuard<State>,
    staged_accounts: HashMap<Uuid, Account>,
    staged_transactions: Vec<Transaction>,
    fail_transaction_log: bool,
}

impl MemoryLedgerUnit {
    fn current(&self, id: Uuid) -> Option<&Account> {
        self.staged_accounts
            .get(&id)
            .or_else(|| self.state.accounts.get(&id))
    }
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn LedgerUnit>, StoreError> {
        let state = self.state.clone().lock_owned().await;
        Ok(Box::new(MemoryLedgerUnit {
            state,
            staged_accounts: HashMap::new(),
            staged_transactions: Vec::new(),
            fail_transaction_log: self.fail_transaction_log.load(Ordering::SeqCst),
        }))
    }

    async fn find_account(&self, id: Uuid) -> Result<Option<Account>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.accounts.get(&id).filter(|a| !a.is_deleted).cloned())
    }

    async fn find_account_for_user(
        &self,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Account>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .accounts
            .get(&id)
            .filter(|a| a.is_owned_by(user_id))
            .cloned())
    }

    async fn list_accounts_by_user(&self, user_id: Uuid) -> Result<Vec<Account>, StoreError> {
        let state = self.state.lock().await;
        let mut accounts: Vec<Account> = state
            .accounts
            .values()
            .filter(|a| a.is_owned_by(user_id))
            .cloned()
            .collect();
        accounts.sort_by_key(|a| a.created_at);
        Ok(accounts)
    }
}

#[async_trait]
impl LedgerUnit for MemoryLedgerUnit {
    async fn insert_account(&mut self, account: NewAccount) -> Result<Account, StoreError> {
        let now = Utc::now();
        let account = Account {
            id: Uuid::new_v4(),
            user_id: account.user_id,
            balance: account.balance,
            currency: account.currency,
            is_deleted: false,
            created_at: now,
            updated_at: now,
        };
        self.staged_accounts.insert(account.id, account.clone());
        Ok(account)
    }

    async fn lock_account(&mut self, id: Uuid) -> Result<Option<Account>, StoreError> {
        Ok(self.current(id).filter(|a| !a.is_deleted).cloned())
    }

    async fn update_balance(&mut self, id: Uuid, balance: Decimal) -> Result<(), StoreError> {
        if let Some(mut account) = self.current(id).cloned() {
            account.balance = balance;
            account.updated_at = Utc::now();
            self.staged_accounts.insert(id, account);
        }
        Ok(())
    }

    async fn append_transaction(
        &mut self,
        transaction: NewTransaction,
    ) -> Result<Transaction, StoreError> {
        if self.fail_transaction_log {
            return Err(StoreError::Unavailable(
                "transaction log write rejected".to_string(),
            ));
        }

        let transaction = Transaction {
            id: Uuid::new_v4(),
            from_account_id: transaction.from_account_id,
            to_account_id: transaction.to_account_id,
            amount: transaction.amount,
            transaction_type: transaction.transaction_type,
            currency: transaction.currency,
            created_at: Utc::now(),
        };
        self.staged_transactions.push(transaction.clone());
        Ok(transaction)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let MemoryLedgerUnit {
            mut state,
            staged_accounts,
            staged_transactions,
            ..
        } = *self;

        state.accounts.extend(staged_accounts);
        state.transactions.extend(staged_transactions);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }
}

#[async_trait]
impl CardStore for MemoryStore {
    async fn find_card_by_account(&self, account_id: Uuid) -> Result<Option<Card>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .cards
            .iter()
            .find(|c| c.account_id == account_id)
            .cloned())
    }

    async fn find_card_by_number_index(
        &self,
        number_index: &str,
    ) -> Result<Option<Card>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .cards
            .iter()
            .find(|c| c.number_index == number_index)
            .cloned())
    }

    async fn insert_card(&self, card: NewCard) -> Result<Card, StoreError> {
        let mut state = self.state.lock().await;

        if state.cards.iter().any(|c| c.account_id == card.account_id) {
            return Err(StoreError::Conflict(Conflict::CardForAccount));
        }
        if state
            .cards
            .iter()
            .any(|c| c.number_index == card.number_index)
        {
            return Err(StoreError::Conflict(Conflict::CardNumber));
        }

        let card = Card {
            id: Uuid::new_v4(),
            account_id: card.account_id,
            encrypted_number: card.encrypted_number,
            number_index: card.number_index,
            code_hash: card.code_hash,
            expired_at: card.expired_at,
            created_at: Utc::now(),
        };
        state.cards.push(card.clone());
        Ok(card)
    }

    async fn list_card_summaries_by_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<CardSummaryRow>, StoreError> {
        let state = self.state.lock().await;
        let rows = state
            .cards
            .iter()
            .filter_map(|card| {
                let account = state
                    .accounts
                    .get(&card.account_id)
                    .filter(|a| a.is_owned_by(user_id))?;
                Some(CardSummaryRow {
                    id: card.id,
                    account_id: card.account_id,
                    encrypted_number: card.encrypted_number.clone(),
                    balance: account.balance,
                    currency: account.currency.clone(),
                    expired_at: card.expired_at,
                    created_at: card.created_at,
                })
            })
            .collect();
        Ok(rows)
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_user(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.state.lock().await.users.get(&id).cloned())
    }

    async fn find_identity_by_token_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<Identity>, StoreError> {
        let state = self.state.lock().await;
        let identity = state
            .session_tokens
            .get(token_hash)
            .and_then(|user_id| state.users.get(user_id))
            .map(|user| Identity {
                user_id: user.id,
                email: user.email.clone(),
                username: user.username.clone(),
            });
        Ok(identity)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
