//! PostgreSQL storage backed by the sqlx connection pool.
//!
//! A [`PgLedgerUnit`] wraps one database transaction. Row locks are taken
//! with `SELECT ... FOR UPDATE` and released on commit or rollback; dropping
//! the unit without committing rolls the transaction back.

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::Postgres;
use uuid::Uuid;

use super::{AccountStore, CardStore, Conflict, LedgerUnit, StoreError, UserStore};
use crate::{
    db::DbPool,
    models::{
        account::{Account, NewAccount},
        card::{Card, CardSummaryRow, NewCard},
        transaction::{NewTransaction, Transaction},
        user::{Identity, User},
    },
};

/// Name of the UNIQUE constraint on `cards.account_id` (see migrations).
const CARD_ACCOUNT_CONSTRAINT: &str = "cards_account_id_key";

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

pub struct PgLedgerUnit {
    tx: sqlx::Transaction<'static, Postgres>,
}

#[async_trait]
impl AccountStore for PgStore {
    async fn begin(&self) -> Result<Box<dyn LedgerUnit>, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgLedgerUnit { tx }))
    }

    async fn find_account(&self, id: Uuid) -> Result<Option<Account>, StoreError> {
        let account = sqlx::query_as::<_, Account>(
            r#"
            SELECT id, user_id, balance, currency, is_deleted, created_at, updated_at
            FROM accounts
            WHERE id = $1 AND is_deleted = false
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(account)
    }

    async fn find_account_for_user(
        &self,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Account>, StoreError> {
        // Filter by BOTH id AND user_id so other users' accounts look absent
        let account = sqlx::query_as::<_, Account>(
            r#"
            SELECT id, user_id, balance, currency, is_deleted, created_at, updated_at
            FROM accounts
            WHERE id = $1 AND user_id = $2 AND is_deleted = false
            "#,
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(account)
    }

    async fn list_accounts_by_user(&self, user_id: Uuid) -> Result<Vec<Account>, StoreError> {
        let accounts = sqlx::query_as::<_, Account>(
            r#"
            SELECT id, user_id, balance, currency, is_deleted, created_at, updated_at
            FROM accounts
            WHERE user_id = $1 AND is_deleted = false
            ORDER BY created_at
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(accounts)
    }
}

#[async_trait]
impl LedgerUnit for PgLedgerUnit {
    async fn insert_account(&mut self, account: NewAccount) -> Result<Account, StoreError> {
        let account = sqlx::query_as::<_, Account>(
            r#"
            INSERT INTO accounts (user_id, balance, currency)
            VALUES ($1, $2, $3)
            RETURNING id, user_id, balance, currency, is_deleted, created_at, updated_at
            "#,
        )
        .bind(account.user_id)
        .bind(account.balance)
        .bind(&account.currency)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(account)
    }

    async fn lock_account(&mut self, id: Uuid) -> Result<Option<Account>, StoreError> {
        // FOR UPDATE ensures no other transaction can modify this row until we finish
        let account = sqlx::query_as::<_, Account>(
            r#"
            SELECT id, user_id, balance, currency, is_deleted, created_at, updated_at
            FROM accounts
            WHERE id = $1 AND is_deleted = false
            FOR UPDATE
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(account)
    }

    async fn update_balance(&mut self, id: Uuid, balance: Decimal) -> Result<(), StoreError> {
        sqlx::query("UPDATE accounts SET balance = $1, updated_at = NOW() WHERE id = $2")
            .bind(balance)
            .bind(id)
            .execute(&mut *self.tx)
            .await?;

        Ok(())
    }

    async fn append_transaction(
        &mut self,
        transaction: NewTransaction,
    ) -> Result<Transaction, StoreError> {
        let transaction = sqlx::query_as::<_, Transaction>(
            r#"
            INSERT INTO transactions (
                from_account_id,
                to_account_id,
                amount,
                transaction_type,
                currency
            )
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, from_account_id, to_account_id, amount, transaction_type, currency,
                      created_at
            "#,
        )
        .bind(transaction.from_account_id)
        .bind(transaction.to_account_id)
        .bind(transaction.amount)
        .bind(transaction.transaction_type.as_str())
        .bind(&transaction.currency)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(transaction)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.rollback().await?;
        Ok(())
    }
}

#[async_trait]
impl CardStore for PgStore {
    async fn find_card_by_account(&self, account_id: Uuid) -> Result<Option<Card>, StoreError> {
        let card = sqlx::query_as::<_, Card>(
            r#"
            SELECT id, account_id, encrypted_number, number_index, code_hash, expired_at, created_at
            FROM cards
            WHERE account_id = $1
            "#,
        )
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(card)
    }

    async fn find_card_by_number_index(
        &self,
        number_index: &str,
    ) -> Result<Option<Card>, StoreError> {
        let card = sqlx::query_as::<_, Card>(
            r#"
            SELECT id, account_id, encrypted_number, number_index, code_hash, expired_at, created_at
            FROM cards
            WHERE number_index = $1
            "#,
        )
        .bind(number_index)
        .fetch_optional(&self.pool)
        .await?;

        Ok(card)
    }

    async fn insert_card(&self, card: NewCard) -> Result<Card, StoreError> {
        sqlx::query_as::<_, Card>(
            r#"
            INSERT INTO cards (account_id, encrypted_number, number_index, code_hash, expired_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, account_id, encrypted_number, number_index, code_hash, expired_at,
                      created_at
            "#,
        )
        .bind(card.account_id)
        .bind(&card.encrypted_number)
        .bind(&card.number_index)
        .bind(&card.code_hash)
        .bind(card.expired_at)
        .fetch_one(&self.pool)
        .await
        .map_err(classify_card_insert_error)
    }

    async fn list_card_summaries_by_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<CardSummaryRow>, StoreError> {
        let rows = sqlx::query_as::<_, CardSummaryRow>(
            r#"
            SELECT c.id, c.account_id, c.encrypted_number, a.balance, a.currency,
                   c.expired_at, c.created_at
            FROM cards c
            JOIN accounts a ON a.id = c.account_id
            WHERE a.user_id = $1 AND a.is_deleted = false
            ORDER BY c.created_at
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn find_user(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, email, created_at FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn find_identity_by_token_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<Identity>, StoreError> {
        let identity = sqlx::query_as::<_, Identity>(
            r#"
            SELECT u.id AS user_id, u.email, u.username
            FROM session_tokens t
            JOIN users u ON u.id = t.user_id
            WHERE t.token_hash = $1 AND t.is_active = true
            "#,
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(identity)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Turn unique violations on `cards` into typed conflicts.
fn classify_card_insert_error(error: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_error) = &error {
        if db_error.is_unique_violation() {
            let conflict = match db_error.constraint() {
                Some(CARD_ACCOUNT_CONSTRAINT) => Conflict::CardForAccount,
                _ => Conflict::CardNumber,
            };
            return StoreError::Conflict(conflict);
        }
    }
    StoreError::Database(error)
}
