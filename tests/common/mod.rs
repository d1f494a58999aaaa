#![allow(dead_code)]

use std::{
    str::FromStr,
    sync::{Arc, Mutex},
    time::Duration,
};

use argon2::Params;
use async_trait::async_trait;
use rust_decimal::Decimal;
use uuid::Uuid;

use bank_ledger::{
    models::{account::Account, notification::PaymentNotification, user::User},
    routes::AppState,
    security::CardVault,
    services::{
        card_service::CardService,
        ledger_service::LedgerService,
        notification_service::{Notifier, NotifyError},
    },
    store::{Store, memory::MemoryStore},
};

pub const KEY_HEX: &str = "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";
pub const INDEX_KEY: &[u8] = b"test-index-key";

pub fn dec(value: &str) -> Decimal {
    Decimal::from_str(value).unwrap()
}

pub fn vault() -> CardVault {
    CardVault::from_hex_key(KEY_HEX, INDEX_KEY)
        .unwrap()
        .with_hash_params(Params::new(1024, 1, 1, None).unwrap())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Succeed,
    Fail,
    Hang,
}

/// Records every notification attempt, then behaves as configured.
pub struct RecordingNotifier {
    delivery: Delivery,
    attempts: Mutex<Vec<PaymentNotification>>,
}

impl RecordingNotifier {
    pub fn new(delivery: Delivery) -> Self {
        Self {
            delivery,
            attempts: Mutex::new(Vec::new()),
        }
    }

    pub fn attempts(&self) -> Vec<PaymentNotification> {
        self.attempts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, notification: &PaymentNotification) -> Result<(), NotifyError> {
        self.attempts.lock().unwrap().push(notification.clone());
        match self.delivery {
            Delivery::Succeed => Ok(()),
            Delivery::Fail => Err(NotifyError::Rejected(503)),
            Delivery::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(())
            }
        }
    }
}

pub struct Harness {
    pub store: MemoryStore,
    pub ledger: LedgerService,
    pub cards: CardService,
    pub vault: Arc<CardVault>,
    pub notifier: Arc<RecordingNotifier>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_delivery(Delivery::Succeed, Duration::from_secs(5))
    }

    pub fn with_delivery(delivery: Delivery, notify_timeout: Duration) -> Self {
        let store = MemoryStore::new();
        let shared: Arc<dyn Store> = Arc::new(store.clone());
        let vault = Arc::new(vault());
        let notifier = Arc::new(RecordingNotifier::new(delivery));

        let ledger = LedgerService::new(shared.clone(), "RUB");
        let cards = CardService::new(
            shared,
            ledger.clone(),
            vault.clone(),
            notifier.clone(),
            notify_timeout,
        );

        Self {
            store,
            ledger,
            cards,
            vault,
            notifier,
        }
    }

    pub fn app_state(&self) -> AppState {
        AppState {
            store: Arc::new(self.store.clone()),
            ledger: self.ledger.clone(),
            cards: self.cards.clone(),
        }
    }

    pub async fn user(&self, name: &str) -> User {
        self.store
            .add_user(name, &format!("{name}@example.com"))
            .await
    }

    pub async fn account(&self, user_id: Uuid, balance: &str) -> Account {
        self.ledger
            .create_account(user_id, dec(balance))
            .await
            .unwrap()
    }

    pub async fn balance(&self, account_id: Uuid) -> Decimal {
        self.store.account(account_id).await.unwrap().balance
    }
}
