mod common;

use std::time::Duration;

use chrono::{Months, Utc};
use uuid::Uuid;

use bank_ledger::{
    error::AppError,
    luhn,
    models::{card::NewCard, transaction::TransactionType},
    store::CardStore,
};

use common::{Delivery, Harness, dec};

/// Store a card directly, bypassing issuance.
async fn stored_card(
    h: &Harness,
    account_id: Uuid,
    number: &str,
    code: &str,
    expired_at: chrono::DateTime<Utc>,
) {
    h.store
        .insert_card(NewCard {
            account_id,
            encrypted_number: h.vault.encrypt_number(number).unwrap(),
            number_index: h.vault.number_index(number),
            code_hash: h.vault.hash_code(code).unwrap(),
            expired_at,
        })
        .await
        .unwrap();
}

fn payments(log: &[bank_ledger::models::transaction::Transaction]) -> usize {
    log.iter()
        .filter(|t| t.transaction_type == TransactionType::Payment)
        .count()
}

#[tokio::test]
async fn issued_card_is_valid_and_stored_protected() {
    let h = Harness::new();
    let alice = h.user("alice").await;
    let account = h.account(alice.id, "0").await;

    let issued = h.cards.issue_card(alice.id, account.id).await.unwrap();

    assert_eq!(issued.account_id, account.id);
    assert_eq!(issued.number.len(), 16);
    assert!(luhn::is_valid(&issued.number));
    assert_eq!(issued.code.len(), 3);
    assert!(issued.code.bytes().all(|b| b.is_ascii_digit()));

    let now = Utc::now();
    assert!(issued.expired_at > now + Months::new(4));
    assert!(issued.expired_at < now + Months::new(30));

    let stored = h.store.cards().await;
    assert_eq!(stored.len(), 1);
    let card = &stored[0];
    assert!(!card.encrypted_number.contains(&issued.number));
    assert_ne!(card.code_hash, issued.code);
    assert_eq!(h.vault.decrypt_number(&card.encrypted_number).unwrap(), issued.number);
    assert_eq!(card.number_index, h.vault.number_index(&issued.number));
    assert!(h.vault.verify_code(&issued.code, &card.code_hash));
}

#[tokio::test]
async fn second_issuance_for_account_is_rejected() {
    let h = Harness::new();
    let alice = h.user("alice").await;
    let account = h.account(alice.id, "0").await;

    h.cards.issue_card(alice.id, account.id).await.unwrap();
    let second = h.cards.issue_card(alice.id, account.id).await;

    assert!(matches!(second, Err(AppError::CardAlreadyExists)));
    assert_eq!(h.store.cards().await.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_issuance_yields_one_card() {
    let h = Harness::new();
    let alice = h.user("alice").await;
    let account = h.account(alice.id, "0").await;
    let (user_id, account_id) = (alice.id, account.id);

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let cards = h.cards.clone();
        tasks.push(tokio::spawn(async move {
            cards.issue_card(user_id, account_id).await
        }));
    }

    let mut issued = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => issued += 1,
            Err(AppError::CardAlreadyExists) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(issued, 1);
    assert_eq!(h.store.cards().await.len(), 1);
}

#[tokio::test]
async fn cards_are_only_issued_for_own_live_accounts() {
    let h = Harness::new();
    let alice = h.user("alice").await;
    let mallory = h.user("mallory").await;
    let account = h.account(alice.id, "0").await;
    let deleted = h.account(alice.id, "0").await;
    h.store.soft_delete_account(deleted.id).await;

    assert!(matches!(
        h.cards.issue_card(mallory.id, account.id).await,
        Err(AppError::AccountNotFound)
    ));
    assert!(matches!(
        h.cards.issue_card(alice.id, deleted.id).await,
        Err(AppError::AccountNotFound)
    ));
    assert!(h.store.cards().await.is_empty());
}

#[tokio::test]
async fn listing_masks_numbers_and_survives_unreadable_rows() {
    let h = Harness::new();
    let alice = h.user("alice").await;
    let first = h.account(alice.id, "250").await;
    let second = h.account(alice.id, "0").await;
    let issued = h.cards.issue_card(alice.id, first.id).await.unwrap();

    h.store
        .insert_card(NewCard {
            account_id: second.id,
            encrypted_number: "not-a-ciphertext".to_string(),
            number_index: "corrupt".to_string(),
            code_hash: "corrupt".to_string(),
            expired_at: Utc::now() + Months::new(6),
        })
        .await
        .unwrap();

    let cards = h.cards.cards_for_user(alice.id).await.unwrap();
    assert_eq!(cards.len(), 2);

    let readable = cards.iter().find(|c| c.account_id == first.id).unwrap();
    assert_eq!(
        readable.masked_number,
        format!("**** **** **** {}", &issued.number[12..])
    );
    assert_eq!(readable.balance, dec("250"));

    let unreadable = cards.iter().find(|c| c.account_id == second.id).unwrap();
    assert_eq!(unreadable.masked_number, "**** **** **** ****");

    let other = h.user("bob").await;
    assert!(h.cards.cards_for_user(other.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn payment_debits_account_and_notifies_owner() {
    let h = Harness::new();
    let alice = h.user("alice").await;
    let account = h.account(alice.id, "500").await;
    let card = h.cards.issue_card(alice.id, account.id).await.unwrap();

    let balance = h
        .cards
        .pay_with_card(&card.number, &card.code, dec("120"))
        .await
        .unwrap();

    assert_eq!(balance, dec("380"));
    assert_eq!(h.balance(account.id).await, dec("380"));

    let log = h.store.transactions().await;
    assert_eq!(payments(&log), 1);
    let payment = log
        .iter()
        .find(|t| t.transaction_type == TransactionType::Payment)
        .unwrap();
    assert_eq!(payment.from_account_id, account.id);
    assert_eq!(payment.amount, dec("120"));

    let sent = h.notifier.attempts();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "alice@example.com");
    assert_eq!(sent[0].name, "alice");
    assert_eq!(sent[0].card_last4, &card.number[12..]);
    assert_eq!(sent[0].amount, dec("120"));
    assert_eq!(sent[0].balance, dec("380"));
    assert!(!sent[0].html().contains(&card.number));
}

#[tokio::test]
async fn payment_accepts_grouped_card_numbers() {
    let h = Harness::new();
    let alice = h.user("alice").await;
    let account = h.account(alice.id, "100").await;
    let card = h.cards.issue_card(alice.id, account.id).await.unwrap();
    let n = &card.number;
    let grouped = format!("{} {}-{} {}", &n[..4], &n[4..8], &n[8..12], &n[12..]);

    let balance = h.cards.pay_with_card(&grouped, &card.code, dec("1.50")).await.unwrap();

    assert_eq!(balance, dec("98.50"));
}

#[tokio::test]
async fn wrong_code_leaves_everything_untouched() {
    let h = Harness::new();
    let alice = h.user("alice").await;
    let account = h.account(alice.id, "500").await;
    let card = h.cards.issue_card(alice.id, account.id).await.unwrap();
    let wrong = if card.code == "001" { "002" } else { "001" };

    let result = h.cards.pay_with_card(&card.number, wrong, dec("120")).await;

    assert!(matches!(result, Err(AppError::InvalidCode)));
    assert_eq!(h.balance(account.id).await, dec("500"));
    assert_eq!(payments(&h.store.transactions().await), 0);
    assert!(h.notifier.attempts().is_empty());
}

#[tokio::test]
async fn unknown_or_malformed_numbers_are_not_found() {
    let h = Harness::new();
    let alice = h.user("alice").await;
    let account = h.account(alice.id, "500").await;
    let card = h.cards.issue_card(alice.id, account.id).await.unwrap();

    let mut unknown = luhn::generate(16);
    while unknown == card.number {
        unknown = luhn::generate(16);
    }

    for number in [unknown.as_str(), "4111111111111112", "1234", "abcd efgh ijkl mnop"] {
        assert!(matches!(
            h.cards.pay_with_card(number, &card.code, dec("1")).await,
            Err(AppError::CardNotFound)
        ));
    }
    assert_eq!(h.balance(account.id).await, dec("500"));
}

#[tokio::test]
async fn payment_beyond_balance_is_rejected() {
    let h = Harness::new();
    let alice = h.user("alice").await;
    let account = h.account(alice.id, "100").await;
    let card = h.cards.issue_card(alice.id, account.id).await.unwrap();

    let result = h.cards.pay_with_card(&card.number, &card.code, dec("100.01")).await;

    assert!(matches!(result, Err(AppError::InsufficientFunds)));
    assert_eq!(h.balance(account.id).await, dec("100"));
    assert_eq!(payments(&h.store.transactions().await), 0);
    assert!(h.notifier.attempts().is_empty());
}

#[tokio::test]
async fn failed_notification_keeps_the_payment() {
    let h = Harness::with_delivery(Delivery::Fail, Duration::from_secs(5));
    let alice = h.user("alice").await;
    let account = h.account(alice.id, "500").await;
    let card = h.cards.issue_card(alice.id, account.id).await.unwrap();

    let balance = h.cards.pay_with_card(&card.number, &card.code, dec("120")).await.unwrap();

    assert_eq!(balance, dec("380"));
    assert_eq!(h.balance(account.id).await, dec("380"));
    assert_eq!(h.notifier.attempts().len(), 1);
}

#[tokio::test]
async fn slow_notification_is_cut_off() {
    let h = Harness::with_delivery(Delivery::Hang, Duration::from_millis(50));
    let alice = h.user("alice").await;
    let account = h.account(alice.id, "500").await;
    let card = h.cards.issue_card(alice.id, account.id).await.unwrap();

    let balance = tokio::time::timeout(
        Duration::from_secs(10),
        h.cards.pay_with_card(&card.number, &card.code, dec("120")),
    )
    .await
    .expect("payment should not wait for the notifier")
    .unwrap();

    assert_eq!(balance, dec("380"));
    assert_eq!(payments(&h.store.transactions().await), 1);
}

#[tokio::test]
async fn expired_card_is_refused_after_code_check() {
    let h = Harness::new();
    let alice = h.user("alice").await;
    let account = h.account(alice.id, "500").await;
    let number = luhn::generate(16);
    stored_card(&h, account.id, &number, "042", Utc::now() - Months::new(1)).await;

    assert!(matches!(
        h.cards.pay_with_card(&number, "042", dec("10")).await,
        Err(AppError::CardExpired)
    ));
    assert!(matches!(
        h.cards.pay_with_card(&number, "043", dec("10")).await,
        Err(AppError::InvalidCode)
    ));
    assert_eq!(h.balance(account.id).await, dec("500"));
}

#[tokio::test]
async fn payment_on_deleted_account_fails() {
    let h = Harness::new();
    let alice = h.user("alice").await;
    let account = h.account(alice.id, "500").await;
    let number = luhn::generate(16);
    stored_card(&h, account.id, &number, "042", Utc::now() + Months::new(6)).await;
    h.store.soft_delete_account(account.id).await;

    assert!(matches!(
        h.cards.pay_with_card(&number, "042", dec("10")).await,
        Err(AppError::AccountNotFound)
    ));
}
