//! Bank Ledger - Main Application Entry Point
//!
//! REST API server for a banking core: accounts with a transaction log,
//! deposits, withdrawals and transfers, plus card issuance and card payments.
//!
//! # Architecture
//!
//! - **Web Framework**: Axum (async HTTP server)
//! - **Database**: PostgreSQL with sqlx (async queries)
//! - **Authentication**: session token with SHA-256 hashing
//! - **Card secrets**: AES-256-GCM numbers, HMAC lookup index, Argon2 codes
//!
//! # Startup Flow
//!
//! 1. Load configuration from environment variables
//! 2. Create database connection pool
//! 3. Run database migrations
//! 4. Build services and the HTTP router
//! 5. Start server on configured port

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use bank_ledger::{
    config::Config,
    db,
    routes::{self, AppState},
    security::CardVault,
    services::{
        card_service::CardService,
        ledger_service::LedgerService,
        notification_service::{LogNotifier, MailgunNotifier, Notifier},
    },
    store::{Store, postgres::PgStore},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Reads RUST_LOG environment variable (defaults to "info" level)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = Config::from_env()?;
    tracing::info!(?config, "Configuration loaded");

    let pool = db::create_pool(&config.database_url, config.database_max_connections).await?;
    tracing::info!("Database pool created");

    db::run_migrations(&pool).await?;
    tracing::info!("Database migrations complete");

    let vault = CardVault::from_hex_key(
        &config.card_encryption_key,
        config.card_index_key.as_bytes(),
    )
    .context("invalid card encryption keys")?;

    let notifier: Arc<dyn Notifier> = match config.mailgun() {
        Some((api_key, domain)) => {
            tracing::info!(domain, "Payment notifications via Mailgun");
            Arc::new(MailgunNotifier::new(
                &config.mailgun_api_base,
                domain,
                api_key.to_string(),
                config.mail_from.clone(),
                config.notification_timeout(),
            )?)
        }
        None => {
            tracing::warn!("Mailgun not configured, payment notifications are only logged");
            Arc::new(LogNotifier)
        }
    };

    let store: Arc<dyn Store> = Arc::new(PgStore::new(pool));
    let ledger = LedgerService::new(store.clone(), config.ledger_currency.clone());
    let cards = CardService::new(
        store.clone(),
        ledger.clone(),
        Arc::new(vault),
        notifier,
        config.notification_timeout(),
    );

    let app = routes::router(AppState {
        store,
        ledger,
        cards,
    });

    let addr = format!("0.0.0.0:{}", config.server_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
