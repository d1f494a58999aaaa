//! HTTP router and the state shared with every handler.

use std::sync::Arc;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::{
    handlers, middleware,
    services::{card_service::CardService, ledger_service::LedgerService},
    store::Store,
};

/// Shared with all handlers via State extraction.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub ledger: LedgerService,
    pub cards: CardService,
}

/// Build the application router.
///
/// Everything under `/api/v1` goes through identity resolution; `/health`
/// is public.
pub fn router(state: AppState) -> Router {
    let authenticated_routes = Router::new()
        // Account ledger
        .route(
            "/api/v1/accounts",
            post(handlers::accounts::create_account).get(handlers::accounts::list_accounts),
        )
        .route("/api/v1/accounts/{id}", get(handlers::accounts::get_account))
        .route(
            "/api/v1/accounts/{id}/deposit",
            post(handlers::transactions::deposit),
        )
        .route(
            "/api/v1/accounts/{id}/withdraw",
            post(handlers::transactions::withdraw),
        )
        .route("/api/v1/transfers", post(handlers::transactions::transfer))
        // Cards
        .route(
            "/api/v1/cards",
            post(handlers::cards::issue_card).get(handlers::cards::list_cards),
        )
        .route("/api/v1/payments/card", post(handlers::cards::pay_with_card))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::auth_middleware,
        ));

    Router::new()
        .route("/health", get(handlers::health::health_check))
        .merge(authenticated_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
