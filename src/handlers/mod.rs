//! HTTP request handlers (route handlers).
//!
//! Each handler is an async function that:
//! 1. Receives HTTP request data (JSON body, URL params, etc.)
//! 2. Delegates to the ledger or card service
//! 3. Returns HTTP response (JSON, status code)

/// Account management endpoints
pub mod accounts;
/// Card issuance, listing and payment endpoints
pub mod cards;
pub mod health;
/// Deposit, withdrawal and transfer endpoints
pub mod transactions;
