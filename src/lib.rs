//! Banking ledger core with card issuance and card payments.
//!
//! The binary in `main.rs` wires these modules to PostgreSQL and serves the
//! HTTP API; integration tests drive the same services through the
//! in-process store.

pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod luhn;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod security;
pub mod services;
pub mod store;
