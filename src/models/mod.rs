//! Data models representing database entities.
//!
//! This module contains all data structures that map to database tables,
//! plus the request and response bodies built from them.

/// Ledger account model
pub mod account;
/// Card model
pub mod card;
/// Payment notification payload
pub mod notification;
/// Append-only transaction log model
pub mod transaction;
/// User and caller identity
pub mod user;
