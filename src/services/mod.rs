//! Business logic services.
//!
//! Services contain core business logic separated from HTTP handlers.
//! They own validation, the atomic ledger units and card secrets.

pub mod card_service;
pub mod ledger_service;
pub mod notification_service;
