//! Card secrets: number encryption, number lookup index and code hashing.

mod card_vault;

pub use card_vault::{CardVault, CryptoError};
