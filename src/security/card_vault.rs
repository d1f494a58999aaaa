//! Keyed protection of card numbers and verification codes.
//!
//! # Stored forms
//!
//! - **Card number**: AES-256-GCM under the server-held encryption key, with a
//!   fresh random 96-bit nonce per encryption. Stored as
//!   `hex(nonce || ciphertext || tag)`, so the same PAN never produces the
//!   same ciphertext twice.
//! - **Number index**: `hex(HMAC-SHA256(index key, PAN))`. Deterministic, so
//!   a payment can find its card with one equality lookup instead of
//!   decrypting every stored number.
//! - **Verification code**: Argon2id PHC string with a random salt.
//!
//! Both keys are injected at construction. Nothing in here logs key
//! material or plaintext.

use std::fmt;

use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, KeyInit},
};
use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

const NONCE_LEN: usize = 12;

#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("encryption key must be 32 bytes of hex")]
    InvalidKey,

    #[error("card number encryption failed")]
    Encrypt,

    /// Authentication tag did not verify: wrong key or tampered ciphertext.
    #[error("card number decryption failed")]
    Decrypt,

    /// Stored value is not hex or too short to hold a nonce.
    #[error("stored card number is malformed")]
    Malformed,

    #[error("verification code hashing failed")]
    Hash,
}

pub struct CardVault {
    cipher: Aes256Gcm,
    index_key: Vec<u8>,
    hasher: Argon2<'static>,
}

impl fmt::Debug for CardVault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CardVault").finish_non_exhaustive()
    }
}

impl CardVault {
    /// Build a vault from a 32-byte encryption key and an index key.
    pub fn new(encryption_key: &[u8], index_key: &[u8]) -> Result<Self, CryptoError> {
        let cipher =
            Aes256Gcm::new_from_slice(encryption_key).map_err(|_| CryptoError::InvalidKey)?;
        if index_key.is_empty() {
            return Err(CryptoError::InvalidKey);
        }

        Ok(Self {
            cipher,
            index_key: index_key.to_vec(),
            hasher: Argon2::default(),
        })
    }

    /// Build a vault from a hex-encoded encryption key, as found in configuration.
    pub fn from_hex_key(encryption_key_hex: &str, index_key: &[u8]) -> Result<Self, CryptoError> {
        let key = hex::decode(encryption_key_hex.trim()).map_err(|_| CryptoError::InvalidKey)?;
        Self::new(&key, index_key)
    }

    /// Replace the Argon2 cost parameters used for new code hashes.
    ///
    /// Existing hashes keep verifying, since PHC strings carry their own parameters.
    pub fn with_hash_params(mut self, params: Params) -> Self {
        self.hasher = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
        self
    }

    pub fn encrypt_number(&self, number: &str) -> Result<String, CryptoError> {
        let nonce_bytes: [u8; NONCE_LEN] = rand::random();
        let ciphertext = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), number.as_bytes())
            .map_err(|_| CryptoError::Encrypt)?;

        let mut stored = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        stored.extend_from_slice(&nonce_bytes);
        stored.extend_from_slice(&ciphertext);
        Ok(hex::encode(stored))
    }

    pub fn decrypt_number(&self, stored: &str) -> Result<String, CryptoError> {
        let bytes = hex::decode(stored).map_err(|_| CryptoError::Malformed)?;
        if bytes.len() <= NONCE_LEN {
            return Err(CryptoError::Malformed);
        }

        let (nonce, ciphertext) = bytes.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| CryptoError::Decrypt)?;

        String::from_utf8(plaintext).map_err(|_| CryptoError::Malformed)
    }

    /// Deterministic keyed index of a card number.
    pub fn number_index(&self, number: &str) -> String {
        let mut mac = <HmacSha256 as Mac>::new_from_slice(&self.index_key)
            .expect("HMAC accepts keys of any length");
        mac.update(number.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    pub fn hash_code(&self, code: &str) -> Result<String, CryptoError> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .hasher
            .hash_password(code.as_bytes(), &salt)
            .map_err(|_| CryptoError::Hash)?;
        Ok(hash.to_string())
    }

    /// Check a code against a stored hash. A malformed hash never verifies.
    pub fn verify_code(&self, code: &str, stored_hash: &str) -> bool {
        match PasswordHash::new(stored_hash) {
            Ok(parsed) => self
                .hasher
                .verify_password(code.as_bytes(), &parsed)
                .is_ok(),
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const KEY_HEX: &str = "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";

    fn vault() -> CardVault {
        CardVault::from_hex_key(KEY_HEX, b"index-key")
            .unwrap()
            .with_hash_params(Params::new(1024, 1, 1, None).unwrap())
    }

    #[test]
    fn rejects_short_keys() {
        assert!(matches!(
            CardVault::new(&[0u8; 16], b"index-key"),
            Err(CryptoError::InvalidKey)
        ));
        assert!(matches!(
            CardVault::from_hex_key("not hex", b"index-key"),
            Err(CryptoError::InvalidKey)
        ));
    }

    #[test]
    fn ciphertext_never_contains_the_number() {
        let vault = vault();
        let stored = vault.encrypt_number("4000123412345678").unwrap();

        assert!(!stored.contains("4000123412345678"));
        assert_ne!(stored, vault.encrypt_number("4000123412345678").unwrap());
    }

    #[test]
    fn wrong_key_fails_to_decrypt() {
        let stored = vault().encrypt_number("4000123412345678").unwrap();
        let other = CardVault::new(&[7u8; 32], b"index-key").unwrap();

        assert!(matches!(other.decrypt_number(&stored), Err(CryptoError::Decrypt)));
    }

    #[test]
    fn garbage_is_malformed() {
        assert!(matches!(vault().decrypt_number("zz"), Err(CryptoError::Malformed)));
        assert!(matches!(vault().decrypt_number("00ff"), Err(CryptoError::Malformed)));
    }

    #[test]
    fn number_index_is_keyed_and_deterministic() {
        let vault = vault();
        let other = CardVault::from_hex_key(KEY_HEX, b"another-index-key").unwrap();

        assert_eq!(
            vault.number_index("4000123412345678"),
            vault.number_index("4000123412345678")
        );
        assert_ne!(
            vault.number_index("4000123412345678"),
            other.number_index("4000123412345678")
        );
    }

    #[test]
    fn code_hash_verifies_only_the_right_code() {
        let vault = vault();
        let hash = vault.hash_code("042").unwrap();

        assert_ne!(hash, "042");
        assert!(vault.verify_code("042", &hash));
        assert!(!vault.verify_code("043", &hash));
        assert!(!vault.verify_code("042", "not a phc string"));
    }

    proptest! {
        #[test]
        fn decrypt_inverts_encrypt(number in "[0-9]{16}") {
            let vault = vault();
            let stored = vault.encrypt_number(&number).unwrap();
            prop_assert_eq!(vault.decrypt_number(&stored).unwrap(), number);
        }
    }
}
