use hmac::{Hmac, Mac};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use utoipa::ToSchema;

use std::fmt;

type HmacSha256 = Hmac<Sha256>;

/// Prefix carried by every rendered address
pub const ADDRESS_PREFIX: &str = "0x";

/// Number of digest bytes kept in an address
pub const ADDRESS_BYTES: usize = 20;

/// Errors that can occur during cryptographic operations
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Invalid MAC key: {0}")]
    InvalidKey(String),
}

/// Represents an account address (`0x` followed by 40 hex characters)
///
/// Addresses are public. They double as the signing key of their owner,
/// see [`keyed_digest`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
pub struct Address(pub String);

impl Address {
    /// Creates a new address from a fresh random seed
    pub fn generate() -> Self {
        let mut seed = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut seed);
        Address::from_seed(&seed)
    }

    /// Derives an address from a seed: the first 20 bytes of its SHA-256 digest
    pub fn from_seed(seed: &[u8]) -> Self {
        let digest = Sha256::digest(seed);
        Address(format!("{}{}", ADDRESS_PREFIX, hex::encode(&digest[..ADDRESS_BYTES])))
    }

    /// Checks that the address has the `0x` + 40 lowercase hex shape
    pub fn is_well_formed(&self) -> bool {
        match self.0.strip_prefix(ADDRESS_PREFIX) {
            Some(body) => {
                body.len() == ADDRESS_BYTES * 2
                    && body.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
            }
            None => false,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Address {
    fn from(s: &str) -> Self {
        Address(s.to_string())
    }
}

impl From<String> for Address {
    fn from(s: String) -> Self {
        Address(s)
    }
}

/// SHA-256 of `data`, hex encoded
pub fn digest(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// HMAC-SHA-256 of `data` under `key`, hex encoded
pub fn keyed_digest(key: &[u8], data: &[u8]) -> Result<String, CryptoError> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
    mac.update(data);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Recomputes the HMAC of `data` under `key` and compares it to `expected_hex`
/// in constant time. A tag that is not valid hex never matches.
pub fn verify_keyed_digest(key: &[u8], data: &[u8], expected_hex: &str) -> Result<bool, CryptoError> {
    let expected = match hex::decode(expected_hex) {
        Ok(bytes) => bytes,
        Err(_) => return Ok(false),
    };

    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
    mac.update(data);
    Ok(mac.verify_slice(&expected).is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_address_shape() {
        let address = Address::generate();
        assert!(address.is_well_formed());
        assert_eq!(address.as_str().len(), 2 + ADDRESS_BYTES * 2);
        assert_ne!(address, Address::generate());
    }

    #[test]
    fn test_address_from_seed_is_deterministic() {
        assert_eq!(Address::from_seed(b"seed"), Address::from_seed(b"seed"));
        assert!(!Address::from("alice").is_well_formed());
    }

    #[test]
    fn test_digest() {
        // SHA-256("abc")
        assert_eq!(
            digest(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_keyed_digest_roundtrip() {
        let tag = keyed_digest(b"key", b"message").unwrap();
        assert_eq!(tag.len(), 64);
        assert!(verify_keyed_digest(b"key", b"message", &tag).unwrap());
        assert!(!verify_keyed_digest(b"other", b"message", &tag).unwrap());
        assert!(!verify_keyed_digest(b"key", b"message", "not-hex").unwrap());
    }
}
