//! # Secret Key and Credential Nonce
//!
//! The HMAC secret key and the per-student credential nonce.
//!
//! ## Security Invariants
//!
//! - `SecretKey` does not implement `Serialize` and its `Debug` is redacted —
//!   key material must not leak into logs, responses, or artifacts. The key
//!   bytes are zeroized when the value is dropped.
//! - `CredentialNonce` is validated at construction: exactly 32 lowercase hex
//!   characters (16 random bytes). A malformed nonce is unrepresentable.

use rand::RngCore;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Length of the HMAC secret key in bytes.
pub const SECRET_KEY_LEN: usize = 32;

/// Length of a credential nonce in hex characters (16 random bytes).
pub const NONCE_HEX_LEN: usize = 32;

/// Errors constructing key material.
#[derive(Error, Debug)]
pub enum KeyError {
    /// Hex input had the wrong length for a secret key.
    #[error("secret key hex must be {expected} chars, got {actual}")]
    InvalidKeyLength {
        /// Expected hex length.
        expected: usize,
        /// Actual hex length.
        actual: usize,
    },

    /// Hex input contained a non-hex character.
    #[error("invalid hex at position {position}")]
    InvalidHex {
        /// Byte offset of the offending character pair.
        position: usize,
    },

    /// Nonce input was not 32 lowercase hex characters.
    #[error("invalid credential nonce: \"{0}\" (expected 32 lowercase hex chars)")]
    InvalidNonce(String),
}

// ── SecretKey ────────────────────────────────────────────────────────

/// The 32-byte HMAC-SHA256 secret key.
///
/// Does not implement `Serialize`. `Clone` exists so the rotation registry
/// can hand out a snapshot for the duration of one decision; clones zeroize
/// on drop like the original.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretKey([u8; SECRET_KEY_LEN]);

impl SecretKey {
    /// Generate a fresh random key from the OS entropy source.
    pub fn generate() -> Self {
        let mut bytes = [0u8; SECRET_KEY_LEN];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Construct from raw bytes.
    pub fn from_bytes(bytes: [u8; SECRET_KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Parse from a 64-character hex string (the `MESS_SECRET_KEY_HEX` form).
    pub fn from_hex(hex: &str) -> Result<Self, KeyError> {
        let hex = hex.trim();
        if hex.len() != SECRET_KEY_LEN * 2 {
            return Err(KeyError::InvalidKeyLength {
                expected: SECRET_KEY_LEN * 2,
                actual: hex.len(),
            });
        }
        let mut bytes = [0u8; SECRET_KEY_LEN];
        for (i, chunk) in bytes.iter_mut().enumerate() {
            let pos = i * 2;
            *chunk = u8::from_str_radix(&hex[pos..pos + 2], 16)
                .map_err(|_| KeyError::InvalidHex { position: pos })?;
        }
        Ok(Self(bytes))
    }

    /// Raw key bytes, for feeding the MAC.
    pub fn as_bytes(&self) -> &[u8; SECRET_KEY_LEN] {
        &self.0
    }
}

impl std::fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretKey(<redacted>)")
    }
}

// ── CredentialNonce ──────────────────────────────────────────────────

/// A per-student random nonce, regenerated only on credential re-issuance.
///
/// Binding the token to the nonce makes targeted invalidation possible:
/// regenerating one student's nonce revokes their outstanding token without
/// touching the global epoch.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CredentialNonce(String);

impl CredentialNonce {
    /// Generate a fresh random nonce (16 bytes, rendered as 32 hex chars).
    pub fn generate() -> Self {
        let mut bytes = [0u8; NONCE_HEX_LEN / 2];
        rand::thread_rng().fill_bytes(&mut bytes);
        let hex: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
        Self(hex)
    }

    /// Validate and wrap an existing nonce string.
    pub fn parse(s: &str) -> Result<Self, KeyError> {
        if s.len() != NONCE_HEX_LEN || !s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')) {
            return Err(KeyError::InvalidNonce(s.to_string()));
        }
        Ok(Self(s.to_string()))
    }

    /// The nonce as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CredentialNonce {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for CredentialNonce {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for CredentialNonce {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── SecretKey ────────────────────────────────────────────────

    #[test]
    fn generate_produces_distinct_keys() {
        let a = SecretKey::generate();
        let b = SecretKey::generate();
        assert_ne!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn hex_roundtrip() {
        let key = SecretKey::from_bytes([0xab; 32]);
        let hex = "ab".repeat(32);
        let parsed = SecretKey::from_hex(&hex).unwrap();
        assert_eq!(key.as_bytes(), parsed.as_bytes());
    }

    #[test]
    fn from_hex_rejects_wrong_length() {
        assert!(matches!(
            SecretKey::from_hex("abcd"),
            Err(KeyError::InvalidKeyLength { .. })
        ));
    }

    #[test]
    fn from_hex_rejects_non_hex() {
        let bad = "zz".repeat(32);
        assert!(matches!(
            SecretKey::from_hex(&bad),
            Err(KeyError::InvalidHex { .. })
        ));
    }

    #[test]
    fn debug_does_not_leak_key_bytes() {
        let key = SecretKey::from_bytes([0x42; 32]);
        let debug = format!("{key:?}");
        assert_eq!(debug, "SecretKey(<redacted>)");
        assert!(!debug.contains("42"));
    }

    // ── CredentialNonce ──────────────────────────────────────────

    #[test]
    fn nonce_is_32_lowercase_hex() {
        let nonce = CredentialNonce::generate();
        assert_eq!(nonce.as_str().len(), 32);
        assert!(nonce
            .as_str()
            .bytes()
            .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')));
    }

    #[test]
    fn nonce_generate_is_random() {
        assert_ne!(CredentialNonce::generate(), CredentialNonce::generate());
    }

    #[test]
    fn nonce_parse_accepts_valid() {
        let s = "0123456789abcdef0123456789abcdef";
        assert_eq!(CredentialNonce::parse(s).unwrap().as_str(), s);
    }

    #[test]
    fn nonce_parse_rejects_invalid() {
        assert!(CredentialNonce::parse("short").is_err());
        assert!(CredentialNonce::parse(&"G".repeat(32)).is_err());
        // Uppercase hex is not the canonical form.
        assert!(CredentialNonce::parse(&"AB".repeat(16)).is_err());
        assert!(CredentialNonce::parse("").is_err());
    }

    #[test]
    fn nonce_serde_roundtrip() {
        let nonce = CredentialNonce::generate();
        let json = serde_json::to_string(&nonce).unwrap();
        let back: CredentialNonce = serde_json::from_str(&json).unwrap();
        assert_eq!(nonce, back);
    }

    #[test]
    fn nonce_deserialize_rejects_invalid() {
        let result: Result<CredentialNonce, _> = serde_json::from_str("\"nope\"");
        assert!(result.is_err());
    }
}
