//! # Token Mint and Verify
//!
//! The stateless credential codec. [`mint`] builds the four-field message,
//! signs it with HMAC-SHA256, and joins message and signature into an opaque
//! token. [`verify`] reverses the process against a caller-supplied current
//! epoch and key.
//!
//! ## Verification order
//!
//! 1. Split on `|` into exactly five components — anything else is
//!    [`CredentialError::Malformed`], never a panic.
//! 2. Parse epoch, student id, and issued-at as canonical decimal integers,
//!    and the nonce as 32 lowercase hex chars — failures are `Malformed`.
//! 3. Compare the embedded epoch to the current one —
//!    [`CredentialError::EpochMismatch`]. The epoch gate runs before the
//!    signature check so rotation invalidates old tokens under *any* key,
//!    and the mismatch is reported as what it is rather than as a forgery.
//! 4. Recompute the signature and compare constant-time —
//!    [`CredentialError::InvalidSignature`].
//!
//! The codec never consults per-student state. The caller is responsible for
//! checking the verified nonce against the student's live record.

use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;

use mess_core::{StudentId, Timestamp};

use crate::rotation::RotationEpoch;
use crate::secret::{CredentialNonce, SecretKey};

type HmacSha256 = Hmac<Sha256>;

/// Number of `|`-separated components in a well-formed token.
const TOKEN_ARITY: usize = 5;

/// Hex length of an HMAC-SHA256 signature.
const SIGNATURE_HEX_LEN: usize = 64;

// ── Errors ───────────────────────────────────────────────────────────

/// Why a token failed verification.
///
/// These never escape as exceptions: the admission pipeline maps every
/// variant to a blocked terminal result.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CredentialError {
    /// Token structure or field encoding is invalid.
    #[error("malformed credential: {0}")]
    Malformed(String),

    /// Signature does not match the message under the current key.
    #[error("credential signature invalid")]
    InvalidSignature,

    /// Token was minted under a different rotation epoch.
    #[error("credential minted under {token_epoch}, current is {current_epoch}")]
    EpochMismatch {
        /// The epoch embedded in the token.
        token_epoch: RotationEpoch,
        /// The epoch supplied by the caller.
        current_epoch: RotationEpoch,
    },
}

// ── MealToken ────────────────────────────────────────────────────────

/// An opaque, signed meal credential — the string a QR code carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MealToken(String);

impl MealToken {
    /// The token as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume the token, returning the inner string.
    pub fn into_string(self) -> String {
        self.0
    }

    /// A short prefix safe for audit payloads. Never long enough to replay.
    pub fn redacted(&self) -> String {
        let prefix: String = self.0.chars().take(12).collect();
        format!("{prefix}…")
    }
}

impl std::fmt::Display for MealToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ── VerifiedCredential ───────────────────────────────────────────────

/// The fields recovered from a token that passed verification.
///
/// The embedded nonce has been proven authentic (it was signed) but NOT
/// checked against the student's live record — that is the caller's job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedCredential {
    /// The student the token was minted for.
    pub student_id: StudentId,
    /// The epoch the token was minted under (equals the current epoch).
    pub epoch: RotationEpoch,
    /// When the token was minted.
    pub issued_at: Timestamp,
    /// The per-student nonce at mint time.
    pub nonce: CredentialNonce,
}

impl VerifiedCredential {
    /// Age of the token in hours at `now`.
    ///
    /// Computed for observability only — no freshness window is enforced.
    /// Whether stale tokens should be rejected (and how re-issue would work)
    /// is an open product question; until it is answered this value feeds
    /// debug logging and nothing else.
    pub fn age_hours(&self, now: Timestamp) -> f64 {
        let secs = now.epoch_secs().saturating_sub(self.issued_at.epoch_secs());
        secs as f64 / 3600.0
    }
}

// ── Mint ─────────────────────────────────────────────────────────────

/// Mint a signed meal token. No side effects.
pub fn mint(
    student_id: StudentId,
    nonce: &CredentialNonce,
    epoch: RotationEpoch,
    key: &SecretKey,
    now: Timestamp,
) -> MealToken {
    let message = format!(
        "{}|{}|{}|{}",
        epoch.value(),
        student_id.value(),
        now.epoch_secs(),
        nonce.as_str()
    );
    let signature = sign(&message, key);
    MealToken(format!("{message}|{signature}"))
}

/// Verify a token against the current epoch and key.
///
/// On success returns the embedded fields; see the module docs for the
/// check order and the caller's remaining nonce obligation.
pub fn verify(
    token: &str,
    current_epoch: RotationEpoch,
    key: &SecretKey,
) -> Result<VerifiedCredential, CredentialError> {
    let parts: Vec<&str> = token.split('|').collect();
    if parts.len() != TOKEN_ARITY {
        return Err(CredentialError::Malformed(format!(
            "expected {TOKEN_ARITY} fields, got {}",
            parts.len()
        )));
    }

    let epoch = parse_decimal(parts[0])
        .map(RotationEpoch)
        .ok_or_else(|| CredentialError::Malformed("epoch is not a decimal integer".into()))?;
    let student_id = StudentId::parse(parts[1])
        .map_err(|_| CredentialError::Malformed("student id is not a decimal integer".into()))?;
    let issued_secs = parse_decimal(parts[2])
        .ok_or_else(|| CredentialError::Malformed("issued-at is not a decimal integer".into()))?;
    let issued_at = i64::try_from(issued_secs)
        .ok()
        .and_then(|secs| Timestamp::from_epoch_secs(secs).ok())
        .ok_or_else(|| CredentialError::Malformed("issued-at out of range".into()))?;
    let nonce = CredentialNonce::parse(parts[3])
        .map_err(|_| CredentialError::Malformed("nonce is not 32 lowercase hex chars".into()))?;

    if epoch != current_epoch {
        return Err(CredentialError::EpochMismatch {
            token_epoch: epoch,
            current_epoch,
        });
    }

    let message = format!("{}|{}|{}|{}", parts[0], parts[1], parts[2], parts[3]);
    let expected = sign(&message, key);
    if !constant_time_hex_eq(parts[4], &expected) {
        return Err(CredentialError::InvalidSignature);
    }

    Ok(VerifiedCredential {
        student_id,
        epoch,
        issued_at,
        nonce,
    })
}

// ── Internals ────────────────────────────────────────────────────────

/// Lowercase hex HMAC-SHA256 of `message` under `key`.
fn sign(message: &str, key: &SecretKey) -> String {
    // new_from_slice accepts any key length for HMAC; 32 bytes can't fail.
    let mut mac = HmacSha256::new_from_slice(key.as_bytes())
        .expect("HMAC accepts any key length");
    mac.update(message.as_bytes());
    let digest = mac.finalize().into_bytes();
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// Constant-time comparison of the provided signature against the expected
/// one. When lengths differ a dummy comparison runs so timing does not leak
/// whether the length matched.
fn constant_time_hex_eq(provided: &str, expected: &str) -> bool {
    let provided = provided.as_bytes();
    let expected = expected.as_bytes();
    debug_assert_eq!(expected.len(), SIGNATURE_HEX_LEN);
    if provided.len() != expected.len() {
        let _ = expected.ct_eq(expected);
        return false;
    }
    provided.ct_eq(expected).into()
}

/// Parse a canonical decimal integer: digits only, no sign, no leading zeros.
fn parse_decimal(s: &str) -> Option<u64> {
    let value: u64 = s.parse().ok()?;
    if s != value.to_string() {
        return None;
    }
    Some(value)
}
