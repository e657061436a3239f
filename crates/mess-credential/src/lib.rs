//! # mess-credential — Meal Credential Codec and Rotation Registry
//!
//! Mints and verifies the HMAC-SHA256 signed tokens students present at the
//! mess counter, and holds the process-wide rotation epoch that invalidates
//! every outstanding token in O(1).
//!
//! ## Token anatomy
//!
//! ```text
//! {epoch}|{student_id}|{issued_at}|{nonce}|{signature}
//! ```
//!
//! The first four fields are the signed message; the fifth is the lowercase
//! hex HMAC-SHA256 of that message under the secret key. The token is
//! self-describing: verification needs only the token, the current epoch,
//! and the key.
//!
//! ## Security Invariants
//!
//! - Signature comparison is constant-time (`subtle`). A short-circuiting
//!   string comparison would leak a byte-by-byte oracle to a scanning device.
//! - The secret key is never serialized or logged; its `Debug` is redacted
//!   and its memory is zeroized on drop.
//! - The codec is stateless: it proves *who minted the token and under which
//!   epoch*, never whether the embedded nonce still matches the student's
//!   live record. That check belongs to the admission pipeline, which owns
//!   the live state.
//!
//! ## Invalidation paths
//!
//! - **Targeted** (one student): regenerate that student's nonce and re-mint.
//!   Old tokens fail the pipeline's nonce check. Cheap, per-student.
//! - **Global** (suspected key leak): [`RotationRegistry::rotate`] bumps the
//!   epoch. Every token minted under an earlier epoch fails verification
//!   with `EpochMismatch` without touching any per-student record.

pub mod rotation;
pub mod secret;
pub mod token;

pub use rotation::{KeySnapshot, RotationEpoch, RotationRegistry};
pub use secret::{CredentialNonce, SecretKey};
pub use token::{mint, verify, CredentialError, MealToken, VerifiedCredential};
