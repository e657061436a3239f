//! # Domain Identity Newtypes
//!
//! Newtype wrappers for the identifiers in the mess stack. These prevent
//! accidental identifier confusion — you cannot pass a `PaymentId` where a
//! `ScanId` is expected.
//!
//! `StudentId` is deliberately an opaque integer rather than a UUID: it is
//! embedded in the signed meal credential as a decimal field, and the compact
//! form keeps QR payloads small.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

/// Unique identifier for a registered student.
///
/// Serializes as a plain integer. The decimal rendering (no sign, no leading
/// zeros) is the form embedded in meal credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StudentId(pub u64);

impl StudentId {
    /// Access the inner integer value.
    pub fn value(&self) -> u64 {
        self.0
    }

    /// Parse a student id from its canonical decimal rendering.
    ///
    /// Rejects anything `u64::from_str` rejects, plus non-canonical forms
    /// with leading zeros (`"042"`), which can never have been minted.
    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        let value: u64 = s
            .parse()
            .map_err(|_| ValidationError::InvalidStudentId(s.to_string()))?;
        if s != value.to_string() {
            return Err(ValidationError::InvalidStudentId(s.to_string()));
        }
        Ok(Self(value))
    }
}

impl std::fmt::Display for StudentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "student:{}", self.0)
    }
}

/// Unique identifier for a scan ledger record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScanId(pub Uuid);

/// Unique identifier for a payment window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PaymentId(pub Uuid);

impl ScanId {
    /// Generate a new random scan identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Access the inner UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ScanId {
    fn default() -> Self {
        Self::new()
    }
}

impl PaymentId {
    /// Generate a new random payment identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Access the inner UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for PaymentId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ScanId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "scan:{}", self.0)
    }
}

impl std::fmt::Display for PaymentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "payment:{}", self.0)
    }
}

// ── Meal ────────────────────────────────────────────────────────────

/// The three meals a mess serves. An admission decision is keyed on
/// (student, meal, day) — different meals on the same day are independent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Meal {
    Breakfast,
    Lunch,
    Dinner,
}

impl Meal {
    /// Return the wire string for this meal.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Breakfast => "BREAKFAST",
            Self::Lunch => "LUNCH",
            Self::Dinner => "DINNER",
        }
    }

    /// All meals, in serving order.
    pub const ALL: [Meal; 3] = [Meal::Breakfast, Meal::Lunch, Meal::Dinner];
}

impl std::fmt::Display for Meal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Meal {
    type Err = ValidationError;

    /// Parse a meal name, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "BREAKFAST" => Ok(Self::Breakfast),
            "LUNCH" => Ok(Self::Lunch),
            "DINNER" => Ok(Self::Dinner),
            _ => Err(ValidationError::InvalidMeal(s.to_string())),
        }
    }
}
