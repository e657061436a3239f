//! # Error Hierarchy
//!
//! Structured error types shared across the mess stack, built with
//! `thiserror`. No `Box<dyn Error>`, no `.unwrap()` outside tests.
//!
//! Subsystem-specific errors (credential verification, ledger conflicts,
//! admission faults) live next to their subsystems; this module holds only
//! the cross-cutting validation errors and the top-level aggregate.

use thiserror::Error;

/// Top-level error type for the mess stack.
#[derive(Error, Debug)]
pub enum MessError {
    /// Domain primitive validation failure.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Validation errors for domain primitive newtypes.
///
/// Each primitive enforces format constraints at construction time. These
/// errors carry the invalid input so operators can diagnose bad requests
/// without guesswork.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// Student id is not a canonical decimal integer.
    #[error("invalid student id: \"{0}\" (expected decimal integer, no leading zeros)")]
    InvalidStudentId(String),

    /// Meal name is not one of BREAKFAST, LUNCH, DINNER.
    #[error("invalid meal: \"{0}\" (expected BREAKFAST, LUNCH or DINNER)")]
    InvalidMeal(String),

    /// Timestamp or date string failed to parse.
    #[error("invalid timestamp: \"{value}\" ({reason})")]
    InvalidTimestamp {
        /// The string that failed to parse.
        value: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Zone offset is outside the ±18 hour range real time zones occupy.
    #[error("invalid zone offset: {0} minutes (must be within ±1080)")]
    InvalidZoneOffset(i32),

    /// A date range has its end before its start.
    #[error("invalid date range: {from} is after {to}")]
    InvalidDateRange {
        /// Range start.
        from: String,
        /// Range end.
        to: String,
    },
}
