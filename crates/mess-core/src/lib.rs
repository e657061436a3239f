//! # mess-core — Foundational Types for the Mess Stack
//!
//! This crate is the bedrock of the mess stack. It defines the type-system
//! primitives every other crate builds on. It depends on nothing internal.
//!
//! ## Key Design Principles
//!
//! 1. **Newtype wrappers for domain primitives.** `StudentId`, `ScanId`,
//!    `PaymentId` — no bare integers or strings for identifiers. You cannot
//!    pass a payment id where a scan id is expected.
//!
//! 2. **UTC-only instants, mess-local days.** `Timestamp` is UTC with seconds
//!    precision. `MealDay` is the calendar date in the mess's configured time
//!    zone — the unit the admission invariant is keyed on. Converting between
//!    the two goes through `ZoneOffset` exactly once, at pipeline entry.
//!
//! 3. **Closed enums for wire statuses.** `Meal` serializes as
//!    `SCREAMING_SNAKE_CASE` strings; invalid values are unrepresentable.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `mess-*` crates (this is the leaf of the DAG).
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod error;
pub mod identity;
pub mod temporal;

pub use error::{MessError, ValidationError};
pub use identity::{Meal, PaymentId, ScanId, StudentId};
pub use temporal::{MealDay, Timestamp, ZoneOffset};
