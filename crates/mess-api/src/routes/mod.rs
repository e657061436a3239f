//! # Route Modules
//!
//! One module per resource. Each exposes a `router()` that the application
//! assembler merges; handlers extract [`crate::auth::CallerIdentity`] and
//! gate themselves with [`crate::auth::require_role`].

pub mod admin;
pub mod exclusions;
pub mod payments;
pub mod scan;
pub mod students;
