//! # mess-admission — The Admission Engine
//!
//! Turns a scanned credential into an authoritative allow/deny decision for
//! one student, at one meal, on one day, under independently-mutable
//! eligibility conditions: registration status, payment validity, personal
//! mess-cut, global mess-closure, and prior same-day admission.
//!
//! ## Components
//!
//! - [`domain`] — the records: `Student`, `PaymentWindow`, `MessCut`,
//!   `MessClosure`, `ScanRecord`, and the closed [`domain::ScanResult`] set.
//! - [`eligibility`] — the pure evaluator over a student's facts for a day.
//! - [`ledger`] — the append-only scan ledger; its atomic conditional insert
//!   is what makes double admission impossible under racing scans.
//! - [`pipeline`] — the orchestrating state machine: decode → resolve →
//!   evaluate → enforce single admission → one terminal result.
//! - [`audit`] — append-only trail of every terminal result and every
//!   credential rejection, with redacted payloads.
//! - [`notify`] — the fire-and-forget student notification port.
//!
//! ## The one absolute rule
//!
//! Nothing in this crate ever defaults an ambiguous or failed check to
//! `Allowed`. Storage faults, timeouts, and constraint races all terminate
//! in an explicit blocked result. Admission-on-fault is exactly the bug
//! class this engine exists to prevent.

pub mod audit;
pub mod domain;
pub mod eligibility;
pub mod ledger;
pub mod notify;
pub mod pipeline;

pub use audit::{ActorType, AuditEntry, AuditEventKind, AuditSink, AuditTrail, SharedAuditTrail};
pub use domain::{
    AppliedBy, ApprovalStatus, MessClosure, MessCut, PaymentSource, PaymentStatus, PaymentWindow,
    ScanRecord, ScanResult, Student, StudentSnapshot,
};
pub use eligibility::{EligibilityBlock, EligibilityFacts, ExclusionKind};
pub use ledger::{InMemoryScanLedger, LedgerError, ScanLedger};
pub use notify::{NotificationEvent, NotificationSink};
pub use pipeline::{
    AdmissionPipeline, DeviceInfo, ExclusionStore, PaymentStore, ScanDecision, StaffIdentity,
    StoreError, StudentDirectory,
};
