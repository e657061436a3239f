//! # Audit Trail
//!
//! Append-only record of every terminal admission result and every
//! credential-verification failure, plus the administrative actions that
//! change eligibility state (approvals, payment reviews, rotations).
//!
//! ## Redaction
//!
//! Audit payloads never contain raw credential material. A rejected token is
//! recorded as a short prefix (`MealToken::redacted`), enough to correlate
//! with a student complaint, never enough to replay.
//!
//! ## Capacity
//!
//! The in-memory trail trims its oldest 10% when the configured maximum is
//! exceeded. Production deployments should drain entries to durable storage
//! before trimming.

use serde::{Deserialize, Serialize};

use mess_core::Timestamp;

// ── ActorType ────────────────────────────────────────────────────────

/// Who caused an audited event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActorType {
    Student,
    Admin,
    Staff,
    System,
}

impl ActorType {
    /// Return the wire string for this actor type.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Student => "STUDENT",
            Self::Admin => "ADMIN",
            Self::Staff => "STAFF",
            Self::System => "SYSTEM",
        }
    }
}

impl std::fmt::Display for ActorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── AuditEventKind ───────────────────────────────────────────────────

/// The kind of audited event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventKind {
    /// A scan reached a terminal result (any result, allowed or blocked).
    ScanAdjudicated,
    /// A presented token failed credential verification.
    CredentialRejected,
    /// A meal credential was minted for a student.
    CredentialIssued,
    /// A student's nonce was regenerated (targeted invalidation).
    CredentialReissued,
    /// The global rotation epoch was bumped.
    EpochRotated,
    /// A registration was approved.
    RegistrationApproved,
    /// A registration was denied.
    RegistrationDenied,
    /// A payment window was verified.
    PaymentVerified,
    /// A payment window was denied.
    PaymentDenied,
    /// A mess cut was applied.
    MessCutApplied,
    /// A mess-wide closure was declared.
    ClosureDeclared,
}

impl AuditEventKind {
    /// Return the wire string for this event kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ScanAdjudicated => "scan_adjudicated",
            Self::CredentialRejected => "credential_rejected",
            Self::CredentialIssued => "credential_issued",
            Self::CredentialReissued => "credential_reissued",
            Self::EpochRotated => "epoch_rotated",
            Self::RegistrationApproved => "registration_approved",
            Self::RegistrationDenied => "registration_denied",
            Self::PaymentVerified => "payment_verified",
            Self::PaymentDenied => "payment_denied",
            Self::MessCutApplied => "mess_cut_applied",
            Self::ClosureDeclared => "closure_declared",
        }
    }
}

impl std::fmt::Display for AuditEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── AuditEntry ───────────────────────────────────────────────────────

/// A single entry in the audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Who caused the event.
    pub actor_type: ActorType,
    /// Actor identifier, if one exists (student id, staff label).
    pub actor_id: Option<String>,
    /// What happened.
    pub event: AuditEventKind,
    /// Structured, redacted context.
    pub payload: serde_json::Value,
    /// When the event occurred.
    pub timestamp: Timestamp,
}

impl AuditEntry {
    /// Create an entry stamped with the current time.
    pub fn new(
        actor_type: ActorType,
        actor_id: Option<String>,
        event: AuditEventKind,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            actor_type,
            actor_id,
            event,
            payload,
            timestamp: Timestamp::now(),
        }
    }
}

// ── AuditSink ────────────────────────────────────────────────────────

/// The audit port. Recording must not fail the caller — an audit backend
/// outage is logged by the implementation, never propagated into an
/// admission decision.
pub trait AuditSink: Send + Sync {
    /// Append an entry to the trail.
    fn record(&self, entry: AuditEntry);
}

// ── AuditTrail ───────────────────────────────────────────────────────

/// An append-only audit trail with a configurable capacity.
///
/// Not `Sync` on its own; share it through [`SharedAuditTrail`].
pub struct AuditTrail {
    entries: Vec<AuditEntry>,
    max_entries: usize,
}

impl AuditTrail {
    /// Create a trail with the given maximum capacity.
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: Vec::new(),
            max_entries,
        }
    }

    /// Append an entry, trimming the oldest 10% if over capacity.
    pub fn append(&mut self, entry: AuditEntry) {
        self.entries.push(entry);
        if self.entries.len() > self.max_entries {
            let trim_count = (self.max_entries / 10).max(1);
            self.entries.drain(..trim_count);
        }
    }

    /// All entries, oldest first.
    pub fn entries(&self) -> &[AuditEntry] {
        &self.entries
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the trail is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The last N entries (or all, if fewer exist).
    pub fn last_n(&self, n: usize) -> &[AuditEntry] {
        let start = self.entries.len().saturating_sub(n);
        &self.entries[start..]
    }

    /// Entries of one kind.
    pub fn entries_by_kind(&self, kind: AuditEventKind) -> Vec<&AuditEntry> {
        self.entries.iter().filter(|e| e.event == kind).collect()
    }
}

impl Default for AuditTrail {
    fn default() -> Self {
        Self::new(10_000)
    }
}

impl std::fmt::Debug for AuditTrail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditTrail")
            .field("entries", &self.entries.len())
            .field("max_entries", &self.max_entries)
            .finish()
    }
}

// ── SharedAuditTrail ─────────────────────────────────────────────────

/// A cloneable, thread-safe handle to an [`AuditTrail`].
#[derive(Debug, Clone)]
pub struct SharedAuditTrail {
    inner: std::sync::Arc<parking_lot::Mutex<AuditTrail>>,
}

impl SharedAuditTrail {
    /// Create a shared trail with the default capacity.
    pub fn new() -> Self {
        Self::with_capacity(10_000)
    }

    /// Create a shared trail with the given capacity.
    pub fn with_capacity(max_entries: usize) -> Self {
        Self {
            inner: std::sync::Arc::new(parking_lot::Mutex::new(AuditTrail::new(max_entries))),
        }
    }

    /// Copy of the last N entries, oldest first.
    pub fn last_n(&self, n: usize) -> Vec<AuditEntry> {
        self.inner.lock().last_n(n).to_vec()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Whether the trail is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Copy of the entries of one kind.
    pub fn entries_by_kind(&self, kind: AuditEventKind) -> Vec<AuditEntry> {
        self.inner
            .lock()
            .entries_by_kind(kind)
            .into_iter()
            .cloned()
            .collect()
    }
}

impl Default for SharedAuditTrail {
    fn default() -> Self {
        Self::new()
    }
}

impl AuditSink for SharedAuditTrail {
    fn record(&self, entry: AuditEntry) {
        tracing::debug!(event = %entry.event, actor = %entry.actor_type, "audit entry");
        self.inner.lock().append(entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(kind: AuditEventKind) -> AuditEntry {
        AuditEntry::new(
            ActorType::Staff,
            Some("counter-1".into()),
            kind,
            serde_json::json!({"result": "ALLOWED"}),
        )
    }

    #[test]
    fn append_and_read_back() {
        let mut trail = AuditTrail::new(100);
        trail.append(entry(AuditEventKind::ScanAdjudicated));
        assert_eq!(trail.len(), 1);
        assert_eq!(trail.entries()[0].event, AuditEventKind::ScanAdjudicated);
    }

    #[test]
    fn over_capacity_trims_oldest_tenth() {
        let mut trail = AuditTrail::new(10);
        for _ in 0..11 {
            trail.append(entry(AuditEventKind::ScanAdjudicated));
        }
        // 11 entries exceeded 10; one (10 / 10) was trimmed.
        assert_eq!(trail.len(), 10);
    }

    #[test]
    fn last_n_returns_tail() {
        let mut trail = AuditTrail::new(100);
        trail.append(entry(AuditEventKind::ScanAdjudicated));
        trail.append(entry(AuditEventKind::CredentialRejected));
        trail.append(entry(AuditEventKind::EpochRotated));
        let tail = trail.last_n(2);
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[0].event, AuditEventKind::CredentialRejected);
        assert_eq!(tail[1].event, AuditEventKind::EpochRotated);
    }

    #[test]
    fn last_n_larger_than_len_returns_all() {
        let mut trail = AuditTrail::new(100);
        trail.append(entry(AuditEventKind::ScanAdjudicated));
        assert_eq!(trail.last_n(50).len(), 1);
    }

    #[test]
    fn entries_by_kind_filters() {
        let mut trail = AuditTrail::new(100);
        trail.append(entry(AuditEventKind::ScanAdjudicated));
        trail.append(entry(AuditEventKind::CredentialRejected));
        trail.append(entry(AuditEventKind::ScanAdjudicated));
        assert_eq!(
            trail.entries_by_kind(AuditEventKind::ScanAdjudicated).len(),
            2
        );
        assert_eq!(
            trail.entries_by_kind(AuditEventKind::EpochRotated).len(),
            0
        );
    }

    #[test]
    fn shared_trail_records_from_multiple_threads() {
        use std::thread;

        let trail = SharedAuditTrail::with_capacity(1000);
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let trail = trail.clone();
                thread::spawn(move || {
                    for _ in 0..50 {
                        trail.record(entry(AuditEventKind::ScanAdjudicated));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(trail.len(), 200);
    }

    #[test]
    fn entry_serializes() {
        let e = entry(AuditEventKind::ScanAdjudicated);
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["actor_type"], "STAFF");
        assert_eq!(json["event"], "scan_adjudicated");
    }
}
