//! # Domain Records
//!
//! The records the admission engine reads and writes. Statuses are closed
//! enums serializing as `SCREAMING_SNAKE_CASE` wire strings — invalid status
//! values are unrepresentable, and adding a variant forces every consumer
//! to handle it.

use serde::{Deserialize, Serialize};

use mess_core::{Meal, MealDay, PaymentId, ScanId, StudentId, Timestamp, ValidationError};
use mess_credential::{CredentialNonce, RotationEpoch};

// ── ApprovalStatus ───────────────────────────────────────────────────

/// Registration lifecycle status of a student.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalStatus {
    /// Registered, awaiting admin review.
    Pending,
    /// Admitted to the mess roll.
    Approved,
    /// Rejected by an admin.
    Denied,
}

impl ApprovalStatus {
    /// Return the wire string for this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Approved => "APPROVED",
            Self::Denied => "DENIED",
        }
    }
}

impl std::fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Student ──────────────────────────────────────────────────────────

/// A registered student.
///
/// Created on registration, mutated on approval/denial and credential
/// re-issuance, never deleted — historical scan records reference it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Student {
    /// Opaque integer identity, embedded in the student's meal credential.
    pub id: StudentId,
    pub name: String,
    pub roll_no: String,
    pub room_no: String,
    pub phone: String,
    /// Registration lifecycle status.
    pub approval_status: ApprovalStatus,
    /// The nonce the student's currently-valid credential was minted with.
    /// Regenerated only on full re-issuance (the targeted invalidation path).
    pub credential_nonce: CredentialNonce,
    /// The rotation epoch the student's current credential was minted under.
    pub rotation_epoch: RotationEpoch,
    pub registered_at: Timestamp,
}

impl Student {
    /// Create a pending registration with a fresh credential nonce.
    pub fn register(
        id: StudentId,
        name: String,
        roll_no: String,
        room_no: String,
        phone: String,
        epoch: RotationEpoch,
        now: Timestamp,
    ) -> Self {
        Self {
            id,
            name,
            roll_no,
            room_no,
            phone,
            approval_status: ApprovalStatus::Pending,
            credential_nonce: CredentialNonce::generate(),
            rotation_epoch: epoch,
            registered_at: now,
        }
    }

    /// Regenerate the credential nonce, invalidating the outstanding token
    /// for this student only. Records the epoch the replacement is minted
    /// under.
    pub fn reissue_credential(&mut self, epoch: RotationEpoch) -> &CredentialNonce {
        self.credential_nonce = CredentialNonce::generate();
        self.rotation_epoch = epoch;
        &self.credential_nonce
    }
}

// ── PaymentWindow ────────────────────────────────────────────────────

/// Payment verification status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    /// No payment recorded for the cycle.
    None,
    /// Proof uploaded, awaiting admin review.
    Uploaded,
    /// Verified by an admin — the only status that grants access.
    Verified,
    /// Rejected by an admin.
    Denied,
}

impl PaymentStatus {
    /// Return the wire string for this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::Uploaded => "UPLOADED",
            Self::Verified => "VERIFIED",
            Self::Denied => "DENIED",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the payment proof reached the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentSource {
    OnlineScreenshot,
    OfflineManual,
}

/// A payment covering an inclusive date cycle for one student.
///
/// At most one window may exist per (student, cycle start). A student is
/// paid for day D iff some window with `Verified` status covers D.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentWindow {
    pub id: PaymentId,
    pub student_id: StudentId,
    pub cycle_start: MealDay,
    pub cycle_end: MealDay,
    /// Amount as a decimal string. Never a float.
    pub amount: String,
    pub status: PaymentStatus,
    pub source: PaymentSource,
    pub uploaded_at: Timestamp,
    pub reviewed_at: Option<Timestamp>,
}

impl PaymentWindow {
    /// Create an uploaded-and-unreviewed window. Rejects inverted ranges.
    pub fn upload(
        student_id: StudentId,
        cycle_start: MealDay,
        cycle_end: MealDay,
        amount: String,
        source: PaymentSource,
        now: Timestamp,
    ) -> Result<Self, ValidationError> {
        if cycle_end < cycle_start {
            return Err(ValidationError::InvalidDateRange {
                from: cycle_start.to_string(),
                to: cycle_end.to_string(),
            });
        }
        Ok(Self {
            id: PaymentId::new(),
            student_id,
            cycle_start,
            cycle_end,
            amount,
            status: PaymentStatus::Uploaded,
            source,
            uploaded_at: now,
            reviewed_at: None,
        })
    }

    /// Whether the cycle covers the given day (inclusive on both ends).
    pub fn covers(&self, day: MealDay) -> bool {
        self.cycle_start <= day && day <= self.cycle_end
    }

    /// Whether this window grants access on the given day.
    pub fn grants_access_on(&self, day: MealDay) -> bool {
        self.status == PaymentStatus::Verified && self.covers(day)
    }
}

// ── Exclusions ───────────────────────────────────────────────────────

/// Who applied a mess cut.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppliedBy {
    /// The student, via the self-service flow.
    Student,
    /// The admin system, e.g. a bulk vacation cut.
    AdminSystem,
}

/// A per-student exclusion: the student has opted out of meals (and charges)
/// for an inclusive date range.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessCut {
    pub student_id: StudentId,
    pub from_day: MealDay,
    pub to_day: MealDay,
    pub applied_by: AppliedBy,
    /// Whether the cut was requested before the evening cutoff for its
    /// first day. Recorded for billing; never consulted by admission.
    pub cutoff_honored: bool,
    pub applied_at: Timestamp,
}

impl MessCut {
    /// Create a cut. Rejects inverted ranges.
    pub fn new(
        student_id: StudentId,
        from_day: MealDay,
        to_day: MealDay,
        applied_by: AppliedBy,
        cutoff_honored: bool,
        now: Timestamp,
    ) -> Result<Self, ValidationError> {
        if to_day < from_day {
            return Err(ValidationError::InvalidDateRange {
                from: from_day.to_string(),
                to: to_day.to_string(),
            });
        }
        Ok(Self {
            student_id,
            from_day,
            to_day,
            applied_by,
            cutoff_honored,
            applied_at: now,
        })
    }

    /// Whether the cut covers the given day.
    pub fn covers(&self, day: MealDay) -> bool {
        self.from_day <= day && day <= self.to_day
    }
}

/// A global exclusion: the mess itself is closed for an inclusive date
/// range, for all students.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessClosure {
    pub from_day: MealDay,
    pub to_day: MealDay,
    pub reason: Option<String>,
    pub declared_at: Timestamp,
}

impl MessClosure {
    /// Create a closure. Rejects inverted ranges.
    pub fn new(
        from_day: MealDay,
        to_day: MealDay,
        reason: Option<String>,
        now: Timestamp,
    ) -> Result<Self, ValidationError> {
        if to_day < from_day {
            return Err(ValidationError::InvalidDateRange {
                from: from_day.to_string(),
                to: to_day.to_string(),
            });
        }
        Ok(Self {
            from_day,
            to_day,
            reason,
            declared_at: now,
        })
    }

    /// Whether the closure covers the given day.
    pub fn covers(&self, day: MealDay) -> bool {
        self.from_day <= day && day <= self.to_day
    }
}

// ── ScanResult ───────────────────────────────────────────────────────

/// The closed set of terminal admission results, one per scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScanResult {
    /// Admission granted. At most one per (student, meal, day).
    Allowed,
    /// Credential failed verification (malformed, bad signature, stale
    /// epoch, or nonce revoked by re-issuance).
    BlockedInvalidCredential,
    /// Credential verified but no such student exists.
    BlockedStudentNotFound,
    /// Student is not in `APPROVED` status.
    BlockedStatus,
    /// No verified payment window covers today.
    BlockedNoPayment,
    /// A personal cut or global closure covers today.
    BlockedCut,
    /// An `Allowed` record already exists for this (student, meal, day).
    BlockedDuplicate,
    /// An internal fault occurred. Never silently converted to `Allowed`.
    BlockedInternalError,
}

impl ScanResult {
    /// Return the wire string for this result.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Allowed => "ALLOWED",
            Self::BlockedInvalidCredential => "BLOCKED_INVALID_CREDENTIAL",
            Self::BlockedStudentNotFound => "BLOCKED_STUDENT_NOT_FOUND",
            Self::BlockedStatus => "BLOCKED_STATUS",
            Self::BlockedNoPayment => "BLOCKED_NO_PAYMENT",
            Self::BlockedCut => "BLOCKED_CUT",
            Self::BlockedDuplicate => "BLOCKED_DUPLICATE",
            Self::BlockedInternalError => "BLOCKED_INTERNAL_ERROR",
        }
    }

    /// Whether this result admits the student.
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }
}

impl std::fmt::Display for ScanResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── ScanRecord ───────────────────────────────────────────────────────

/// One adjudicated scan, immutable once written to the ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanRecord {
    pub id: ScanId,
    pub student_id: StudentId,
    pub meal: Meal,
    pub scanned_at: Timestamp,
    /// The mess-local calendar day the decision was keyed on.
    pub day: MealDay,
    pub result: ScanResult,
    pub device_info: String,
    /// Label of the staff credential that performed the scan, if any.
    pub staff_label: Option<String>,
}

impl ScanRecord {
    /// Build a record for a decision taken now.
    pub fn new(
        student_id: StudentId,
        meal: Meal,
        scanned_at: Timestamp,
        day: MealDay,
        result: ScanResult,
        device_info: String,
        staff_label: Option<String>,
    ) -> Self {
        Self {
            id: ScanId::new(),
            student_id,
            meal,
            scanned_at,
            day,
            result,
            device_info,
            staff_label,
        }
    }
}

// ── StudentSnapshot ──────────────────────────────────────────────────

/// What the scanning staff sees alongside a decision: who the student is
/// and why they were (or were not) admitted. Attached whenever an identity
/// was resolved, even on a blocked result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudentSnapshot {
    pub id: StudentId,
    pub name: String,
    pub roll_no: String,
    pub room_no: String,
    pub approval_status: ApprovalStatus,
    /// Whether a verified payment window covers today.
    pub payment_ok: bool,
    /// Whether a personal mess cut covers today.
    pub cut_today: bool,
    /// Whether a global closure covers today.
    pub closure_today: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(s: &str) -> MealDay {
        MealDay::parse(s).unwrap()
    }

    fn now() -> Timestamp {
        Timestamp::from_epoch_secs(1_700_000_000).unwrap()
    }

    // ── Student ──────────────────────────────────────────────────

    #[test]
    fn register_starts_pending_with_fresh_nonce() {
        let s = Student::register(
            StudentId(1),
            "Asha".into(),
            "B21".into(),
            "114".into(),
            "+911234567890".into(),
            RotationEpoch(1),
            now(),
        );
        assert_eq!(s.approval_status, ApprovalStatus::Pending);
        assert_eq!(s.rotation_epoch, RotationEpoch(1));
        assert_eq!(s.credential_nonce.as_str().len(), 32);
    }

    #[test]
    fn reissue_changes_nonce_and_records_epoch() {
        let mut s = Student::register(
            StudentId(1),
            "Asha".into(),
            "B21".into(),
            "114".into(),
            "+911234567890".into(),
            RotationEpoch(1),
            now(),
        );
        let old_nonce = s.credential_nonce.clone();
        s.reissue_credential(RotationEpoch(3));
        assert_ne!(s.credential_nonce, old_nonce);
        assert_eq!(s.rotation_epoch, RotationEpoch(3));
    }

    // ── PaymentWindow ────────────────────────────────────────────

    fn verified_window(from: &str, to: &str) -> PaymentWindow {
        let mut w = PaymentWindow::upload(
            StudentId(1),
            day(from),
            day(to),
            "3200".into(),
            PaymentSource::OnlineScreenshot,
            now(),
        )
        .unwrap();
        w.status = PaymentStatus::Verified;
        w
    }

    #[test]
    fn window_covers_inclusive_bounds() {
        let w = verified_window("2024-01-01", "2024-01-31");
        assert!(w.covers(day("2024-01-01")));
        assert!(w.covers(day("2024-01-15")));
        assert!(w.covers(day("2024-01-31")));
        assert!(!w.covers(day("2023-12-31")));
        assert!(!w.covers(day("2024-02-01")));
    }

    #[test]
    fn only_verified_windows_grant_access() {
        let mut w = verified_window("2024-01-01", "2024-01-31");
        assert!(w.grants_access_on(day("2024-01-15")));
        for status in [PaymentStatus::None, PaymentStatus::Uploaded, PaymentStatus::Denied] {
            w.status = status;
            assert!(!w.grants_access_on(day("2024-01-15")));
        }
    }

    #[test]
    fn inverted_cycle_rejected() {
        let result = PaymentWindow::upload(
            StudentId(1),
            day("2024-02-01"),
            day("2024-01-01"),
            "3200".into(),
            PaymentSource::OfflineManual,
            now(),
        );
        assert!(result.is_err());
    }

    // ── Exclusions ───────────────────────────────────────────────

    #[test]
    fn cut_covers_its_range() {
        let cut = MessCut::new(
            StudentId(1),
            day("2024-01-10"),
            day("2024-01-12"),
            AppliedBy::Student,
            true,
            now(),
        )
        .unwrap();
        assert!(cut.covers(day("2024-01-10")));
        assert!(cut.covers(day("2024-01-12")));
        assert!(!cut.covers(day("2024-01-13")));
    }

    #[test]
    fn single_day_cut_is_valid() {
        let cut = MessCut::new(
            StudentId(1),
            day("2024-01-10"),
            day("2024-01-10"),
            AppliedBy::AdminSystem,
            false,
            now(),
        )
        .unwrap();
        assert!(cut.covers(day("2024-01-10")));
    }

    #[test]
    fn inverted_cut_rejected() {
        assert!(MessCut::new(
            StudentId(1),
            day("2024-01-12"),
            day("2024-01-10"),
            AppliedBy::Student,
            true,
            now(),
        )
        .is_err());
    }

    #[test]
    fn closure_covers_all_students_range() {
        let closure =
            MessClosure::new(day("2024-03-01"), day("2024-03-05"), Some("Holi".into()), now())
                .unwrap();
        assert!(closure.covers(day("2024-03-03")));
        assert!(!closure.covers(day("2024-03-06")));
    }

    // ── ScanResult ───────────────────────────────────────────────

    #[test]
    fn scan_result_wire_strings() {
        assert_eq!(ScanResult::Allowed.as_str(), "ALLOWED");
        assert_eq!(
            ScanResult::BlockedInvalidCredential.as_str(),
            "BLOCKED_INVALID_CREDENTIAL"
        );
        assert_eq!(ScanResult::BlockedDuplicate.as_str(), "BLOCKED_DUPLICATE");
        assert_eq!(
            ScanResult::BlockedInternalError.as_str(),
            "BLOCKED_INTERNAL_ERROR"
        );
    }

    #[test]
    fn scan_result_serde_matches_wire_form() {
        let json = serde_json::to_string(&ScanResult::BlockedNoPayment).unwrap();
        assert_eq!(json, "\"BLOCKED_NO_PAYMENT\"");
    }

    #[test]
    fn only_allowed_is_allowed() {
        assert!(ScanResult::Allowed.is_allowed());
        for blocked in [
            ScanResult::BlockedInvalidCredential,
            ScanResult::BlockedStudentNotFound,
            ScanResult::BlockedStatus,
            ScanResult::BlockedNoPayment,
            ScanResult::BlockedCut,
            ScanResult::BlockedDuplicate,
            ScanResult::BlockedInternalError,
        ] {
            assert!(!blocked.is_allowed());
        }
    }

    #[test]
    fn scan_record_serde_roundtrip() {
        let record = ScanRecord::new(
            StudentId(42),
            Meal::Lunch,
            now(),
            day("2024-01-15"),
            ScanResult::Allowed,
            "counter-1".into(),
            Some("gate-tablet".into()),
        );
        let json = serde_json::to_string(&record).unwrap();
        let back: ScanRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, record.id);
        assert_eq!(back.result, ScanResult::Allowed);
        assert_eq!(back.day, day("2024-01-15"));
    }
}
