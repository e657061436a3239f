//! # Admission Pipeline
//!
//! The orchestrating state machine: raw scanned token in, exactly one
//! terminal [`ScanResult`] out.
//!
//! ```text
//! decode credential ──▶ resolve student ──▶ check live nonce
//!        │                    │                   │
//!        ▼                    ▼                   ▼
//!  BLOCKED_INVALID      BLOCKED_STUDENT     BLOCKED_INVALID
//!  _CREDENTIAL          _NOT_FOUND          _CREDENTIAL
//!  (no record)          (no record)         (no record)
//!
//! evaluate eligibility ──▶ duplicate check ──▶ conditional insert
//!        │                       │                   │
//!        ▼                       ▼                   ▼
//!  BLOCKED_STATUS /        BLOCKED_DUPLICATE     ALLOWED
//!  _NO_PAYMENT / _CUT      (pure read)           (+ notification)
//!  (record written)
//! ```
//!
//! ## Decision-scoped reads
//!
//! "Today" and the rotation `{epoch, key}` snapshot are both taken once at
//! entry and reused for every subsequent check. A decision spanning local
//! midnight cannot observe two days, and a rotation completing mid-decision
//! is observed by the next scan, not this one.
//!
//! ## Fail-closed
//!
//! Every unexpected fault (store unreachable, ledger down) terminates as
//! `BLOCKED_INTERNAL_ERROR`. There is no path on which an ambiguous check
//! admits a student. No retries happen here; the caller may retry the whole
//! decision.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use mess_core::{Meal, MealDay, StudentId, Timestamp, ZoneOffset};
use mess_credential::{verify, RotationRegistry};

use crate::audit::{ActorType, AuditEntry, AuditEventKind, AuditSink};
use crate::domain::{ScanRecord, ScanResult, Student, StudentSnapshot};
use crate::eligibility::{EligibilityBlock, EligibilityFacts, ExclusionKind};
use crate::ledger::{LedgerError, ScanLedger};
use crate::notify::{NotificationEvent, NotificationSink};

// ── Collaborator ports ───────────────────────────────────────────────

/// A collaborator store could not serve a read.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("store unavailable: {0}")]
pub struct StoreError(pub String);

/// Read access to student records.
pub trait StudentDirectory: Send + Sync {
    /// Look up a student by id. `Ok(None)` means no such student.
    fn find_by_id(&self, id: StudentId) -> Result<Option<Student>, StoreError>;
}

/// Read access to payment state.
pub trait PaymentStore: Send + Sync {
    /// Whether a verified payment window covers the given day.
    fn has_verified_payment_covering(
        &self,
        student_id: StudentId,
        day: MealDay,
    ) -> Result<bool, StoreError>;
}

/// Read access to exclusion state (personal cuts and global closures).
pub trait ExclusionStore: Send + Sync {
    /// The exclusion covering the day for this student, if any. When both a
    /// closure and a personal cut cover the day, implementations report
    /// `GlobalClosure` — the broader fact wins the staff-facing reason.
    fn exclusion_covering(
        &self,
        student_id: StudentId,
        day: MealDay,
    ) -> Result<Option<ExclusionKind>, StoreError>;
}

// ── Inputs and outputs ───────────────────────────────────────────────

/// Metadata about the scanning device, recorded verbatim on scan records.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceInfo(pub String);

impl DeviceInfo {
    /// The device description as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// The staff credential performing the scan.
#[derive(Debug, Clone)]
pub struct StaffIdentity {
    /// Human-readable label of the staff token (e.g. "counter-1").
    pub label: String,
}

/// The terminal outcome of one adjudication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanDecision {
    /// The terminal result.
    pub result: ScanResult,
    /// Staff-facing reason text, present on blocked results.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Who the student is and why, whenever an identity was resolved —
    /// even on a blocked result.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student: Option<StudentSnapshot>,
}

impl ScanDecision {
    fn blocked(result: ScanResult, reason: impl Into<String>) -> Self {
        Self {
            result,
            reason: Some(reason.into()),
            student: None,
        }
    }

    fn with_student(mut self, snapshot: StudentSnapshot) -> Self {
        self.student = Some(snapshot);
        self
    }
}

// ── Pipeline ─────────────────────────────────────────────────────────

/// The admission pipeline. Construct once with its collaborators and share;
/// every dependency is injected — there are no ambient lookups.
pub struct AdmissionPipeline {
    students: Arc<dyn StudentDirectory>,
    payments: Arc<dyn PaymentStore>,
    exclusions: Arc<dyn ExclusionStore>,
    ledger: Arc<dyn ScanLedger>,
    notifier: Arc<dyn NotificationSink>,
    audit: Arc<dyn AuditSink>,
    registry: Arc<RotationRegistry>,
    zone_offset: ZoneOffset,
}

impl AdmissionPipeline {
    /// Assemble a pipeline from its collaborators.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        students: Arc<dyn StudentDirectory>,
        payments: Arc<dyn PaymentStore>,
        exclusions: Arc<dyn ExclusionStore>,
        ledger: Arc<dyn ScanLedger>,
        notifier: Arc<dyn NotificationSink>,
        audit: Arc<dyn AuditSink>,
        registry: Arc<RotationRegistry>,
        zone_offset: ZoneOffset,
    ) -> Self {
        Self {
            students,
            payments,
            exclusions,
            ledger,
            notifier,
            audit,
            registry,
            zone_offset,
        }
    }

    /// Adjudicate a scan happening now.
    pub fn adjudicate(
        &self,
        raw_token: &str,
        meal: Meal,
        device: &DeviceInfo,
        staff: &StaffIdentity,
    ) -> ScanDecision {
        self.adjudicate_at(raw_token, meal, device, staff, Timestamp::now())
    }

    /// Adjudicate a scan at an explicit instant. Test-visible; `adjudicate`
    /// delegates here with the wall clock.
    pub fn adjudicate_at(
        &self,
        raw_token: &str,
        meal: Meal,
        device: &DeviceInfo,
        staff: &StaffIdentity,
        now: Timestamp,
    ) -> ScanDecision {
        // One day, one epoch snapshot, for the whole decision.
        let today = MealDay::from_timestamp(now, self.zone_offset);
        let snapshot = self.registry.snapshot();

        // 1. Decode the credential. No verified identity yet, so failures
        //    write no scan record.
        let credential = match verify(raw_token, snapshot.epoch, &snapshot.key) {
            Ok(credential) => credential,
            Err(err) => {
                tracing::warn!(error = %err, meal = %meal, "credential rejected");
                self.audit_credential_rejection(raw_token, &err.to_string(), meal, staff);
                return ScanDecision::blocked(
                    ScanResult::BlockedInvalidCredential,
                    err.to_string(),
                );
            }
        };
        tracing::debug!(
            student = %credential.student_id,
            age_hours = credential.age_hours(now),
            "credential verified"
        );

        // 2. Resolve the student.
        let student = match self.students.find_by_id(credential.student_id) {
            Ok(Some(student)) => student,
            Ok(None) => {
                let decision = ScanDecision::blocked(
                    ScanResult::BlockedStudentNotFound,
                    format!("no student with id {}", credential.student_id.value()),
                );
                self.audit_decision(&decision, Some(credential.student_id), meal, today, staff);
                return decision;
            }
            Err(err) => return self.internal_fault("student lookup failed", &err, meal, today, staff),
        };

        // Gather today's facts once; they feed both the snapshot staff sees
        // and the eligibility evaluation.
        let payment_ok = match self
            .payments
            .has_verified_payment_covering(student.id, today)
        {
            Ok(ok) => ok,
            Err(err) => return self.internal_fault("payment lookup failed", &err, meal, today, staff),
        };
        let exclusion = match self.exclusions.exclusion_covering(student.id, today) {
            Ok(exclusion) => exclusion,
            Err(err) => {
                return self.internal_fault("exclusion lookup failed", &err, meal, today, staff)
            }
        };
        let student_snapshot = StudentSnapshot {
            id: student.id,
            name: student.name.clone(),
            roll_no: student.roll_no.clone(),
            room_no: student.room_no.clone(),
            approval_status: student.approval_status,
            payment_ok,
            cut_today: exclusion == Some(ExclusionKind::PersonalCut),
            closure_today: exclusion == Some(ExclusionKind::GlobalClosure),
        };

        // 3. Live nonce check — catches tokens outlived by a targeted
        //    re-issue. Identity is resolved, so the snapshot is attached,
        //    but no record is written: there is no admission event, only a
        //    revoked credential.
        if credential.nonce != student.credential_nonce {
            tracing::warn!(student = %student.id, "credential nonce superseded by re-issue");
            self.audit_credential_rejection(raw_token, "nonce mismatch", meal, staff);
            return ScanDecision::blocked(
                ScanResult::BlockedInvalidCredential,
                "credential superseded; ask the student to refresh their QR code",
            )
            .with_student(student_snapshot);
        }

        // 4–6. Eligibility, in priority order. These blocks are operational
        //      facts staff act on, so each writes a scan record.
        let facts = EligibilityFacts {
            approval: student.approval_status,
            payment_ok,
            exclusion,
        };
        if let Some(block) = facts.blocking_reason() {
            let result = match block {
                EligibilityBlock::Status(_) => ScanResult::BlockedStatus,
                EligibilityBlock::NoPayment => ScanResult::BlockedNoPayment,
                EligibilityBlock::Excluded(_) => ScanResult::BlockedCut,
            };
            let record = ScanRecord::new(
                student.id,
                meal,
                now,
                today,
                result,
                device.0.clone(),
                Some(staff.label.clone()),
            );
            if let Err(err) = self.ledger.append(record) {
                return self.internal_fault("ledger append failed", &err, meal, today, staff);
            }
            let decision = ScanDecision::blocked(result, block.reason_text())
                .with_student(student_snapshot);
            self.audit_decision(&decision, Some(student.id), meal, today, staff);
            return decision;
        }

        // 7. Duplicate check — a pure read. A prior Allowed record means a
        //    meal was already served; nothing new is written.
        match self.ledger.exists_allowed(student.id, meal, today) {
            Ok(true) => {
                let decision = ScanDecision::blocked(
                    ScanResult::BlockedDuplicate,
                    format!("{meal} already served today"),
                )
                .with_student(student_snapshot);
                self.audit_decision(&decision, Some(student.id), meal, today, staff);
                return decision;
            }
            Ok(false) => {}
            Err(err) => return self.internal_fault("ledger read failed", &err, meal, today, staff),
        }

        // 8. Admit — the atomic conditional insert. Losing the race to a
        //    concurrent scan surfaces as DuplicateConflict and is the
        //    documented duplicate case, not a fault.
        let record = ScanRecord::new(
            student.id,
            meal,
            now,
            today,
            ScanResult::Allowed,
            device.0.clone(),
            Some(staff.label.clone()),
        );
        match self.ledger.append(record) {
            Ok(()) => {
                // Decision is final; the notification is off the critical
                // path and can never un-admit.
                self.notifier
                    .notify(student.id, NotificationEvent::MealAdmitted { meal, day: today });
                let decision = ScanDecision {
                    result: ScanResult::Allowed,
                    reason: None,
                    student: Some(student_snapshot),
                };
                self.audit_decision(&decision, Some(student.id), meal, today, staff);
                decision
            }
            Err(LedgerError::DuplicateConflict { .. }) => {
                let decision = ScanDecision::blocked(
                    ScanResult::BlockedDuplicate,
                    format!("{meal} already served today"),
                )
                .with_student(student_snapshot);
                self.audit_decision(&decision, Some(student.id), meal, today, staff);
                decision
            }
            Err(err) => self.internal_fault("ledger append failed", &err, meal, today, staff),
        }
    }

    // ── Fault and audit plumbing ─────────────────────────────────────

    /// Map an internal fault to the fail-closed terminal result.
    fn internal_fault(
        &self,
        context: &str,
        err: &dyn std::fmt::Display,
        meal: Meal,
        today: MealDay,
        staff: &StaffIdentity,
    ) -> ScanDecision {
        tracing::error!(error = %err, context, "admission fault; failing closed");
        let decision = ScanDecision::blocked(
            ScanResult::BlockedInternalError,
            "internal error; please retry",
        );
        self.audit_decision(&decision, None, meal, today, staff);
        decision
    }

    fn audit_decision(
        &self,
        decision: &ScanDecision,
        student_id: Option<StudentId>,
        meal: Meal,
        today: MealDay,
        staff: &StaffIdentity,
    ) {
        self.audit.record(AuditEntry::new(
            ActorType::Staff,
            Some(staff.label.clone()),
            AuditEventKind::ScanAdjudicated,
            serde_json::json!({
                "student_id": student_id.map(|id| id.value()),
                "meal": meal.as_str(),
                "day": today.to_string(),
                "result": decision.result.as_str(),
                "reason": decision.reason,
            }),
        ));
    }

    fn audit_credential_rejection(
        &self,
        raw_token: &str,
        cause: &str,
        meal: Meal,
        staff: &StaffIdentity,
    ) {
        self.audit.record(AuditEntry::new(
            ActorType::Staff,
            Some(staff.label.clone()),
            AuditEventKind::CredentialRejected,
            serde_json::json!({
                "token": redact_token(raw_token),
                "error": cause,
                "meal": meal.as_str(),
            }),
        ));
    }
}

impl std::fmt::Debug for AdmissionPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdmissionPipeline")
            .field("epoch", &self.registry.current_epoch())
            .field("zone_offset", &self.zone_offset)
            .finish()
    }
}

/// Short prefix of a raw (possibly unparseable) token, for audit payloads.
/// Mirrors `MealToken::redacted`: 12 characters, never enough to replay.
fn redact_token(raw: &str) -> String {
    let prefix: String = raw.chars().take(12).collect();
    format!("{prefix}…")
}
