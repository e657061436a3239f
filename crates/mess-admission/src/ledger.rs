//! # Scan Ledger
//!
//! The durable, append-only record of every admission decision, and the home
//! of the uniqueness invariant: for a given (student, meal, day), at most one
//! record may carry `Allowed`.
//!
//! ## Why the invariant lives here
//!
//! The duplicate check in the pipeline is a read; a read-then-write sequence
//! is a check-then-act race under two concurrent scans of the same student.
//! The ledger therefore enforces uniqueness *inside* [`ScanLedger::append`]
//! as a single atomic conditional insert, and reports
//! [`LedgerError::DuplicateConflict`] to the racing loser. The pipeline
//! reclassifies that conflict to `BlockedDuplicate` — it is the documented
//! race, not a fault. This needs no external lock manager and holds across
//! any number of scanning front-ends sharing one ledger.

use std::collections::HashSet;

use parking_lot::Mutex;
use thiserror::Error;

use mess_core::{Meal, MealDay, StudentId};

use crate::domain::ScanRecord;

/// Errors from ledger operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// An `Allowed` record already exists for this (student, meal, day).
    /// This is the uniqueness constraint firing, possibly under the
    /// documented concurrent-scan race.
    #[error("allowed record already exists for {student_id} {meal} on {day}")]
    DuplicateConflict {
        student_id: StudentId,
        meal: Meal,
        day: MealDay,
    },

    /// The backing store could not serve the operation (unreachable, timed
    /// out). The pipeline maps this to `BlockedInternalError` — never to an
    /// admission.
    #[error("scan ledger unavailable: {0}")]
    Unavailable(String),
}

/// The ledger port the admission pipeline writes through.
///
/// `append` must enforce the (student, meal, day, `Allowed`) uniqueness
/// invariant atomically with respect to concurrent appends for the same key,
/// independent of any check the caller performed first.
pub trait ScanLedger: Send + Sync {
    /// Whether an `Allowed` record exists for the key. A pure read.
    fn exists_allowed(
        &self,
        student_id: StudentId,
        meal: Meal,
        day: MealDay,
    ) -> Result<bool, LedgerError>;

    /// Append a record. For `Allowed` records this is the atomic conditional
    /// insert; a concurrent winner causes `DuplicateConflict`.
    fn append(&self, record: ScanRecord) -> Result<(), LedgerError>;
}

// ── In-memory implementation ─────────────────────────────────────────

struct LedgerInner {
    records: Vec<ScanRecord>,
    /// Keys of all `Allowed` records, the uniqueness index.
    allowed_keys: HashSet<(StudentId, Meal, MealDay)>,
}

/// In-memory scan ledger.
///
/// One `parking_lot::Mutex` guards both the record log and the uniqueness
/// index, so the check-and-insert in [`ScanLedger::append`] is a single
/// atomic unit. The lock is never held across an await point (nothing here
/// is async).
pub struct InMemoryScanLedger {
    inner: Mutex<LedgerInner>,
}

impl InMemoryScanLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(LedgerInner {
                records: Vec::new(),
                allowed_keys: HashSet::new(),
            }),
        }
    }

    /// Copy of all records, oldest first.
    pub fn records(&self) -> Vec<ScanRecord> {
        self.inner.lock().records.clone()
    }

    /// Copy of all records for one student, oldest first.
    pub fn records_for_student(&self, student_id: StudentId) -> Vec<ScanRecord> {
        self.inner
            .lock()
            .records
            .iter()
            .filter(|r| r.student_id == student_id)
            .cloned()
            .collect()
    }

    /// Number of records in the ledger.
    pub fn len(&self) -> usize {
        self.inner.lock().records.len()
    }

    /// Whether the ledger is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryScanLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl ScanLedger for InMemoryScanLedger {
    fn exists_allowed(
        &self,
        student_id: StudentId,
        meal: Meal,
        day: MealDay,
    ) -> Result<bool, LedgerError> {
        Ok(self
            .inner
            .lock()
            .allowed_keys
            .contains(&(student_id, meal, day)))
    }

    fn append(&self, record: ScanRecord) -> Result<(), LedgerError> {
        let mut inner = self.inner.lock();
        if record.result.is_allowed() {
            let key = (record.student_id, record.meal, record.day);
            // HashSet::insert returning false means a concurrent (or prior)
            // winner already holds the key: the conditional insert fails
            // without writing.
            if !inner.allowed_keys.insert(key) {
                return Err(LedgerError::DuplicateConflict {
                    student_id: record.student_id,
                    meal: record.meal,
                    day: record.day,
                });
            }
        }
        inner.records.push(record);
        Ok(())
    }
}

impl std::fmt::Debug for InMemoryScanLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("InMemoryScanLedger")
            .field("records", &inner.records.len())
            .field("allowed_keys", &inner.allowed_keys.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ScanResult;
    use mess_core::Timestamp;

    fn day(s: &str) -> MealDay {
        MealDay::parse(s).unwrap()
    }

    fn record(student: u64, meal: Meal, d: &str, result: ScanResult) -> ScanRecord {
        ScanRecord::new(
            StudentId(student),
            meal,
            Timestamp::from_epoch_secs(1_700_000_000).unwrap(),
            day(d),
            result,
            "test-device".into(),
            None,
        )
    }

    #[test]
    fn append_then_exists() {
        let ledger = InMemoryScanLedger::new();
        assert!(!ledger
            .exists_allowed(StudentId(42), Meal::Lunch, day("2024-01-15"))
            .unwrap());

        ledger
            .append(record(42, Meal::Lunch, "2024-01-15", ScanResult::Allowed))
            .unwrap();

        assert!(ledger
            .exists_allowed(StudentId(42), Meal::Lunch, day("2024-01-15"))
            .unwrap());
    }

    #[test]
    fn second_allowed_for_same_key_conflicts() {
        let ledger = InMemoryScanLedger::new();
        ledger
            .append(record(42, Meal::Lunch, "2024-01-15", ScanResult::Allowed))
            .unwrap();

        let err = ledger
            .append(record(42, Meal::Lunch, "2024-01-15", ScanResult::Allowed))
            .unwrap_err();
        assert!(matches!(err, LedgerError::DuplicateConflict { .. }));
        // The losing record was not written.
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn different_meal_same_day_is_independent() {
        let ledger = InMemoryScanLedger::new();
        ledger
            .append(record(42, Meal::Lunch, "2024-01-15", ScanResult::Allowed))
            .unwrap();
        ledger
            .append(record(42, Meal::Dinner, "2024-01-15", ScanResult::Allowed))
            .unwrap();
        assert_eq!(ledger.len(), 2);
    }

    #[test]
    fn different_day_same_meal_is_independent() {
        let ledger = InMemoryScanLedger::new();
        ledger
            .append(record(42, Meal::Lunch, "2024-01-15", ScanResult::Allowed))
            .unwrap();
        ledger
            .append(record(42, Meal::Lunch, "2024-01-16", ScanResult::Allowed))
            .unwrap();
        assert_eq!(ledger.len(), 2);
    }

    #[test]
    fn different_students_are_independent() {
        let ledger = InMemoryScanLedger::new();
        ledger
            .append(record(42, Meal::Lunch, "2024-01-15", ScanResult::Allowed))
            .unwrap();
        ledger
            .append(record(43, Meal::Lunch, "2024-01-15", ScanResult::Allowed))
            .unwrap();
        assert_eq!(ledger.len(), 2);
    }

    #[test]
    fn blocked_records_do_not_claim_the_key() {
        let ledger = InMemoryScanLedger::new();
        ledger
            .append(record(42, Meal::Lunch, "2024-01-15", ScanResult::BlockedNoPayment))
            .unwrap();
        ledger
            .append(record(42, Meal::Lunch, "2024-01-15", ScanResult::BlockedStatus))
            .unwrap();

        // Blocked records accumulate freely; the key is still claimable.
        assert!(!ledger
            .exists_allowed(StudentId(42), Meal::Lunch, day("2024-01-15"))
            .unwrap());
        ledger
            .append(record(42, Meal::Lunch, "2024-01-15", ScanResult::Allowed))
            .unwrap();
        assert_eq!(ledger.len(), 3);
    }

    #[test]
    fn concurrent_appends_admit_exactly_once() {
        use std::sync::Arc;

        let ledger = Arc::new(InMemoryScanLedger::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let ledger = Arc::clone(&ledger);
                std::thread::spawn(move || {
                    ledger.append(record(42, Meal::Lunch, "2024-01-15", ScanResult::Allowed))
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let winners = results.iter().filter(|r| r.is_ok()).count();
        let conflicts = results
            .iter()
            .filter(|r| matches!(r, Err(LedgerError::DuplicateConflict { .. })))
            .count();

        assert_eq!(winners, 1, "exactly one concurrent append may win");
        assert_eq!(conflicts, 7);
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn records_for_student_filters() {
        let ledger = InMemoryScanLedger::new();
        ledger
            .append(record(42, Meal::Lunch, "2024-01-15", ScanResult::Allowed))
            .unwrap();
        ledger
            .append(record(43, Meal::Lunch, "2024-01-15", ScanResult::Allowed))
            .unwrap();
        let records = ledger.records_for_student(StudentId(42));
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].student_id, StudentId(42));
    }
}
