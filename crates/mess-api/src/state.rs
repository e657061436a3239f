//! # Application State
//!
//! Shared state for the Axum application, passed to all route handlers via
//! the `State` extractor.
//!
//! ## Architecture
//!
//! The in-memory stores here are the reference implementations of the
//! admission engine's collaborator ports (`StudentDirectory`, `PaymentStore`,
//! `ExclusionStore`). The engine itself never knows it is talking to them —
//! a deployment backed by a database swaps the implementations, not the
//! pipeline.
//!
//! All store operations are synchronous (`parking_lot`, not `tokio::sync`)
//! because no lock is ever held across an `.await` point, and
//! `parking_lot` locks do not poison — a panicking writer cannot
//! permanently corrupt a store.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use mess_admission::{
    AdmissionPipeline, ExclusionKind, ExclusionStore, InMemoryScanLedger, MessClosure, MessCut,
    NotificationSink, PaymentStore, PaymentWindow, ScanLedger, SharedAuditTrail, StoreError,
    Student, StudentDirectory,
};
use mess_core::{MealDay, PaymentId, StudentId, ZoneOffset};
use mess_credential::{RotationRegistry, SecretKey};

use crate::notify::SpawnedNotificationSink;

// ── Generic In-Memory Store ──────────────────────────────────────────

/// Thread-safe, cloneable in-memory key-value store.
#[derive(Debug)]
pub struct Store<K: Eq + Hash + Clone, T: Clone + Send + Sync> {
    data: Arc<RwLock<HashMap<K, T>>>,
}

impl<K: Eq + Hash + Clone, T: Clone + Send + Sync> Clone for Store<K, T> {
    fn clone(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
        }
    }
}

impl<K: Eq + Hash + Clone, T: Clone + Send + Sync> Store<K, T> {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Insert a record, returning the previous value if the key existed.
    pub fn insert(&self, key: K, value: T) -> Option<T> {
        self.data.write().insert(key, value)
    }

    /// Retrieve a record by key.
    pub fn get(&self, key: &K) -> Option<T> {
        self.data.read().get(key).cloned()
    }

    /// List all records.
    pub fn list(&self) -> Vec<T> {
        self.data.read().values().cloned().collect()
    }

    /// Update a record in place. Returns the updated record, or `None` if
    /// not found. Runs under a single write lock.
    pub fn update(&self, key: &K, f: impl FnOnce(&mut T)) -> Option<T> {
        let mut guard = self.data.write();
        if let Some(entry) = guard.get_mut(key) {
            f(entry);
            Some(entry.clone())
        } else {
            None
        }
    }

    /// Whether any record satisfies the predicate.
    pub fn any(&self, f: impl Fn(&T) -> bool) -> bool {
        self.data.read().values().any(f)
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K: Eq + Hash + Clone, T: Clone + Send + Sync> Default for Store<K, T> {
    fn default() -> Self {
        Self::new()
    }
}

// ── Student roster ───────────────────────────────────────────────────

/// The student directory: registration assigns sequential opaque ids.
#[derive(Debug, Clone)]
pub struct StudentRoster {
    store: Store<StudentId, Student>,
    next_id: Arc<AtomicU64>,
}

impl StudentRoster {
    /// Create an empty roster; ids start at 1.
    pub fn new() -> Self {
        Self {
            store: Store::new(),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Allocate the next student id.
    pub fn allocate_id(&self) -> StudentId {
        StudentId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Insert or replace a student record.
    pub fn upsert(&self, student: Student) {
        self.store.insert(student.id, student);
    }

    /// Fetch a student by id.
    pub fn get(&self, id: StudentId) -> Option<Student> {
        self.store.get(&id)
    }

    /// Whether a student with this roll number already exists.
    pub fn roll_no_taken(&self, roll_no: &str) -> bool {
        self.store.any(|s| s.roll_no == roll_no)
    }

    /// Update a student in place.
    pub fn update(&self, id: StudentId, f: impl FnOnce(&mut Student)) -> Option<Student> {
        self.store.update(&id, f)
    }

    /// All students.
    pub fn list(&self) -> Vec<Student> {
        self.store.list()
    }
}

impl Default for StudentRoster {
    fn default() -> Self {
        Self::new()
    }
}

impl StudentDirectory for StudentRoster {
    fn find_by_id(&self, id: StudentId) -> Result<Option<Student>, StoreError> {
        Ok(self.get(id))
    }
}

// ── Payment book ─────────────────────────────────────────────────────

/// Payment windows, with the at-most-one-per-(student, cycle start)
/// constraint enforced at insert.
///
/// Uses its own map rather than the generic [`Store`] so that the
/// uniqueness check and the insert run under one write lock — the same
/// conditional-insert discipline the scan ledger follows.
#[derive(Debug, Clone, Default)]
pub struct PaymentBook {
    windows: Arc<RwLock<HashMap<PaymentId, PaymentWindow>>>,
}

impl PaymentBook {
    /// Create an empty book.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a window unless one already exists for (student, cycle start).
    /// Returns `false` (and inserts nothing) on conflict. Atomic under one
    /// write lock.
    pub fn try_insert(&self, window: PaymentWindow) -> bool {
        let mut guard = self.windows.write();
        if guard.values().any(|w| {
            w.student_id == window.student_id && w.cycle_start == window.cycle_start
        }) {
            return false;
        }
        guard.insert(window.id, window);
        true
    }

    /// Fetch a window by id.
    pub fn get(&self, id: PaymentId) -> Option<PaymentWindow> {
        self.windows.read().get(&id).cloned()
    }

    /// Update a window in place.
    pub fn update(
        &self,
        id: PaymentId,
        f: impl FnOnce(&mut PaymentWindow),
    ) -> Option<PaymentWindow> {
        let mut guard = self.windows.write();
        if let Some(entry) = guard.get_mut(&id) {
            f(entry);
            Some(entry.clone())
        } else {
            None
        }
    }

    /// All windows for one student.
    pub fn for_student(&self, student_id: StudentId) -> Vec<PaymentWindow> {
        self.windows
            .read()
            .values()
            .filter(|w| w.student_id == student_id)
            .cloned()
            .collect()
    }
}

impl PaymentStore for PaymentBook {
    fn has_verified_payment_covering(
        &self,
        student_id: StudentId,
        day: MealDay,
    ) -> Result<bool, StoreError> {
        Ok(self
            .windows
            .read()
            .values()
            .any(|w| w.student_id == student_id && w.grants_access_on(day)))
    }
}

// ── Exclusion book ───────────────────────────────────────────────────

/// Mess cuts (per student) and closures (global).
#[derive(Debug, Clone, Default)]
pub struct ExclusionBook {
    cuts: Arc<RwLock<Vec<MessCut>>>,
    closures: Arc<RwLock<Vec<MessClosure>>>,
}

impl ExclusionBook {
    /// Create an empty book.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a mess cut.
    pub fn add_cut(&self, cut: MessCut) {
        self.cuts.write().push(cut);
    }

    /// Record a mess-wide closure.
    pub fn add_closure(&self, closure: MessClosure) {
        self.closures.write().push(closure);
    }

    /// All cuts for one student.
    pub fn cuts_for_student(&self, student_id: StudentId) -> Vec<MessCut> {
        self.cuts
            .read()
            .iter()
            .filter(|c| c.student_id == student_id)
            .cloned()
            .collect()
    }
}

impl ExclusionStore for ExclusionBook {
    fn exclusion_covering(
        &self,
        student_id: StudentId,
        day: MealDay,
    ) -> Result<Option<ExclusionKind>, StoreError> {
        // The broader fact wins the staff-facing reason.
        if self.closures.read().iter().any(|c| c.covers(day)) {
            return Ok(Some(ExclusionKind::GlobalClosure));
        }
        if self
            .cuts
            .read()
            .iter()
            .any(|c| c.student_id == student_id && c.covers(day))
        {
            return Ok(Some(ExclusionKind::PersonalCut));
        }
        Ok(None)
    }
}

// ── Application configuration ────────────────────────────────────────

/// Application configuration.
///
/// Custom `Debug` redacts the auth token to prevent credential leakage in
/// logs.
#[derive(Clone)]
pub struct AppConfig {
    /// Port to bind the HTTP server to.
    pub port: u16,
    /// Static bearer token secret. If `None`, authentication is disabled
    /// (development mode).
    pub auth_token: Option<String>,
    /// The mess's UTC offset, for calendar-day computation.
    pub zone_offset: ZoneOffset,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("port", &self.port)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "[REDACTED]"))
            .field("zone_offset", &self.zone_offset)
            .finish()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            auth_token: None,
            zone_offset: ZoneOffset::default(),
        }
    }
}

/// Error loading the HMAC secret key from the environment.
#[derive(Debug, thiserror::Error)]
pub enum SecretKeyLoadError {
    /// `MESS_SECRET_KEY_HEX` was set but not valid key material.
    #[error("MESS_SECRET_KEY_HEX invalid: {0}")]
    Invalid(#[from] mess_credential::secret::KeyError),
}

/// Load the credential secret key from the environment, or generate one for
/// development.
///
/// In production, `MESS_SECRET_KEY_HEX` provides the 64-character hex-encoded
/// key. When the variable is absent a fresh key is generated and a warning is
/// logged — tokens minted under it will not verify after a restart.
fn load_or_generate_secret_key() -> Result<SecretKey, SecretKeyLoadError> {
    match std::env::var("MESS_SECRET_KEY_HEX") {
        Ok(hex) => Ok(SecretKey::from_hex(&hex)?),
        Err(_) => {
            tracing::warn!(
                "MESS_SECRET_KEY_HEX not set — generating ephemeral key. \
                 Meal credentials minted with this key will not verify after restart."
            );
            Ok(SecretKey::generate())
        }
    }
}

// ── Application state ────────────────────────────────────────────────

/// Shared application state accessible to all route handlers.
///
/// Clone-friendly via `Arc` internals in each store. The pipeline is wired
/// once, at construction, against these stores.
#[derive(Clone)]
pub struct AppState {
    pub students: StudentRoster,
    pub payments: PaymentBook,
    pub exclusions: ExclusionBook,
    pub ledger: Arc<InMemoryScanLedger>,
    pub audit: SharedAuditTrail,
    pub registry: Arc<RotationRegistry>,
    pub notifier: Arc<dyn NotificationSink>,
    pub pipeline: Arc<AdmissionPipeline>,
    pub config: AppConfig,
}

impl AppState {
    /// Create application state with default configuration.
    ///
    /// # Panics
    ///
    /// Panics if `MESS_SECRET_KEY_HEX` is set but invalid. Prefer
    /// [`AppState::try_with_config`] in production startup paths.
    pub fn new() -> Self {
        Self::try_with_config(AppConfig::default())
            .expect("failed to initialize AppState (check MESS_SECRET_KEY_HEX)")
    }

    /// Create application state with the given configuration, returning
    /// `Err` if secret key loading fails.
    pub fn try_with_config(config: AppConfig) -> Result<Self, SecretKeyLoadError> {
        let key = load_or_generate_secret_key()?;
        Ok(Self::with_parts(config, key))
    }

    /// Create application state from explicit parts (tests, fixtures).
    pub fn with_parts(config: AppConfig, key: SecretKey) -> Self {
        let students = StudentRoster::new();
        let payments = PaymentBook::new();
        let exclusions = ExclusionBook::new();
        let ledger = Arc::new(InMemoryScanLedger::new());
        let audit = SharedAuditTrail::new();
        let registry = Arc::new(RotationRegistry::new(key));
        let notifier: Arc<dyn NotificationSink> = Arc::new(SpawnedNotificationSink::new());

        let pipeline = Arc::new(AdmissionPipeline::new(
            Arc::new(students.clone()),
            Arc::new(payments.clone()),
            Arc::new(exclusions.clone()),
            ledger.clone() as Arc<dyn ScanLedger>,
            notifier.clone(),
            Arc::new(audit.clone()),
            registry.clone(),
            config.zone_offset,
        ));

        Self {
            students,
            payments,
            exclusions,
            ledger,
            audit,
            registry,
            notifier,
            pipeline,
            config,
        }
    }
}

impl AppState {
    /// The current mess-local calendar day.
    pub fn today(&self) -> MealDay {
        MealDay::from_timestamp(mess_core::Timestamp::now(), self.config.zone_offset)
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("students", &self.students.list().len())
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mess_admission::{AppliedBy, PaymentSource, PaymentStatus};
    use mess_core::Timestamp;
    use mess_credential::RotationEpoch;

    fn day(s: &str) -> MealDay {
        MealDay::parse(s).unwrap()
    }

    fn now() -> Timestamp {
        Timestamp::from_epoch_secs(1_705_320_000).unwrap()
    }

    fn test_state() -> AppState {
        AppState::with_parts(AppConfig::default(), SecretKey::from_bytes([0x44; 32]))
    }

    // ── Store<K, T> ──────────────────────────────────────────────

    #[test]
    fn store_insert_get_update() {
        let store: Store<u32, String> = Store::new();
        assert!(store.insert(1, "a".into()).is_none());
        assert_eq!(store.get(&1).unwrap(), "a");
        store.update(&1, |v| v.push('b'));
        assert_eq!(store.get(&1).unwrap(), "ab");
        assert!(store.update(&2, |_| {}).is_none());
    }

    // ── StudentRoster ────────────────────────────────────────────

    #[test]
    fn roster_allocates_sequential_ids() {
        let roster = StudentRoster::new();
        assert_eq!(roster.allocate_id(), StudentId(1));
        assert_eq!(roster.allocate_id(), StudentId(2));
    }

    #[test]
    fn roster_detects_duplicate_roll_no() {
        let roster = StudentRoster::new();
        let id = roster.allocate_id();
        roster.upsert(Student::register(
            id,
            "Asha".into(),
            "B21".into(),
            "114".into(),
            "+911234567890".into(),
            RotationEpoch(1),
            now(),
        ));
        assert!(roster.roll_no_taken("B21"));
        assert!(!roster.roll_no_taken("B22"));
    }

    #[test]
    fn roster_serves_directory_port() {
        let roster = StudentRoster::new();
        let id = roster.allocate_id();
        roster.upsert(Student::register(
            id,
            "Asha".into(),
            "B21".into(),
            "114".into(),
            "+911234567890".into(),
            RotationEpoch(1),
            now(),
        ));
        assert!(roster.find_by_id(id).unwrap().is_some());
        assert!(roster.find_by_id(StudentId(99)).unwrap().is_none());
    }

    // ── PaymentBook ──────────────────────────────────────────────

    fn window(student: u64, from: &str, to: &str) -> PaymentWindow {
        PaymentWindow::upload(
            StudentId(student),
            day(from),
            day(to),
            "3200".into(),
            PaymentSource::OnlineScreenshot,
            now(),
        )
        .unwrap()
    }

    #[test]
    fn payment_book_enforces_cycle_uniqueness() {
        let book = PaymentBook::new();
        assert!(book.try_insert(window(1, "2024-01-01", "2024-01-31")));
        // Same student, same cycle start: rejected.
        assert!(!book.try_insert(window(1, "2024-01-01", "2024-01-15")));
        // Different student: fine.
        assert!(book.try_insert(window(2, "2024-01-01", "2024-01-31")));
        // Same student, different cycle: fine.
        assert!(book.try_insert(window(1, "2024-02-01", "2024-02-29")));
    }

    #[test]
    fn only_verified_windows_answer_payment_port() {
        let book = PaymentBook::new();
        let w = window(1, "2024-01-01", "2024-01-31");
        let id = w.id;
        book.try_insert(w);

        assert!(!book
            .has_verified_payment_covering(StudentId(1), day("2024-01-15"))
            .unwrap());

        book.update(id, |w| w.status = PaymentStatus::Verified);
        assert!(book
            .has_verified_payment_covering(StudentId(1), day("2024-01-15"))
            .unwrap());
        assert!(!book
            .has_verified_payment_covering(StudentId(1), day("2024-02-15"))
            .unwrap());
    }

    // ── ExclusionBook ────────────────────────────────────────────

    #[test]
    fn closure_wins_over_personal_cut() {
        let book = ExclusionBook::new();
        book.add_cut(
            MessCut::new(
                StudentId(1),
                day("2024-01-15"),
                day("2024-01-15"),
                AppliedBy::Student,
                true,
                now(),
            )
            .unwrap(),
        );
        book.add_closure(
            MessClosure::new(day("2024-01-15"), day("2024-01-15"), None, now()).unwrap(),
        );
        assert_eq!(
            book.exclusion_covering(StudentId(1), day("2024-01-15")).unwrap(),
            Some(ExclusionKind::GlobalClosure)
        );
    }

    #[test]
    fn cut_applies_only_to_its_student() {
        let book = ExclusionBook::new();
        book.add_cut(
            MessCut::new(
                StudentId(1),
                day("2024-01-15"),
                day("2024-01-16"),
                AppliedBy::Student,
                true,
                now(),
            )
            .unwrap(),
        );
        assert_eq!(
            book.exclusion_covering(StudentId(1), day("2024-01-15")).unwrap(),
            Some(ExclusionKind::PersonalCut)
        );
        assert_eq!(
            book.exclusion_covering(StudentId(2), day("2024-01-15")).unwrap(),
            None
        );
    }

    // ── AppConfig / AppState ─────────────────────────────────────

    #[test]
    fn config_debug_redacts_token() {
        let config = AppConfig {
            auth_token: Some("super-secret".into()),
            ..AppConfig::default()
        };
        let debug = format!("{config:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("super-secret"));
    }

    #[test]
    fn state_wires_a_working_pipeline() {
        let state = test_state();
        assert_eq!(state.registry.current_epoch(), RotationEpoch::INITIAL);
        assert!(state.ledger.is_empty());
        assert!(state.audit.is_empty());
    }
}
