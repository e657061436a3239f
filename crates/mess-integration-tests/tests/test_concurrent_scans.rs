//! The one genuine concurrency hazard: two devices scanning the same
//! student for the same meal within the same day, concurrently. Exactly one
//! may be admitted; the ledger's atomic conditional insert decides the
//! winner, not thread timing.

use std::sync::Arc;
use std::thread;

use mess_admission::{
    AdmissionPipeline, ApprovalStatus, DeviceInfo, PaymentSource, PaymentStatus, PaymentWindow,
    ScanResult, StaffIdentity, Student,
};
use mess_api::state::{AppConfig, AppState};
use mess_core::{Meal, MealDay, StudentId, Timestamp, ZoneOffset};
use mess_credential::{mint, SecretKey};

/// A fixed instant (2024-01-15T12:00:00Z) so every thread adjudicates the
/// same calendar day.
const NOON: i64 = 1_705_320_000;

fn now() -> Timestamp {
    Timestamp::from_epoch_secs(NOON).unwrap()
}

/// Build an AppState (zero zone offset for determinism) with one approved,
/// paid student, and return the pipeline plus their token.
fn seeded_pipeline() -> (AppState, Arc<AdmissionPipeline>, String) {
    let config = AppConfig {
        zone_offset: ZoneOffset::from_minutes(0).unwrap(),
        ..AppConfig::default()
    };
    let state = AppState::with_parts(config, SecretKey::from_bytes([0xee; 32]));

    let id = state.students.allocate_id();
    let mut student = Student::register(
        id,
        "Asha".into(),
        "B21".into(),
        "114".into(),
        "+911234567890".into(),
        state.registry.current_epoch(),
        now(),
    );
    student.approval_status = ApprovalStatus::Approved;
    state.students.upsert(student.clone());

    let mut window = PaymentWindow::upload(
        id,
        MealDay::parse("2024-01-01").unwrap(),
        MealDay::parse("2024-01-31").unwrap(),
        "3200".into(),
        PaymentSource::OfflineManual,
        now(),
    )
    .unwrap();
    window.status = PaymentStatus::Verified;
    state.payments.try_insert(window);

    let snapshot = state.registry.snapshot();
    let token = mint(id, &student.credential_nonce, snapshot.epoch, &snapshot.key, now());

    let pipeline = state.pipeline.clone();
    (state, pipeline, token.into_string())
}

#[test]
fn two_racing_scans_admit_exactly_one() {
    let (state, pipeline, token) = seeded_pipeline();

    let results: Vec<ScanResult> = {
        let handles: Vec<_> = (0..2)
            .map(|i| {
                let pipeline = Arc::clone(&pipeline);
                let token = token.clone();
                thread::spawn(move || {
                    pipeline
                        .adjudicate_at(
                            &token,
                            Meal::Lunch,
                            &DeviceInfo(format!("device-{i}")),
                            &StaffIdentity {
                                label: format!("counter-{i}"),
                            },
                            now(),
                        )
                        .result
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    };

    let allowed = results.iter().filter(|r| r.is_allowed()).count();
    let duplicates = results
        .iter()
        .filter(|r| **r == ScanResult::BlockedDuplicate)
        .count();
    assert_eq!(allowed, 1, "exactly one racing scan may admit: {results:?}");
    assert_eq!(duplicates, 1, "the loser must see a duplicate: {results:?}");

    // One Allowed record in the ledger, regardless of who won.
    let records = state.ledger.records();
    assert_eq!(records.iter().filter(|r| r.result.is_allowed()).count(), 1);
}

#[test]
fn many_racing_scans_still_admit_exactly_one() {
    let (state, pipeline, token) = seeded_pipeline();

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let pipeline = Arc::clone(&pipeline);
            let token = token.clone();
            thread::spawn(move || {
                pipeline
                    .adjudicate_at(
                        &token,
                        Meal::Dinner,
                        &DeviceInfo(format!("device-{i}")),
                        &StaffIdentity {
                            label: format!("counter-{i}"),
                        },
                        now(),
                    )
                    .result
            })
        })
        .collect();
    let results: Vec<ScanResult> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(results.iter().filter(|r| r.is_allowed()).count(), 1);
    assert!(results
        .iter()
        .all(|r| r.is_allowed() || *r == ScanResult::BlockedDuplicate));
    assert_eq!(
        state
            .ledger
            .records()
            .iter()
            .filter(|r| r.result.is_allowed())
            .count(),
        1
    );
}

#[test]
fn racing_scans_for_different_meals_are_independent() {
    let (state, pipeline, token) = seeded_pipeline();

    let meals = [Meal::Breakfast, Meal::Lunch, Meal::Dinner];
    let handles: Vec<_> = meals
        .iter()
        .map(|meal| {
            let pipeline = Arc::clone(&pipeline);
            let token = token.clone();
            let meal = *meal;
            thread::spawn(move || {
                pipeline
                    .adjudicate_at(
                        &token,
                        meal,
                        &DeviceInfo("device".into()),
                        &StaffIdentity {
                            label: "counter-1".into(),
                        },
                        now(),
                    )
                    .result
            })
        })
        .collect();
    let results: Vec<ScanResult> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    // All three meals admit — the uniqueness key includes the meal.
    assert!(results.iter().all(|r| r.is_allowed()), "{results:?}");
    assert_eq!(state.ledger.records().len(), 3);
}

#[test]
fn racing_scans_for_different_students_are_independent() {
    let config = AppConfig {
        zone_offset: ZoneOffset::from_minutes(0).unwrap(),
        ..AppConfig::default()
    };
    let state = AppState::with_parts(config, SecretKey::from_bytes([0xef; 32]));

    let mut tokens = Vec::new();
    for roll in ["B21", "B22", "B23", "B24"] {
        let id = state.students.allocate_id();
        let mut student = Student::register(
            id,
            format!("Student {roll}"),
            roll.into(),
            "100".into(),
            "+911234567890".into(),
            state.registry.current_epoch(),
            now(),
        );
        student.approval_status = ApprovalStatus::Approved;
        state.students.upsert(student.clone());

        let mut window = PaymentWindow::upload(
            id,
            MealDay::parse("2024-01-01").unwrap(),
            MealDay::parse("2024-01-31").unwrap(),
            "3200".into(),
            PaymentSource::OfflineManual,
            now(),
        )
        .unwrap();
        window.status = PaymentStatus::Verified;
        state.payments.try_insert(window);

        let snapshot = state.registry.snapshot();
        let token = mint(id, &student.credential_nonce, snapshot.epoch, &snapshot.key, now());
        tokens.push((id, token.into_string()));
    }

    let pipeline = state.pipeline.clone();
    let handles: Vec<_> = tokens
        .into_iter()
        .map(|(id, token)| {
            let pipeline = Arc::clone(&pipeline);
            thread::spawn(move || {
                let result = pipeline
                    .adjudicate_at(
                        &token,
                        Meal::Lunch,
                        &DeviceInfo("device".into()),
                        &StaffIdentity {
                            label: "counter-1".into(),
                        },
                        now(),
                    )
                    .result;
                (id, result)
            })
        })
        .collect();

    for handle in handles {
        let (id, result) = handle.join().unwrap();
        assert!(result.is_allowed(), "{id:?} should be admitted");
    }
    assert_eq!(state.ledger.records().len(), 4);
    // Each student holds exactly one Allowed lunch record.
    for id in 1..=4u64 {
        assert_eq!(state.ledger.records_for_student(StudentId(id)).len(), 1);
    }
}
