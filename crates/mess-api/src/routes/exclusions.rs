//! # Mess Cuts and Closures
//!
//! The two exclusion kinds: per-student cuts (self-service opt-outs) and
//! mess-wide closures. Either covering today blocks admission; the closure
//! wins the staff-facing reason when both apply.
//!
//! ## Endpoints
//!
//! - `POST /v1/cuts` — apply a mess cut for a student (staff).
//! - `POST /v1/closures` — declare a mess-wide closure (admin).

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use mess_admission::{
    ActorType, AppliedBy, AuditEntry, AuditEventKind, AuditSink, MessClosure, MessCut,
    NotificationEvent,
};
use mess_core::{MealDay, StudentId, Timestamp};

use crate::auth::{require_role, CallerIdentity, Role};
use crate::error::AppError;
use crate::state::AppState;

// ── Request / Response types ─────────────────────────────────────────

/// Request body for a mess cut.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CutRequest {
    pub student_id: u64,
    /// First excluded day, `YYYY-MM-DD`.
    pub from_date: String,
    /// Last excluded day (inclusive), `YYYY-MM-DD`.
    pub to_date: String,
    /// Whether the cut was entered on the student's behalf by the admin
    /// system rather than self-service.
    #[serde(default)]
    pub admin_applied: bool,
}

/// Request body for a closure.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ClosureRequest {
    /// First closed day, `YYYY-MM-DD`.
    pub from_date: String,
    /// Last closed day (inclusive), `YYYY-MM-DD`.
    pub to_date: String,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Acknowledgement for an exclusion write.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ExclusionResponse {
    pub from_date: String,
    pub to_date: String,
    /// Whether the request was honored before the evening cutoff of its
    /// first day (cuts only; closures always `true`).
    pub cutoff_honored: bool,
}

// ── Router ───────────────────────────────────────────────────────────

/// Build the exclusions router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/cuts", post(apply_cut))
        .route("/v1/closures", post(declare_closure))
}

fn parse_day(field: &str, value: &str) -> Result<MealDay, AppError> {
    MealDay::parse(value).map_err(|_| {
        AppError::Validation(format!("{field} must be a YYYY-MM-DD date, got {value:?}"))
    })
}

// ── Handlers ─────────────────────────────────────────────────────────

/// POST /v1/cuts — apply a mess cut.
///
/// A cut starting tomorrow or later honors the cutoff; one starting today
/// (or in the past) is still recorded, flagged as past-cutoff for billing.
#[utoipa::path(
    post,
    path = "/v1/cuts",
    request_body = CutRequest,
    responses(
        (status = 201, description = "Cut applied", body = ExclusionResponse),
        (status = 404, description = "Student not found", body = crate::error::ErrorBody),
    ),
    tag = "exclusions"
)]
pub(crate) async fn apply_cut(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Json(body): Json<CutRequest>,
) -> Result<(StatusCode, Json<ExclusionResponse>), AppError> {
    require_role(&caller, Role::Staff)?;

    let student_id = StudentId(body.student_id);
    if state.students.get(student_id).is_none() {
        return Err(AppError::NotFound(format!(
            "student {} not found",
            body.student_id
        )));
    }

    let from_day = parse_day("from_date", &body.from_date)?;
    let to_day = parse_day("to_date", &body.to_date)?;
    let cutoff_honored = from_day > state.today();

    let cut = MessCut::new(
        student_id,
        from_day,
        to_day,
        if body.admin_applied {
            AppliedBy::AdminSystem
        } else {
            AppliedBy::Student
        },
        cutoff_honored,
        Timestamp::now(),
    )?;
    state.exclusions.add_cut(cut);

    state.notifier.notify(
        student_id,
        NotificationEvent::MessCutApplied { from_day, to_day },
    );
    state.audit.record(AuditEntry::new(
        ActorType::Staff,
        Some(caller.label.clone()),
        AuditEventKind::MessCutApplied,
        serde_json::json!({
            "student_id": body.student_id,
            "from": from_day.to_string(),
            "to": to_day.to_string(),
            "cutoff_honored": cutoff_honored,
        }),
    ));

    Ok((
        StatusCode::CREATED,
        Json(ExclusionResponse {
            from_date: from_day.to_string(),
            to_date: to_day.to_string(),
            cutoff_honored,
        }),
    ))
}

/// POST /v1/closures — declare a mess-wide closure.
#[utoipa::path(
    post,
    path = "/v1/closures",
    request_body = ClosureRequest,
    responses(
        (status = 201, description = "Closure declared", body = ExclusionResponse),
    ),
    tag = "exclusions"
)]
pub(crate) async fn declare_closure(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Json(body): Json<ClosureRequest>,
) -> Result<(StatusCode, Json<ExclusionResponse>), AppError> {
    require_role(&caller, Role::Admin)?;

    let from_day = parse_day("from_date", &body.from_date)?;
    let to_day = parse_day("to_date", &body.to_date)?;

    let closure = MessClosure::new(from_day, to_day, body.reason.clone(), Timestamp::now())?;
    state.exclusions.add_closure(closure);

    state.audit.record(AuditEntry::new(
        ActorType::Admin,
        Some(caller.label.clone()),
        AuditEventKind::ClosureDeclared,
        serde_json::json!({
            "from": from_day.to_string(),
            "to": to_day.to_string(),
            "reason": body.reason,
        }),
    ));

    Ok((
        StatusCode::CREATED,
        Json(ExclusionResponse {
            from_date: from_day.to_string(),
            to_date: to_day.to_string(),
            cutoff_honored: true,
        }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use mess_admission::{ExclusionKind, ExclusionStore, Student};
    use mess_credential::SecretKey;
    use tower::ServiceExt;

    use crate::state::AppConfig;

    fn test_state_with_student() -> AppState {
        let state = AppState::with_parts(AppConfig::default(), SecretKey::from_bytes([0x88; 32]));
        let id = state.students.allocate_id();
        state.students.upsert(Student::register(
            id,
            "Asha".into(),
            "B21".into(),
            "114".into(),
            "+911234567890".into(),
            state.registry.current_epoch(),
            Timestamp::now(),
        ));
        state
    }

    fn admin_app(state: AppState) -> Router {
        Router::new()
            .merge(router())
            .layer(axum::Extension(CallerIdentity {
                role: Role::Admin,
                label: "warden".into(),
            }))
            .with_state(state)
    }

    fn staff_app(state: AppState) -> Router {
        Router::new()
            .merge(router())
            .layer(axum::Extension(CallerIdentity {
                role: Role::Staff,
                label: "counter-1".into(),
            }))
            .with_state(state)
    }

    async fn post_json(app: &Router, uri: &str, body: serde_json::Value) -> (StatusCode, serde_json::Value) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn cut_excludes_its_range() {
        let state = test_state_with_student();
        let app = staff_app(state.clone());

        let (status, _) = post_json(
            &app,
            "/v1/cuts",
            serde_json::json!({
                "student_id": 1,
                "from_date": "2024-06-10",
                "to_date": "2024-06-12"
            }),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let covered = MealDay::parse("2024-06-11").unwrap();
        assert_eq!(
            state.exclusions.exclusion_covering(StudentId(1), covered).unwrap(),
            Some(ExclusionKind::PersonalCut)
        );
        let outside = MealDay::parse("2024-06-13").unwrap();
        assert_eq!(
            state.exclusions.exclusion_covering(StudentId(1), outside).unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn cut_for_unknown_student_is_404() {
        let app = staff_app(test_state_with_student());
        let (status, _) = post_json(
            &app,
            "/v1/cuts",
            serde_json::json!({
                "student_id": 99,
                "from_date": "2024-06-10",
                "to_date": "2024-06-12"
            }),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn inverted_cut_range_rejected() {
        let app = staff_app(test_state_with_student());
        let (status, _) = post_json(
            &app,
            "/v1/cuts",
            serde_json::json!({
                "student_id": 1,
                "from_date": "2024-06-12",
                "to_date": "2024-06-10"
            }),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn closure_covers_every_student() {
        let state = test_state_with_student();
        let app = admin_app(state.clone());

        let (status, _) = post_json(
            &app,
            "/v1/closures",
            serde_json::json!({
                "from_date": "2024-03-01",
                "to_date": "2024-03-05",
                "reason": "Holi break"
            }),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let covered = MealDay::parse("2024-03-03").unwrap();
        // Applies to a student with no personal cut at all.
        assert_eq!(
            state.exclusions.exclusion_covering(StudentId(999), covered).unwrap(),
            Some(ExclusionKind::GlobalClosure)
        );
    }

    #[tokio::test]
    async fn staff_cannot_declare_closure() {
        let app = staff_app(test_state_with_student());
        let (status, _) = post_json(
            &app,
            "/v1/closures",
            serde_json::json!({"from_date": "2024-03-01", "to_date": "2024-03-05"}),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn cut_and_closure_writes_are_audited() {
        let state = test_state_with_student();
        let app = admin_app(state.clone());

        post_json(
            &app,
            "/v1/cuts",
            serde_json::json!({
                "student_id": 1,
                "from_date": "2024-06-10",
                "to_date": "2024-06-10"
            }),
        )
        .await;
        post_json(
            &app,
            "/v1/closures",
            serde_json::json!({"from_date": "2024-03-01", "to_date": "2024-03-01"}),
        )
        .await;

        assert_eq!(
            state.audit.entries_by_kind(AuditEventKind::MessCutApplied).len(),
            1
        );
        assert_eq!(
            state.audit.entries_by_kind(AuditEventKind::ClosureDeclared).len(),
            1
        );
    }
}
