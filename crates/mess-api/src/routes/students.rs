//! # Student Registration, Approval, and Credential Issuance
//!
//! The registration intake and the admin review flow, plus the two
//! credential paths: minting a token for the current nonce, and the
//! targeted re-issue that regenerates the nonce (revoking the old token
//! without a global rotation).
//!
//! ## Endpoints
//!
//! - `POST /v1/students` — registration intake (staff).
//! - `GET  /v1/students/:id/snapshot` — staff view of a student today.
//! - `POST /v1/students/:id/approve` — admin approval.
//! - `POST /v1/students/:id/deny` — admin denial.
//! - `POST /v1/students/:id/credential` — mint the current token (admin).
//! - `POST /v1/students/:id/credential/reissue` — regenerate nonce and
//!   mint a fresh token (admin).

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use mess_admission::{
    ActorType, ApprovalStatus, AuditEntry, AuditEventKind, AuditSink, ExclusionKind,
    ExclusionStore, NotificationEvent, PaymentStore, Student, StudentSnapshot,
};
use mess_core::{StudentId, Timestamp};
use mess_credential::mint;

use crate::auth::{require_role, CallerIdentity, Role};
use crate::error::AppError;
use crate::state::AppState;

// ── Request / Response types ─────────────────────────────────────────

/// Request body for registration intake.
#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub name: String,
    pub roll_no: String,
    pub room_no: String,
    pub phone: String,
}

/// Response for a student record.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StudentResponse {
    #[schema(value_type = u64)]
    pub id: StudentId,
    pub name: String,
    pub roll_no: String,
    pub room_no: String,
    #[schema(value_type = String, example = "PENDING")]
    pub approval_status: ApprovalStatus,
}

impl From<&Student> for StudentResponse {
    fn from(student: &Student) -> Self {
        Self {
            id: student.id,
            name: student.name.clone(),
            roll_no: student.roll_no.clone(),
            room_no: student.room_no.clone(),
            approval_status: student.approval_status,
        }
    }
}

/// Response carrying a freshly minted meal token.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CredentialResponse {
    /// The opaque signed token the student's QR code should carry.
    pub token: String,
    /// The rotation epoch the token was minted under.
    pub epoch: u64,
    /// Mint time.
    pub issued_at: String,
}

// ── Router ───────────────────────────────────────────────────────────

/// Build the students router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/students", post(register_student))
        .route("/v1/students/:id/snapshot", get(student_snapshot))
        .route("/v1/students/:id/approve", post(approve_student))
        .route("/v1/students/:id/deny", post(deny_student))
        .route("/v1/students/:id/credential", post(issue_credential))
        .route(
            "/v1/students/:id/credential/reissue",
            post(reissue_credential),
        )
}

fn find_student(state: &AppState, id: u64) -> Result<Student, AppError> {
    state
        .students
        .get(StudentId(id))
        .ok_or_else(|| AppError::NotFound(format!("student {id} not found")))
}

// ── Handlers ─────────────────────────────────────────────────────────

/// POST /v1/students — registration intake.
///
/// Creates a `PENDING` student with a fresh credential nonce. The student
/// cannot be admitted (and gets no token) until an admin approves.
#[utoipa::path(
    post,
    path = "/v1/students",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Student registered", body = StudentResponse),
        (status = 409, description = "Roll number already registered", body = crate::error::ErrorBody),
    ),
    tag = "students"
)]
pub(crate) async fn register_student(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Json(body): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<StudentResponse>), AppError> {
    require_role(&caller, Role::Staff)?;

    for (field, value) in [
        ("name", &body.name),
        ("roll_no", &body.roll_no),
        ("room_no", &body.room_no),
        ("phone", &body.phone),
    ] {
        if value.trim().is_empty() {
            return Err(AppError::Validation(format!("{field} must not be empty")));
        }
    }
    if state.students.roll_no_taken(&body.roll_no) {
        return Err(AppError::Conflict(format!(
            "roll number {} already registered",
            body.roll_no
        )));
    }

    let id = state.students.allocate_id();
    let student = Student::register(
        id,
        body.name.trim().to_string(),
        body.roll_no.trim().to_string(),
        body.room_no.trim().to_string(),
        body.phone.trim().to_string(),
        state.registry.current_epoch(),
        Timestamp::now(),
    );
    let response = StudentResponse::from(&student);
    state.students.upsert(student);
    tracing::info!(student = %id, "student registered");

    Ok((StatusCode::CREATED, Json(response)))
}

/// GET /v1/students/:id/snapshot — staff view of a student today.
///
/// The same snapshot the scan endpoint attaches: identity plus today's
/// payment and exclusion facts, so staff can see why a student is blocked.
#[utoipa::path(
    get,
    path = "/v1/students/{id}/snapshot",
    params(("id" = u64, Path, description = "Student ID")),
    responses(
        (status = 200, description = "Student snapshot with today's payment and exclusion facts"),
        (status = 404, description = "Student not found", body = crate::error::ErrorBody),
    ),
    tag = "students"
)]
pub(crate) async fn student_snapshot(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<u64>,
) -> Result<Json<StudentSnapshot>, AppError> {
    require_role(&caller, Role::Staff)?;
    let student = find_student(&state, id)?;

    let today = state.today();
    let payment_ok = state
        .payments
        .has_verified_payment_covering(student.id, today)
        .map_err(|e| AppError::Internal(e.to_string()))?;
    let exclusion = state
        .exclusions
        .exclusion_covering(student.id, today)
        .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(Json(StudentSnapshot {
        id: student.id,
        name: student.name,
        roll_no: student.roll_no,
        room_no: student.room_no,
        approval_status: student.approval_status,
        payment_ok,
        cut_today: exclusion == Some(ExclusionKind::PersonalCut),
        closure_today: exclusion == Some(ExclusionKind::GlobalClosure),
    }))
}

/// POST /v1/students/:id/approve — approve a registration.
#[utoipa::path(
    post,
    path = "/v1/students/{id}/approve",
    params(("id" = u64, Path, description = "Student ID")),
    responses(
        (status = 200, description = "Student approved", body = StudentResponse),
        (status = 404, description = "Student not found", body = crate::error::ErrorBody),
    ),
    tag = "students"
)]
pub(crate) async fn approve_student(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<u64>,
) -> Result<Json<StudentResponse>, AppError> {
    require_role(&caller, Role::Admin)?;
    let student = state
        .students
        .update(StudentId(id), |s| s.approval_status = ApprovalStatus::Approved)
        .ok_or_else(|| AppError::NotFound(format!("student {id} not found")))?;

    state
        .notifier
        .notify(student.id, NotificationEvent::RegistrationApproved);
    state.audit.record(AuditEntry::new(
        ActorType::Admin,
        Some(caller.label.clone()),
        AuditEventKind::RegistrationApproved,
        serde_json::json!({"student_id": id}),
    ));

    Ok(Json(StudentResponse::from(&student)))
}

/// POST /v1/students/:id/deny — deny a registration.
#[utoipa::path(
    post,
    path = "/v1/students/{id}/deny",
    params(("id" = u64, Path, description = "Student ID")),
    responses(
        (status = 200, description = "Student denied", body = StudentResponse),
        (status = 404, description = "Student not found", body = crate::error::ErrorBody),
    ),
    tag = "students"
)]
pub(crate) async fn deny_student(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<u64>,
) -> Result<Json<StudentResponse>, AppError> {
    require_role(&caller, Role::Admin)?;
    let student = state
        .students
        .update(StudentId(id), |s| s.approval_status = ApprovalStatus::Denied)
        .ok_or_else(|| AppError::NotFound(format!("student {id} not found")))?;

    state
        .notifier
        .notify(student.id, NotificationEvent::RegistrationDenied);
    state.audit.record(AuditEntry::new(
        ActorType::Admin,
        Some(caller.label.clone()),
        AuditEventKind::RegistrationDenied,
        serde_json::json!({"student_id": id}),
    ));

    Ok(Json(StudentResponse::from(&student)))
}

/// POST /v1/students/:id/credential — mint a token for the current nonce.
///
/// Only approved students get tokens.
#[utoipa::path(
    post,
    path = "/v1/students/{id}/credential",
    params(("id" = u64, Path, description = "Student ID")),
    responses(
        (status = 200, description = "Token minted", body = CredentialResponse),
        (status = 404, description = "Student not found", body = crate::error::ErrorBody),
        (status = 409, description = "Student not approved", body = crate::error::ErrorBody),
    ),
    tag = "students"
)]
pub(crate) async fn issue_credential(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<u64>,
) -> Result<Json<CredentialResponse>, AppError> {
    require_role(&caller, Role::Admin)?;
    let student = find_student(&state, id)?;
    mint_for(&state, &caller, &student, AuditEventKind::CredentialIssued)
}

/// POST /v1/students/:id/credential/reissue — regenerate the nonce and mint.
///
/// The targeted invalidation path: the student's outstanding token stops
/// verifying against the new live nonce, without a global rotation.
#[utoipa::path(
    post,
    path = "/v1/students/{id}/credential/reissue",
    params(("id" = u64, Path, description = "Student ID")),
    responses(
        (status = 200, description = "Nonce regenerated, fresh token minted", body = CredentialResponse),
        (status = 404, description = "Student not found", body = crate::error::ErrorBody),
        (status = 409, description = "Student not approved", body = crate::error::ErrorBody),
    ),
    tag = "students"
)]
pub(crate) async fn reissue_credential(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<u64>,
) -> Result<Json<CredentialResponse>, AppError> {
    require_role(&caller, Role::Admin)?;
    // Verify existence and status before touching the nonce.
    let current = find_student(&state, id)?;
    if current.approval_status != ApprovalStatus::Approved {
        return Err(AppError::Conflict(format!(
            "student {id} is {} — only approved students hold credentials",
            current.approval_status
        )));
    }

    let epoch = state.registry.current_epoch();
    let student = state
        .students
        .update(StudentId(id), |s| {
            s.reissue_credential(epoch);
        })
        .ok_or_else(|| AppError::NotFound(format!("student {id} not found")))?;

    mint_for(&state, &caller, &student, AuditEventKind::CredentialReissued)
}

/// Mint a token against the student's live nonce and the current epoch.
fn mint_for(
    state: &AppState,
    caller: &CallerIdentity,
    student: &Student,
    event: AuditEventKind,
) -> Result<Json<CredentialResponse>, AppError> {
    if student.approval_status != ApprovalStatus::Approved {
        return Err(AppError::Conflict(format!(
            "student {} is {} — only approved students hold credentials",
            student.id.value(),
            student.approval_status
        )));
    }

    let snapshot = state.registry.snapshot();
    let now = Timestamp::now();
    let token = mint(
        student.id,
        &student.credential_nonce,
        snapshot.epoch,
        &snapshot.key,
        now,
    );

    state.audit.record(AuditEntry::new(
        ActorType::Admin,
        Some(caller.label.clone()),
        event,
        serde_json::json!({
            "student_id": student.id.value(),
            "epoch": snapshot.epoch.value(),
        }),
    ));

    Ok(Json(CredentialResponse {
        token: token.into_string(),
        epoch: snapshot.epoch.value(),
        issued_at: now.to_iso8601(),
    }))
}
