//! # Payment Window Lifecycle
//!
//! Upload and review of payment windows. Only an admin-verified window
//! grants meal access, and only for the days its cycle covers.
//!
//! ## Endpoints
//!
//! - `POST /v1/payments` — record an uploaded payment (staff).
//! - `POST /v1/payments/:id/verify` — verify (admin).
//! - `POST /v1/payments/:id/deny` — deny (admin).

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use mess_admission::{
    ActorType, AuditEntry, AuditEventKind, AuditSink, NotificationEvent, PaymentSource,
    PaymentStatus, PaymentWindow,
};
use mess_core::{MealDay, PaymentId, StudentId, Timestamp};

use crate::auth::{require_role, CallerIdentity, Role};
use crate::error::AppError;
use crate::state::AppState;

// ── Request / Response types ─────────────────────────────────────────

/// Request body for payment upload.
#[derive(Debug, Deserialize, ToSchema)]
pub struct PaymentUploadRequest {
    pub student_id: u64,
    /// Cycle start, `YYYY-MM-DD`.
    pub cycle_start: String,
    /// Cycle end (inclusive), `YYYY-MM-DD`.
    pub cycle_end: String,
    /// Amount as a decimal string.
    pub amount: String,
    /// Proof channel; defaults to an online screenshot.
    #[serde(default)]
    pub offline: bool,
}

/// Request body for payment denial.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct PaymentDenyRequest {
    /// Reason shown to the student, if any.
    #[serde(default)]
    pub reason: Option<String>,
}

/// Response for a payment window.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PaymentResponse {
    #[schema(value_type = String)]
    pub id: Uuid,
    pub student_id: u64,
    pub cycle_start: String,
    pub cycle_end: String,
    pub amount: String,
    #[schema(value_type = String, example = "UPLOADED")]
    pub status: PaymentStatus,
}

impl From<&PaymentWindow> for PaymentResponse {
    fn from(window: &PaymentWindow) -> Self {
        Self {
            id: *window.id.as_uuid(),
            student_id: window.student_id.value(),
            cycle_start: window.cycle_start.to_string(),
            cycle_end: window.cycle_end.to_string(),
            amount: window.amount.clone(),
            status: window.status,
        }
    }
}

// ── Router ───────────────────────────────────────────────────────────

/// Build the payments router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/payments", post(upload_payment))
        .route("/v1/payments/:id/verify", post(verify_payment))
        .route("/v1/payments/:id/deny", post(deny_payment))
}

fn parse_day(field: &str, value: &str) -> Result<MealDay, AppError> {
    MealDay::parse(value).map_err(|_| {
        AppError::Validation(format!("{field} must be a YYYY-MM-DD date, got {value:?}"))
    })
}

// ── Handlers ─────────────────────────────────────────────────────────

/// POST /v1/payments — record an uploaded payment.
///
/// The window starts `UPLOADED`; only admin verification makes it grant
/// access. At most one window may exist per (student, cycle start).
#[utoipa::path(
    post,
    path = "/v1/payments",
    request_body = PaymentUploadRequest,
    responses(
        (status = 201, description = "Payment recorded", body = PaymentResponse),
        (status = 404, description = "Student not found", body = crate::error::ErrorBody),
        (status = 409, description = "Window already exists for this cycle", body = crate::error::ErrorBody),
    ),
    tag = "payments"
)]
pub(crate) async fn upload_payment(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Json(body): Json<PaymentUploadRequest>,
) -> Result<(StatusCode, Json<PaymentResponse>), AppError> {
    require_role(&caller, Role::Staff)?;

    let student_id = StudentId(body.student_id);
    if state.students.get(student_id).is_none() {
        return Err(AppError::NotFound(format!(
            "student {} not found",
            body.student_id
        )));
    }

    let cycle_start = parse_day("cycle_start", &body.cycle_start)?;
    let cycle_end = parse_day("cycle_end", &body.cycle_end)?;
    if body.amount.trim().is_empty() || body.amount.parse::<f64>().is_err() {
        return Err(AppError::Validation(format!(
            "amount must be a decimal string, got {:?}",
            body.amount
        )));
    }

    let source = if body.offline {
        PaymentSource::OfflineManual
    } else {
        PaymentSource::OnlineScreenshot
    };
    let window = PaymentWindow::upload(
        student_id,
        cycle_start,
        cycle_end,
        body.amount.trim().to_string(),
        source,
        Timestamp::now(),
    )?;

    let response = PaymentResponse::from(&window);
    if !state.payments.try_insert(window) {
        return Err(AppError::Conflict(format!(
            "a payment window for student {} starting {} already exists",
            body.student_id, cycle_start
        )));
    }
    tracing::info!(student = body.student_id, cycle = %cycle_start, "payment uploaded");

    Ok((StatusCode::CREATED, Json(response)))
}

/// POST /v1/payments/:id/verify — verify a payment window.
#[utoipa::path(
    post,
    path = "/v1/payments/{id}/verify",
    params(("id" = Uuid, Path, description = "Payment window ID")),
    responses(
        (status = 200, description = "Payment verified", body = PaymentResponse),
        (status = 404, description = "Payment not found", body = crate::error::ErrorBody),
    ),
    tag = "payments"
)]
pub(crate) async fn verify_payment(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
) -> Result<Json<PaymentResponse>, AppError> {
    require_role(&caller, Role::Admin)?;

    let window = state
        .payments
        .update(PaymentId(id), |w| {
            w.status = PaymentStatus::Verified;
            w.reviewed_at = Some(Timestamp::now());
        })
        .ok_or_else(|| AppError::NotFound(format!("payment {id} not found")))?;

    state.notifier.notify(
        window.student_id,
        NotificationEvent::PaymentVerified {
            cycle_start: window.cycle_start,
            cycle_end: window.cycle_end,
        },
    );
    state.audit.record(AuditEntry::new(
        ActorType::Admin,
        Some(caller.label.clone()),
        AuditEventKind::PaymentVerified,
        serde_json::json!({
            "payment_id": id.to_string(),
            "student_id": window.student_id.value(),
            "cycle_start": window.cycle_start.to_string(),
        }),
    ));

    Ok(Json(PaymentResponse::from(&window)))
}

/// POST /v1/payments/:id/deny — deny a payment window.
#[utoipa::path(
    post,
    path = "/v1/payments/{id}/deny",
    params(("id" = Uuid, Path, description = "Payment window ID")),
    request_body = PaymentDenyRequest,
    responses(
        (status = 200, description = "Payment denied", body = PaymentResponse),
        (status = 404, description = "Payment not found", body = crate::error::ErrorBody),
    ),
    tag = "payments"
)]
pub(crate) async fn deny_payment(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
    body: Option<Json<PaymentDenyRequest>>,
) -> Result<Json<PaymentResponse>, AppError> {
    require_role(&caller, Role::Admin)?;
    let reason = body.and_then(|b| b.0.reason);

    let window = state
        .payments
        .update(PaymentId(id), |w| {
            w.status = PaymentStatus::Denied;
            w.reviewed_at = Some(Timestamp::now());
        })
        .ok_or_else(|| AppError::NotFound(format!("payment {id} not found")))?;

    state.notifier.notify(
        window.student_id,
        NotificationEvent::PaymentDenied {
            reason: reason.clone(),
        },
    );
    state.audit.record(AuditEntry::new(
        ActorType::Admin,
        Some(caller.label.clone()),
        AuditEventKind::PaymentDenied,
        serde_json::json!({
            "payment_id": id.to_string(),
            "student_id": window.student_id.value(),
            "reason": reason,
        }),
    ));

    Ok(Json(PaymentResponse::from(&window)))
}
