//! # Scan Adjudication
//!
//! The single entry point a scanning front-end calls. Every scan gets a 200
//! with a terminal result in the body — a blocked student is a successful
//! adjudication, not an HTTP error. HTTP errors are reserved for the
//! request itself being unusable (bad meal name, missing auth).
//!
//! ## Endpoints
//!
//! - `POST /v1/scan` — adjudicate a scanned credential.

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use mess_admission::{DeviceInfo, ScanResult, StaffIdentity, StudentSnapshot};
use mess_core::Meal;

use crate::auth::{require_role, CallerIdentity, Role};
use crate::error::AppError;
use crate::state::AppState;

// ── Request / Response types ─────────────────────────────────────────

/// Request body for scan adjudication.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ScanRequest {
    /// The raw scanned token string.
    pub qr_data: String,
    /// The meal being served: BREAKFAST, LUNCH or DINNER (case-insensitive).
    pub meal: String,
    /// Free-form scanning device description.
    #[serde(default)]
    pub device_info: String,
}

/// Response body for scan adjudication.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ScanResponse {
    /// The terminal result.
    #[schema(value_type = String, example = "ALLOWED")]
    pub result: ScanResult,
    /// Staff-facing reason, present on blocked results.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// The resolved student, whenever an identity was established.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Object)]
    pub student_snapshot: Option<StudentSnapshot>,
}

// ── Router ───────────────────────────────────────────────────────────

/// Build the scan router.
pub fn router() -> Router<AppState> {
    Router::new().route("/v1/scan", post(adjudicate_scan))
}

// ── Handlers ─────────────────────────────────────────────────────────

/// POST /v1/scan — adjudicate a scanned credential.
///
/// Requires the `staff` role. The decision is made entirely by the
/// admission pipeline; this handler only translates the HTTP edge.
#[utoipa::path(
    post,
    path = "/v1/scan",
    request_body = ScanRequest,
    responses(
        (status = 200, description = "Terminal adjudication result", body = ScanResponse),
        (status = 422, description = "Unusable request (e.g. unknown meal)", body = crate::error::ErrorBody),
    ),
    tag = "scan"
)]
pub(crate) async fn adjudicate_scan(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Json(body): Json<ScanRequest>,
) -> Result<Json<ScanResponse>, AppError> {
    require_role(&caller, Role::Staff)?;

    let meal: Meal = body
        .meal
        .parse()
        .map_err(|e: mess_core::ValidationError| AppError::Validation(e.to_string()))?;

    if body.qr_data.is_empty() {
        return Err(AppError::Validation("qr_data must not be empty".into()));
    }

    let decision = state.pipeline.adjudicate(
        &body.qr_data,
        meal,
        &DeviceInfo(body.device_info),
        &StaffIdentity {
            label: caller.label.clone(),
        },
    );

    Ok(Json(ScanResponse {
        result: decision.result,
        reason: decision.reason,
        student_snapshot: decision.student,
    }))
}
