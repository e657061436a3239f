//! # Administrative Operations
//!
//! The blunt instruments: global epoch rotation (invalidates every
//! outstanding credential at once) and the audit trail view.
//!
//! ## Endpoints
//!
//! - `POST /v1/admin/rotate` — bump the rotation epoch (admin).
//! - `GET  /v1/audit` — recent audit entries (admin).

use axum::extract::{Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use mess_admission::{ActorType, AuditEntry, AuditEventKind, AuditSink};

use crate::auth::{require_role, CallerIdentity, Role};
use crate::error::AppError;
use crate::state::AppState;

// ── Request / Response types ─────────────────────────────────────────

/// Response after an epoch rotation.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RotateResponse {
    /// The new current epoch. Every credential minted under an earlier
    /// epoch is now invalid.
    pub epoch: u64,
}

/// Query parameters for the audit view.
#[derive(Debug, Deserialize, ToSchema)]
pub struct AuditQuery {
    /// Maximum number of entries to return, newest last. Defaults to 50,
    /// capped at 500.
    #[serde(default)]
    pub limit: Option<usize>,
}

/// Response for the audit view.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AuditResponse {
    /// Matching entries, oldest first.
    #[schema(value_type = Vec<Object>)]
    pub entries: Vec<AuditEntry>,
}

// ── Router ───────────────────────────────────────────────────────────

/// Build the admin router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/admin/rotate", post(rotate_epoch))
        .route("/v1/audit", get(audit_trail))
}

// ── Handlers ─────────────────────────────────────────────────────────

/// POST /v1/admin/rotate — bump the global rotation epoch.
///
/// The expensive, system-wide invalidation path for a suspected key leak.
/// For revoking a single student's token, use the credential reissue
/// endpoint instead.
#[utoipa::path(
    post,
    path = "/v1/admin/rotate",
    responses(
        (status = 200, description = "Epoch rotated", body = RotateResponse),
        (status = 403, description = "Admin role required", body = crate::error::ErrorBody),
    ),
    tag = "admin"
)]
pub(crate) async fn rotate_epoch(
    State(state): State<AppState>,
    caller: CallerIdentity,
) -> Result<Json<RotateResponse>, AppError> {
    require_role(&caller, Role::Admin)?;

    let epoch = state.registry.rotate();
    state.audit.record(AuditEntry::new(
        ActorType::Admin,
        Some(caller.label.clone()),
        AuditEventKind::EpochRotated,
        serde_json::json!({"epoch": epoch.value()}),
    ));

    Ok(Json(RotateResponse {
        epoch: epoch.value(),
    }))
}

/// GET /v1/audit — recent audit entries.
#[utoipa::path(
    get,
    path = "/v1/audit",
    params(("limit" = Option<usize>, Query, description = "Max entries (default 50, cap 500)")),
    responses(
        (status = 200, description = "Recent audit entries", body = AuditResponse),
        (status = 403, description = "Admin role required", body = crate::error::ErrorBody),
    ),
    tag = "admin"
)]
pub(crate) async fn audit_trail(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Query(query): Query<AuditQuery>,
) -> Result<Json<AuditResponse>, AppError> {
    require_role(&caller, Role::Admin)?;

    let limit = query.limit.unwrap_or(50).min(500);
    Ok(Json(AuditResponse {
        entries: state.audit.last_n(limit),
    }))
}
