//! # OpenAPI Specification Assembly
//!
//! Assembles all utoipa-documented routes into a single OpenAPI spec,
//! served at `/openapi.json`.

use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::state::AppState;

/// Assembled OpenAPI spec for the entire API surface.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Mess Stack API",
        version = "0.1.0",
        description = "Meal-access admission for a hostel mess: scan adjudication, registration and approval, payment review, cuts and closures, credential issuance, and epoch rotation.",
        license(name = "AGPL-3.0-or-later")
    ),
    paths(
        // Scan
        crate::routes::scan::adjudicate_scan,
        // Students
        crate::routes::students::register_student,
        crate::routes::students::student_snapshot,
        crate::routes::students::approve_student,
        crate::routes::students::deny_student,
        crate::routes::students::issue_credential,
        crate::routes::students::reissue_credential,
        // Payments
        crate::routes::payments::upload_payment,
        crate::routes::payments::verify_payment,
        crate::routes::payments::deny_payment,
        // Exclusions
        crate::routes::exclusions::apply_cut,
        crate::routes::exclusions::declare_closure,
        // Admin
        crate::routes::admin::rotate_epoch,
        crate::routes::admin::audit_trail,
    ),
    components(schemas(
        // Error types
        crate::error::ErrorBody,
        crate::error::ErrorDetail,
        // Scan DTOs
        crate::routes::scan::ScanRequest,
        crate::routes::scan::ScanResponse,
        // Student DTOs
        crate::routes::students::RegisterRequest,
        crate::routes::students::StudentResponse,
        crate::routes::students::CredentialResponse,
        // Payment DTOs
        crate::routes::payments::PaymentUploadRequest,
        crate::routes::payments::PaymentDenyRequest,
        crate::routes::payments::PaymentResponse,
        // Exclusion DTOs
        crate::routes::exclusions::CutRequest,
        crate::routes::exclusions::ClosureRequest,
        crate::routes::exclusions::ExclusionResponse,
        // Admin DTOs
        crate::routes::admin::RotateResponse,
        crate::routes::admin::AuditResponse,
    )),
    tags(
        (name = "scan", description = "Scan adjudication — the admission decision"),
        (name = "students", description = "Registration, approval, credentials"),
        (name = "payments", description = "Payment window lifecycle"),
        (name = "exclusions", description = "Mess cuts and closures"),
        (name = "admin", description = "Rotation and audit"),
    )
)]
pub struct ApiDoc;

/// Build the OpenAPI router.
///
/// Serves the OpenAPI JSON spec at `/openapi.json`.
pub fn router() -> Router<AppState> {
    Router::new().route("/openapi.json", get(openapi_json))
}

/// GET /openapi.json — return the generated OpenAPI specification.
async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
