//! # mess-api — Axum HTTP Surface for the Mess Stack
//!
//! The thin I/O edge over the admission engine. The engine decides; this
//! crate authenticates callers, translates JSON, and wires the in-memory
//! collaborator stores.
//!
//! ## API Surface
//!
//! | Prefix                | Module                   | Role   |
//! |-----------------------|--------------------------|--------|
//! | `/v1/scan`            | [`routes::scan`]         | staff  |
//! | `/v1/students/*`      | [`routes::students`]     | staff / admin |
//! | `/v1/payments/*`      | [`routes::payments`]     | staff / admin |
//! | `/v1/cuts`, `/v1/closures` | [`routes::exclusions`] | staff / admin |
//! | `/v1/admin/*`, `/v1/audit` | [`routes::admin`]   | admin  |
//!
//! ## Middleware Stack (execution order)
//!
//! ```text
//! TraceLayer → AuthMiddleware → Handler
//! ```
//!
//! Health probes (`/health/*`) are mounted outside the auth middleware so
//! they remain accessible without credentials; `/openapi.json` is inside it.

pub mod auth;
pub mod error;
pub mod notify;
pub mod openapi;
pub mod routes;
pub mod state;

use axum::middleware::from_fn;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::auth::AuthConfig;
use crate::state::AppState;

/// Assemble the full application router with all routes and middleware.
pub fn app(state: AppState) -> Router {
    let auth_config = AuthConfig {
        token: state.config.auth_token.clone(),
    };

    // Authenticated API routes.
    let api = Router::new()
        .merge(routes::scan::router())
        .merge(routes::students::router())
        .merge(routes::payments::router())
        .merge(routes::exclusions::router())
        .merge(routes::admin::router())
        .merge(openapi::router())
        .layer(from_fn(auth::auth_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(axum::Extension(auth_config))
        .with_state(state);

    // Unauthenticated health probes.
    let health = Router::new()
        .route("/health/liveness", axum::routing::get(liveness))
        .route("/health/readiness", axum::routing::get(readiness));

    Router::new().merge(health).merge(api)
}

/// Liveness probe — always returns 200 if the process is running.
async fn liveness() -> &'static str {
    "ok"
}

/// Readiness probe — returns 200 when the application is ready to serve.
async fn readiness() -> &'static str {
    "ready"
}
