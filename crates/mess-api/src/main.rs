//! # mess-api — Binary Entry Point
//!
//! Starts the Axum HTTP server for the mess stack API.
//! Binds to a configurable port (default 8080).

use mess_api::state::{AppConfig, AppState};
use mess_core::ZoneOffset;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured tracing.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // Build configuration from environment.
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080);

    let auth_token = std::env::var("AUTH_TOKEN").ok();
    if auth_token.is_none() {
        tracing::warn!("AUTH_TOKEN not set — authentication disabled (development mode)");
    }

    let zone_offset = match std::env::var("MESS_UTC_OFFSET_MINUTES") {
        Ok(raw) => {
            let minutes: i32 = raw
                .parse()
                .map_err(|e| anyhow::anyhow!("MESS_UTC_OFFSET_MINUTES not an integer: {e}"))?;
            ZoneOffset::from_minutes(minutes)
                .map_err(|e| anyhow::anyhow!("MESS_UTC_OFFSET_MINUTES invalid: {e}"))?
        }
        Err(_) => ZoneOffset::default(),
    };

    let config = AppConfig {
        port,
        auth_token,
        zone_offset,
    };

    let state = AppState::try_with_config(config).map_err(|e| {
        tracing::error!("startup failed: {e}");
        anyhow::anyhow!(e)
    })?;

    let app = mess_api::app(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("mess API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
