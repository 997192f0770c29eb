//! Health check endpoint

use axum::{extract::State, routing::get, Json, Router};
use gmaking_common::time::seconds_since;
use serde::Serialize;

use crate::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// "ok", "degraded" (database unreachable) or "shutting_down"
    pub status: String,
    /// Module name ("gmaking-growth")
    pub module: String,
    /// Crate version from Cargo.toml
    pub version: String,
    /// Seconds since service started
    pub uptime_seconds: u64,
    /// Reason of the most recent failed growth request
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let last_error = state.last_error.read().await.clone();

    let status = if state.shutdown.is_cancelled() {
        "shutting_down"
    } else {
        match sqlx::query("SELECT 1").execute(&state.db).await {
            Ok(_) => "ok",
            Err(e) => {
                tracing::warn!(error = %e, "Health check database probe failed");
                "degraded"
            }
        }
    };

    Json(HealthResponse {
        status: status.to_string(),
        module: "gmaking-growth".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: seconds_since(state.startup_time),
        last_error,
    })
}

/// Build health check routes
pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
