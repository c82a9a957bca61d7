//! Health check endpoint

use aigd_common::Modality;
use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// "ok" when every model is loaded, "degraded" otherwise
    pub status: String,
    /// Module name ("aigd-analyzer")
    pub module: String,
    /// Crate version from Cargo.toml
    pub version: String,
    /// Seconds since service started
    pub uptime_seconds: u64,
    /// Most recent model load failure, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// GET /health
///
/// Reports what is already loaded without triggering a load.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime = Utc::now().signed_duration_since(state.startup_time);
    let uptime_seconds = uptime.num_seconds().max(0) as u64;

    let registry = state.dispatcher.registry();
    let all_loaded = Modality::ALL.iter().all(|&m| registry.is_loaded(m));
    let last_error = Modality::ALL
        .iter()
        .find_map(|&m| registry.last_error(m).map(|e| format!("{}: {}", m, e)));

    Json(HealthResponse {
        status: if all_loaded { "ok" } else { "degraded" }.to_string(),
        module: "aigd-analyzer".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds,
        last_error,
    })
}

/// Build health check routes
pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
