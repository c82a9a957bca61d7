//! Model status and liveness endpoints

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::error::{AnalysisError, ApiResult};
use crate::registry::ModelStatus;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
    pub models: ModelStatus,
}

/// GET /status
///
/// Retries loading any model that is not available yet, so this call may
/// block on artifact loading.
pub async fn get_status(State(state): State<AppState>) -> ApiResult<Json<StatusResponse>> {
    let registry = state.dispatcher.registry().clone();
    let models = tokio::task::spawn_blocking(move || registry.status())
        .await
        .map_err(|e| AnalysisError::Internal(format!("status check failed: {}", e)))?;

    Ok(Json(StatusResponse {
        status: "online",
        models,
    }))
}

#[derive(Debug, Serialize)]
pub struct TestResponse {
    pub status: &'static str,
}

/// GET /test
pub async fn get_test() -> Json<TestResponse> {
    Json(TestResponse {
        status: "API is working!",
    })
}

pub fn status_routes() -> Router<AppState> {
    Router::new()
        .route("/status", get(get_status))
        .route("/test", get(get_test))
}
