//! aigd-analyzer library interface
//!
//! Exposes the router, dispatcher and model registry for the binary and for
//! integration tests.

pub mod api;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod features;
pub mod inference;
pub mod pipeline;
pub mod registry;
pub mod utils;

pub use crate::error::{AnalysisError, ApiResult};

use axum::extract::DefaultBodyLimit;
use axum::Router;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::dispatcher::Dispatcher;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            dispatcher: Arc::new(dispatcher),
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .merge(api::analyze_routes())
        .merge(api::status_routes())
        .merge(api::health_routes())
        .with_state(state)
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        // Browser frontends call the API cross-origin
        .layer(CorsLayer::permissive())
}
