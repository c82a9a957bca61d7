//! Error types for aigd-analyzer
//!
//! Layered the same way a request flows: model loading (`LoadError`),
//! inference backend calls (`InferenceError`), per-modality pipeline stages
//! (`PipelineError`), and the request-level `AnalysisError` that maps onto an
//! HTTP status.

use aigd_common::Modality;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::path::PathBuf;
use thiserror::Error;

/// Failure to bring a model artifact into memory
#[derive(Debug, Error)]
pub enum LoadError {
    /// Artifact file does not exist
    #[error("model artifact not found: {}", path.display())]
    Missing { path: PathBuf },

    /// Artifact exists but could not be parsed by the inference backend
    #[error("failed to deserialize {}: {message}", path.display())]
    Deserialize { path: PathBuf, message: String },

    /// Artifact parsed but its inputs/outputs are unusable for this modality
    #[error("incompatible model {}: {message}", path.display())]
    Incompatible { path: PathBuf, message: String },

    /// Label manifest next to the artifact is malformed
    #[error("invalid label manifest {}: {message}", path.display())]
    Manifest { path: PathBuf, message: String },

    /// Tokenizer artifact is present but malformed
    #[error("invalid tokenizer {}: {message}", path.display())]
    Tokenizer { path: PathBuf, message: String },
}

/// Failure inside a model `predict` call
#[derive(Debug, Error)]
pub enum InferenceError {
    /// The runtime rejected the call
    #[error("inference backend error: {0}")]
    Backend(String),

    /// The feature tensor kind cannot be fed to this model
    #[error("unsupported model input: {0}")]
    UnsupportedInput(String),

    /// The model produced something no normalizer understands
    #[error("unexpected model output: {0}")]
    UnexpectedOutput(String),
}

/// Failure in one stage of a modality pipeline
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("failed to read upload: {0}")]
    Read(#[from] std::io::Error),

    #[error("feature extraction failed: {0}")]
    Extract(String),

    #[error(transparent)]
    Inference(#[from] InferenceError),

    #[error("output normalization failed: {0}")]
    Normalize(String),
}

/// Request-level error returned by the dispatcher
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// Missing upload or empty filename (400)
    #[error("{0}")]
    InvalidInput(String),

    /// `type` field missing or not a known modality (400)
    #[error("Invalid file type '{0}'. Expected one of: text, audio, image")]
    InvalidModality(String),

    /// Model artifact for the modality failed to load (503)
    #[error("{} model not available", .0.title())]
    ModelUnavailable(Modality),

    /// Extraction, inference or normalization failed (500)
    #[error("Error analyzing {modality}: {details}")]
    ProcessingFailure { modality: Modality, details: String },

    /// Work could not be completed for reasons outside a modality pipeline (500)
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AnalysisError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AnalysisError::InvalidInput(_) | AnalysisError::InvalidModality(_) => {
                StatusCode::BAD_REQUEST
            }
            AnalysisError::ModelUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AnalysisError::ProcessingFailure { .. } | AnalysisError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AnalysisError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match self {
            AnalysisError::ProcessingFailure { modality, details } => json!({
                "error": format!("Error analyzing {}", modality),
                "details": details,
            }),
            AnalysisError::Internal(details) => json!({
                "error": "Internal server error",
                "details": details,
            }),
            other => json!({ "error": other.to_string() }),
        };

        (status, Json(body)).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, AnalysisError>;
