//! Request dispatcher
//!
//! Validates an upload, resolves the model, stages the bytes in a scoped temp
//! file and runs the modality pipeline. Synchronous; the HTTP layer calls it
//! from the blocking pool.

use aigd_common::{AnalysisResult, Modality};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::NamedTempFile;
use tracing::{debug, error, info, info_span, warn};
use uuid::Uuid;

use crate::error::{AnalysisError, PipelineError};
use crate::pipeline::{self, FailurePolicy};
use crate::registry::ModelRegistry;

/// An uploaded file as received from the client
#[derive(Debug, Clone)]
pub struct Upload {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl Upload {
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            bytes,
        }
    }

    /// Extension of the client filename, with the leading dot
    ///
    /// Only the extension reaches disk; it is kept as a decoder hint.
    fn suffix(&self) -> String {
        Path::new(&self.filename)
            .extension()
            .and_then(|e| e.to_str())
            .filter(|e| e.chars().all(|c| c.is_ascii_alphanumeric()))
            .map(|e| format!(".{}", e))
            .unwrap_or_default()
    }
}

pub struct Dispatcher {
    registry: Arc<ModelRegistry>,
    upload_dir: PathBuf,
}

impl Dispatcher {
    pub fn new(registry: Arc<ModelRegistry>, upload_dir: impl Into<PathBuf>) -> Self {
        Self {
            registry,
            upload_dir: upload_dir.into(),
        }
    }

    pub fn registry(&self) -> &Arc<ModelRegistry> {
        &self.registry
    }

    /// Analyze one upload
    ///
    /// Validation happens before anything touches disk: file part present,
    /// filename non-empty, modality known, model loaded.
    pub fn analyze(
        &self,
        upload: Option<Upload>,
        modality: Option<&str>,
    ) -> Result<AnalysisResult, AnalysisError> {
        let request_id = Uuid::new_v4();
        let span = info_span!("analyze", %request_id);
        let _guard = span.enter();

        let upload =
            upload.ok_or_else(|| AnalysisError::InvalidInput("No file provided".to_string()))?;
        if upload.filename.is_empty() {
            return Err(AnalysisError::InvalidInput("No file selected".to_string()));
        }

        let raw_modality = modality.unwrap_or_default();
        let modality: Modality = raw_modality
            .parse()
            .map_err(|_| AnalysisError::InvalidModality(raw_modality.to_string()))?;

        let handle = self
            .registry
            .ensure_loaded(modality)
            .map_err(|_| AnalysisError::ModelUnavailable(modality))?;

        info!(
            %modality,
            filename = %upload.filename,
            bytes = upload.bytes.len(),
            "Analyzing upload"
        );

        let staged = self.stage(&upload)?;
        let outcome = pipeline::run(&handle, staged.path());
        discard(staged);

        match outcome {
            Ok(result) => {
                info!(
                    %modality,
                    is_generated = result.is_generated(),
                    confidence = result.confidence(),
                    "Analysis complete"
                );
                Ok(result)
            }
            Err(e) => self.on_failure(modality, &upload.filename, &request_id, e),
        }
    }

    fn stage(&self, upload: &Upload) -> Result<NamedTempFile, AnalysisError> {
        let internal = |e: std::io::Error| {
            error!(error = %e, dir = %self.upload_dir.display(), "Failed to stage upload");
            AnalysisError::Internal(format!("failed to stage upload: {}", e))
        };

        let mut file = tempfile::Builder::new()
            .prefix("upload-")
            .suffix(&upload.suffix())
            .tempfile_in(&self.upload_dir)
            .map_err(internal)?;
        file.write_all(&upload.bytes).map_err(internal)?;
        file.flush().map_err(internal)?;

        debug!(path = %file.path().display(), "Upload staged");
        Ok(file)
    }

    fn on_failure(
        &self,
        modality: Modality,
        filename: &str,
        request_id: &Uuid,
        err: PipelineError,
    ) -> Result<AnalysisResult, AnalysisError> {
        error!(
            %modality,
            filename,
            %request_id,
            error = %err,
            "Pipeline failed"
        );

        match FailurePolicy::for_modality(modality) {
            FailurePolicy::Propagate => Err(AnalysisError::ProcessingFailure {
                modality,
                details: err.to_string(),
            }),
            FailurePolicy::Neutral => {
                warn!(%modality, "Answering with neutral result");
                Ok(AnalysisResult::neutral())
            }
        }
    }
}

fn discard(staged: NamedTempFile) {
    let path = staged.path().to_path_buf();
    if let Err(e) = staged.close() {
        warn!(path = %path.display(), error = %e, "Failed to remove staged upload");
    }
}
