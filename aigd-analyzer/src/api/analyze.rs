//! Upload analysis endpoint
//!
//! `POST /analyze` with multipart fields `file` and `type`.

use aigd_common::{AnalysisResult, Modality};
use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    routing::post,
    Json, Router,
};
use tracing::{debug, error, warn};

use crate::dispatcher::Upload;
use crate::error::{AnalysisError, ApiResult};
use crate::pipeline::FailurePolicy;
use crate::AppState;

/// Fields of the analysis form
#[derive(Debug, Default)]
struct AnalyzeForm {
    upload: Option<Upload>,
    modality: Option<String>,
}

async fn read_form(mut multipart: Multipart) -> ApiResult<AnalyzeForm> {
    let malformed =
        |e: axum::extract::multipart::MultipartError| AnalysisError::InvalidInput(format!(
            "Malformed multipart body: {}",
            e.body_text()
        ));

    let mut form = AnalyzeForm::default();
    while let Some(field) = multipart.next_field().await.map_err(malformed)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            // Parts without a filename are plain form values, not uploads
            "file" if form.upload.is_none() => {
                let Some(filename) = field.file_name().map(str::to_string) else {
                    continue;
                };
                let bytes = field.bytes().await.map_err(malformed)?;
                form.upload = Some(Upload::new(filename, bytes.to_vec()));
            }
            "type" if form.modality.is_none() => {
                form.modality = Some(field.text().await.map_err(malformed)?);
            }
            _ => debug!(field = %name, "Ignoring multipart field"),
        }
    }
    Ok(form)
}

/// POST /analyze
pub async fn analyze(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Json<AnalysisResult>> {
    let form = match multipart {
        Ok(multipart) => read_form(multipart).await?,
        Err(rejection) => {
            debug!(reason = %rejection.body_text(), "Request is not multipart");
            AnalyzeForm::default()
        }
    };

    let requested: Option<Modality> = form.modality.as_deref().and_then(|m| m.parse().ok());
    let dispatcher = state.dispatcher.clone();
    let outcome = tokio::task::spawn_blocking(move || {
        dispatcher.analyze(form.upload, form.modality.as_deref())
    })
    .await;

    match outcome {
        Ok(result) => result.map(Json),
        Err(join_error) => {
            error!(error = %join_error, "Analysis task did not complete");
            let details = format!("analysis task failed: {}", join_error);
            match requested {
                Some(modality) => match FailurePolicy::for_modality(modality) {
                    FailurePolicy::Neutral => {
                        warn!(%modality, "Returning neutral result after task failure");
                        Ok(Json(AnalysisResult::neutral()))
                    }
                    FailurePolicy::Propagate => {
                        Err(AnalysisError::ProcessingFailure { modality, details })
                    }
                },
                None => Err(AnalysisError::Internal(details)),
            }
        }
    }
}

pub fn analyze_routes() -> Router<AppState> {
    Router::new().route("/analyze", post(analyze))
}
