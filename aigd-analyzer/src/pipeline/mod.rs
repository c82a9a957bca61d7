//! Per-modality analysis pipelines
//!
//! Each pipeline is three stages: extract features from the uploaded file,
//! run the model, normalize its raw output into an [`AnalysisResult`]. Every
//! stage returns `Result<_, PipelineError>`; what a failure means for the
//! client is decided by the modality's [`FailurePolicy`] in the dispatcher.

pub mod audio;
pub mod image;
pub mod text;

use aigd_common::{AnalysisResult, Modality};
use std::path::Path;

use crate::error::PipelineError;
use crate::inference::{Label, LabelManifest, RawPrediction, ScalarMeaning};
use crate::registry::ModelHandle;

/// Percentages reported when a label-only prediction says AI-generated
pub const LABEL_AI_PERCENT: f64 = 95.0;
/// Percentages reported for the other side of a label-only prediction
pub const LABEL_HUMAN_PERCENT: f64 = 5.0;

/// What the dispatcher does when a pipeline stage fails
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Return the error to the client (500)
    Propagate,
    /// Answer with a 50/50 result
    Neutral,
}

impl FailurePolicy {
    pub fn for_modality(modality: Modality) -> Self {
        match modality {
            Modality::Audio => FailurePolicy::Neutral,
            Modality::Text | Modality::Image => FailurePolicy::Propagate,
        }
    }
}

/// Run the full pipeline for `handle`'s modality on the file at `path`
pub fn run(handle: &ModelHandle, path: &Path) -> Result<AnalysisResult, PipelineError> {
    match handle.modality() {
        Modality::Text => text::analyze(handle, path),
        Modality::Audio => audio::analyze(handle, path),
        Modality::Image => image::analyze(handle, path),
    }
}

fn check_finite(scores: &[f32]) -> Result<(), PipelineError> {
    if scores.iter().all(|s| s.is_finite()) {
        Ok(())
    } else {
        Err(PipelineError::Normalize(format!(
            "model returned non-finite scores {:?}",
            scores
        )))
    }
}

/// Turn a score vector into percentages
///
/// Two or more scores are class probabilities read through the manifest's
/// class indices. A single score is a probability whose meaning (AI or real)
/// comes from the manifest; its complement is the other side.
pub fn from_scores(
    scores: &[f32],
    labels: &LabelManifest,
) -> Result<AnalysisResult, PipelineError> {
    check_finite(scores)?;
    match scores {
        [] => Err(PipelineError::Normalize(
            "model returned no scores".to_string(),
        )),
        [p] => {
            let p = *p as f64;
            let (ai, human) = match labels.scalar {
                ScalarMeaning::Ai => (p, 1.0 - p),
                ScalarMeaning::Real => (1.0 - p, p),
            };
            Ok(AnalysisResult::from_percentages(ai * 100.0, human * 100.0))
        }
        classes => {
            let ai = classes[labels.ai_index] as f64;
            let human = classes[labels.human_index()] as f64;
            Ok(AnalysisResult::from_percentages(ai * 100.0, human * 100.0))
        }
    }
}

/// Whether a predicted class label denotes AI-generated content
pub fn label_is_ai(label: &Label) -> bool {
    match label {
        Label::Bool(b) => *b,
        Label::Int(i) => *i != 0,
        Label::Text(s) => matches!(
            s.trim().to_ascii_lowercase().as_str(),
            "ai" | "generated" | "fake" | "1" | "true"
        ),
    }
}

/// Fixed 95/5 split for models that only emit a label
pub fn from_label(label: &Label) -> AnalysisResult {
    if label_is_ai(label) {
        AnalysisResult::from_percentages(LABEL_AI_PERCENT, LABEL_HUMAN_PERCENT)
    } else {
        AnalysisResult::from_percentages(LABEL_HUMAN_PERCENT, LABEL_AI_PERCENT)
    }
}

/// Read a plain `predict` result as a label
///
/// Float outputs are first reduced to a class: the rounded value of a single
/// score, or whether the arg-max lands on the AI index.
pub fn prediction_as_label(
    prediction: RawPrediction,
    labels: &LabelManifest,
) -> Result<Label, PipelineError> {
    match prediction {
        RawPrediction::Label(label) => Ok(label),
        RawPrediction::Scores(scores) => {
            check_finite(&scores)?;
            match scores.as_slice() {
                [] => Err(PipelineError::Normalize(
                    "model returned no label".to_string(),
                )),
                [p] => Ok(Label::Bool(*p >= 0.5)),
                classes => {
                    let argmax = classes
                        .iter()
                        .enumerate()
                        .fold(0, |best, (i, s)| if *s > classes[best] { i } else { best });
                    Ok(Label::Bool(argmax == labels.ai_index))
                }
            }
        }
    }
}
