//! Text pipeline

use aigd_common::AnalysisResult;
use std::path::Path;
use tracing::debug;

use super::{from_label, from_scores, prediction_as_label};
use crate::error::PipelineError;
use crate::features::SEQUENCE_LENGTH;
use crate::inference::{Classifier, FeatureTensor, LabelManifest};
use crate::registry::ModelHandle;

/// Extracted text features
#[derive(Debug, Clone, PartialEq)]
pub struct TextFeatures {
    /// Input fed to the model first: token ids when a tokenizer is loaded
    pub primary: FeatureTensor,
    /// Decoded upload, kept for the raw-text fallback
    pub raw: String,
}

impl TextFeatures {
    pub fn is_raw(&self) -> bool {
        matches!(self.primary, FeatureTensor::Text(_))
    }
}

/// Read the upload as UTF-8 (invalid bytes replaced) and vectorize it
pub fn extract(handle: &ModelHandle, path: &Path) -> Result<TextFeatures, PipelineError> {
    let bytes = std::fs::read(path)?;
    let raw = String::from_utf8_lossy(&bytes).into_owned();

    let primary = match handle.tokenizer() {
        Some(tokenizer) => FeatureTensor::Tokens(tokenizer.encode_padded(&raw, SEQUENCE_LENGTH)),
        None => FeatureTensor::Text(raw.clone()),
    };
    debug!(
        chars = raw.chars().count(),
        input = primary.kind_name(),
        "Text features extracted"
    );

    Ok(TextFeatures { primary, raw })
}

fn label_result(
    classifier: &dyn Classifier,
    input: &FeatureTensor,
    labels: &LabelManifest,
) -> Result<AnalysisResult, PipelineError> {
    let prediction = classifier.predict(input)?;
    let label = prediction_as_label(prediction, labels)?;
    Ok(from_label(&label))
}

/// Normalize using the first strategy that succeeds
///
/// 1. class probabilities
/// 2. predicted label on the primary input
/// 3. predicted label on the raw text, when the primary input was tokenized
pub fn normalize(
    handle: &ModelHandle,
    features: &TextFeatures,
) -> Result<AnalysisResult, PipelineError> {
    let classifier = handle.classifier();
    let labels = handle.labels();
    let mut failures = Vec::new();

    if classifier.supports_proba() {
        let attempt = classifier
            .predict_proba(&features.primary)
            .map_err(PipelineError::from)
            .and_then(|scores| from_scores(&scores, labels));
        match attempt {
            Ok(result) => return Ok(result),
            Err(e) => {
                debug!(error = %e, "Probability output unusable, falling back to label");
                failures.push(format!("probabilities: {}", e));
            }
        }
    }

    match label_result(classifier, &features.primary, labels) {
        Ok(result) => return Ok(result),
        Err(e) => {
            debug!(error = %e, "Label prediction failed");
            failures.push(format!("label: {}", e));
        }
    }

    if !features.is_raw() {
        let raw = FeatureTensor::Text(features.raw.clone());
        match label_result(classifier, &raw, labels) {
            Ok(result) => return Ok(result),
            Err(e) => {
                debug!(error = %e, "Raw text prediction failed");
                failures.push(format!("raw text: {}", e));
            }
        }
    }

    Err(PipelineError::Normalize(failures.join("; ")))
}

pub fn analyze(handle: &ModelHandle, path: &Path) -> Result<AnalysisResult, PipelineError> {
    let features = extract(handle, path)?;
    normalize(handle, &features)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::InferenceError;
    use crate::features::SequenceTokenizer;
    use crate::inference::{InputShape, Label, RawPrediction};
    use aigd_common::Modality;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};
    use tempfile::NamedTempFile;

    /// Scripted classifier recording the kind of every input it sees
    struct Scripted {
        shape: InputShape,
        proba: Option<Result<Vec<f32>, String>>,
        on_tokens: Result<RawPrediction, String>,
        on_text: Result<RawPrediction, String>,
        seen: Mutex<Vec<&'static str>>,
    }

    impl Scripted {
        fn new(on_tokens: Result<RawPrediction, String>, on_text: Result<RawPrediction, String>) -> Self {
            Self {
                shape: InputShape::new(vec![None, Some(SEQUENCE_LENGTH)]),
                proba: None,
                on_tokens,
                on_text,
                seen: Mutex::new(Vec::new()),
            }
        }

        fn seen(&self) -> Vec<&'static str> {
            self.seen.lock().unwrap().clone()
        }
    }

    impl Classifier for Scripted {
        fn input_shape(&self) -> &InputShape {
            &self.shape
        }

        fn predict(&self, input: &FeatureTensor) -> Result<RawPrediction, InferenceError> {
            self.seen.lock().unwrap().push(input.kind_name());
            let scripted = match input {
                FeatureTensor::Text(_) => &self.on_text,
                _ => &self.on_tokens,
            };
            scripted.clone().map_err(InferenceError::Backend)
        }

        fn supports_proba(&self) -> bool {
            self.proba.is_some()
        }

        fn predict_proba(&self, _input: &FeatureTensor) -> Result<Vec<f32>, InferenceError> {
            self.proba
                .clone()
                .unwrap_or_else(|| Err("no proba".into()))
                .map_err(InferenceError::Backend)
        }
    }

    fn tokenizer() -> Arc<SequenceTokenizer> {
        let word_index: HashMap<String, i64> =
            [("hello".to_string(), 1), ("world".to_string(), 2)].into();
        Arc::new(SequenceTokenizer::new(word_index))
    }

    fn handle(classifier: Arc<Scripted>, with_tokenizer: bool) -> ModelHandle {
        let handle = ModelHandle::new(Modality::Text, classifier);
        if with_tokenizer {
            handle.with_tokenizer(tokenizer())
        } else {
            handle
        }
    }

    fn upload(bytes: &[u8]) -> NamedTempFile {
        let file = NamedTempFile::new().unwrap();
        std::fs::write(file.path(), bytes).unwrap();
        file
    }

    #[test]
    fn test_extract_tokenizes_and_pads() {
        let classifier = Arc::new(Scripted::new(Err("unused".into()), Err("unused".into())));
        let file = upload(b"Hello world hello");

        let features = extract(&handle(classifier, true), file.path()).unwrap();
        let FeatureTensor::Tokens(tokens) = &features.primary else {
            panic!("expected tokens, got {:?}", features.primary.kind_name());
        };
        assert_eq!(tokens.shape(), &[1, SEQUENCE_LENGTH]);
        assert_eq!(tokens[[0, SEQUENCE_LENGTH - 1]], 1);
        assert_eq!(tokens[[0, SEQUENCE_LENGTH - 2]], 2);
        assert_eq!(tokens[[0, 0]], 0);
        assert_eq!(features.raw, "Hello world hello");
    }

    #[test]
    fn test_extract_lossy_utf8_without_tokenizer() {
        let classifier = Arc::new(Scripted::new(Err("unused".into()), Err("unused".into())));
        let file = upload(b"caf\xff!");

        let features = extract(&handle(classifier, false), file.path()).unwrap();
        assert!(features.is_raw());
        assert_eq!(features.raw, "caf\u{FFFD}!");
    }

    #[test]
    fn test_probabilities_win() {
        let mut scripted = Scripted::new(Err("unused".into()), Err("unused".into()));
        scripted.proba = Some(Ok(vec![0.3, 0.7]));
        let classifier = Arc::new(scripted);
        let file = upload(b"hello");

        let result = analyze(&handle(classifier.clone(), true), file.path()).unwrap();
        assert_eq!(result.ai_confidence(), 70.0);
        assert_eq!(result.human_confidence(), 30.0);
        assert!(result.is_generated());
        assert!(classifier.seen().is_empty());
    }

    #[test]
    fn test_label_fallback_after_proba_failure() {
        let mut scripted = Scripted::new(
            Ok(RawPrediction::Label(Label::Text("generated".into()))),
            Err("unused".into()),
        );
        scripted.proba = Some(Err("broken".into()));
        let classifier = Arc::new(scripted);
        let file = upload(b"hello");

        let result = analyze(&handle(classifier.clone(), true), file.path()).unwrap();
        assert_eq!(result.ai_confidence(), 95.0);
        assert_eq!(classifier.seen(), vec!["token"]);
    }

    #[test]
    fn test_raw_text_fallback() {
        let classifier = Arc::new(Scripted::new(
            Err("wrong input".into()),
            Ok(RawPrediction::Label(Label::Int(0))),
        ));
        let file = upload(b"hello world");

        let result = analyze(&handle(classifier.clone(), true), file.path()).unwrap();
        assert_eq!(result.human_confidence(), 95.0);
        assert!(!result.is_generated());
        assert_eq!(classifier.seen(), vec!["token", "text"]);
    }

    #[test]
    fn test_raw_input_skips_repeat_and_propagates() {
        let classifier = Arc::new(Scripted::new(Err("unused".into()), Err("boom".into())));
        let file = upload(b"hello");

        let err = analyze(&handle(classifier.clone(), false), file.path()).unwrap_err();
        assert!(matches!(err, PipelineError::Normalize(_)));
        assert!(err.to_string().contains("boom"));
        assert_eq!(classifier.seen(), vec!["text"]);
    }
}
