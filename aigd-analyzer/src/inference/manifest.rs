//! Label-order manifest stored next to a model artifact
//!
//! `models/images_model.onnx` is described by `models/images_model.labels.json`:
//!
//! ```json
//! { "ai_index": 1, "scalar": "real" }
//! ```
//!
//! Both keys are optional. Without a manifest the per-modality defaults apply:
//! class index 1 is AI-generated, and a single scalar output is the AI
//! probability for text and audio but the *real* probability for images.

use aigd_common::Modality;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::LoadError;

/// What a single-scalar model output measures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalarMeaning {
    /// Probability the input is AI-generated
    Ai,
    /// Probability the input is real / human-made
    Real,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LabelManifest {
    /// Class index carrying the AI-generated score (0 or 1)
    pub ai_index: usize,
    pub scalar: ScalarMeaning,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ManifestFile {
    ai_index: Option<usize>,
    scalar: Option<ScalarMeaning>,
}

impl LabelManifest {
    pub fn defaults_for(modality: Modality) -> Self {
        let scalar = match modality {
            Modality::Text | Modality::Audio => ScalarMeaning::Ai,
            Modality::Image => ScalarMeaning::Real,
        };
        Self { ai_index: 1, scalar }
    }

    /// Index of the human / real class score
    pub fn human_index(&self) -> usize {
        1 - self.ai_index
    }

    /// Sidecar path for an artifact
    pub fn path_for(artifact: &Path) -> PathBuf {
        artifact.with_extension("labels.json")
    }

    /// Load the manifest for `artifact`, falling back to modality defaults when
    /// no sidecar exists.
    pub fn load_for(artifact: &Path, modality: Modality) -> Result<Self, LoadError> {
        let path = Self::path_for(artifact);
        let defaults = Self::defaults_for(modality);
        if !path.exists() {
            return Ok(defaults);
        }

        let manifest_error = |message: String| LoadError::Manifest {
            path: path.clone(),
            message,
        };
        let content = std::fs::read_to_string(&path).map_err(|e| manifest_error(e.to_string()))?;
        let file: ManifestFile =
            serde_json::from_str(&content).map_err(|e| manifest_error(e.to_string()))?;

        let ai_index = file.ai_index.unwrap_or(defaults.ai_index);
        if ai_index > 1 {
            return Err(manifest_error(format!(
                "ai_index must be 0 or 1 for a binary classifier, got {}",
                ai_index
            )));
        }

        let manifest = Self {
            ai_index,
            scalar: file.scalar.unwrap_or(defaults.scalar),
        };
        debug!(path = %path.display(), ?manifest, "Loaded label manifest");
        Ok(manifest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_keep_image_scalar_inverted() {
        assert_eq!(LabelManifest::defaults_for(Modality::Audio).scalar, ScalarMeaning::Ai);
        assert_eq!(LabelManifest::defaults_for(Modality::Image).scalar, ScalarMeaning::Real);
        assert_eq!(LabelManifest::defaults_for(Modality::Text).ai_index, 1);
    }

    #[test]
    fn test_sidecar_path() {
        assert_eq!(
            LabelManifest::path_for(Path::new("models/images_model.onnx")),
            PathBuf::from("models/images_model.labels.json")
        );
    }

    #[test]
    fn test_missing_manifest_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let artifact = dir.path().join("audio.onnx");
        let manifest = LabelManifest::load_for(&artifact, Modality::Audio).unwrap();
        assert_eq!(manifest, LabelManifest::defaults_for(Modality::Audio));
    }

    #[test]
    fn test_partial_manifest_overrides() {
        let dir = TempDir::new().unwrap();
        let artifact = dir.path().join("image.onnx");
        std::fs::write(dir.path().join("image.labels.json"), r#"{"scalar": "ai"}"#).unwrap();

        let manifest = LabelManifest::load_for(&artifact, Modality::Image).unwrap();
        assert_eq!(manifest.ai_index, 1);
        assert_eq!(manifest.scalar, ScalarMeaning::Ai);
    }

    #[test]
    fn test_out_of_range_index_rejected() {
        let dir = TempDir::new().unwrap();
        let artifact = dir.path().join("text.onnx");
        std::fs::write(dir.path().join("text.labels.json"), r#"{"ai_index": 3}"#).unwrap();

        let err = LabelManifest::load_for(&artifact, Modality::Text).unwrap_err();
        assert!(matches!(err, LoadError::Manifest { .. }));
    }

    #[test]
    fn test_malformed_manifest_rejected() {
        let dir = TempDir::new().unwrap();
        let artifact = dir.path().join("text.onnx");
        std::fs::write(dir.path().join("text.labels.json"), "{ai_index").unwrap();

        assert!(LabelManifest::load_for(&artifact, Modality::Text).is_err());
    }
}
