//! ONNX artifact loader

use aigd_common::Modality;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use super::{ModelHandle, ModelLoader};
use crate::error::LoadError;
use crate::features::SequenceTokenizer;
use crate::inference::{LabelManifest, OnnxClassifier};

/// Artifact locations for every modality
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelPaths {
    pub text: PathBuf,
    /// Optional: without it the text model receives raw strings
    pub tokenizer: PathBuf,
    pub audio: PathBuf,
    pub image: PathBuf,
}

impl ModelPaths {
    pub fn artifact(&self, modality: Modality) -> &Path {
        match modality {
            Modality::Text => &self.text,
            Modality::Audio => &self.audio,
            Modality::Image => &self.image,
        }
    }
}

/// Loads `.onnx` artifacts with their label manifests (and the tokenizer for text)
#[derive(Debug, Clone)]
pub struct OnnxModelLoader {
    paths: ModelPaths,
}

impl OnnxModelLoader {
    pub fn new(paths: ModelPaths) -> Self {
        Self { paths }
    }

    fn load_tokenizer(&self) -> Result<Option<SequenceTokenizer>, LoadError> {
        let path = &self.paths.tokenizer;
        if !path.exists() {
            info!(path = %path.display(), "No tokenizer artifact, text model gets raw strings");
            return Ok(None);
        }
        let tokenizer = SequenceTokenizer::from_json_file(path)?;
        info!(
            path = %path.display(),
            vocabulary = tokenizer.vocabulary_size(),
            "Tokenizer loaded"
        );
        Ok(Some(tokenizer))
    }
}

impl ModelLoader for OnnxModelLoader {
    fn load(&self, modality: Modality) -> Result<ModelHandle, LoadError> {
        let artifact = self.paths.artifact(modality);
        let classifier = OnnxClassifier::load(artifact)?;
        let labels = LabelManifest::load_for(artifact, modality)?;

        let mut handle = ModelHandle::new(modality, Arc::new(classifier)).with_labels(labels);
        if modality == Modality::Text {
            if let Some(tokenizer) = self.load_tokenizer()? {
                handle = handle.with_tokenizer(Arc::new(tokenizer));
            }
        }
        Ok(handle)
    }
}
