//! Model registry
//!
//! Owns one slot per modality. A slot is filled at most once, by the first
//! successful load; concurrent first access blocks on the slot's once-cell so
//! the artifact is never loaded twice. Failed loads leave the slot empty and
//! are retried on the next `ensure_loaded` / `status` call.

pub mod loader;

pub use loader::{ModelPaths, OnnxModelLoader};

use aigd_common::Modality;
use once_cell::sync::OnceCell;
use serde::Serialize;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

use crate::error::LoadError;
use crate::features::SequenceTokenizer;
use crate::inference::{Classifier, LabelManifest};

/// A loaded model plus the artifacts that travel with it
#[derive(Clone)]
pub struct ModelHandle {
    modality: Modality,
    classifier: Arc<dyn Classifier>,
    tokenizer: Option<Arc<SequenceTokenizer>>,
    labels: LabelManifest,
}

impl std::fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelHandle")
            .field("modality", &self.modality)
            .field("input_shape", self.classifier.input_shape())
            .field("tokenizer", &self.tokenizer.is_some())
            .field("labels", &self.labels)
            .finish()
    }
}

impl ModelHandle {
    pub fn new(modality: Modality, classifier: Arc<dyn Classifier>) -> Self {
        Self {
            modality,
            classifier,
            tokenizer: None,
            labels: LabelManifest::defaults_for(modality),
        }
    }

    pub fn with_tokenizer(mut self, tokenizer: Arc<SequenceTokenizer>) -> Self {
        self.tokenizer = Some(tokenizer);
        self
    }

    pub fn with_labels(mut self, labels: LabelManifest) -> Self {
        self.labels = labels;
        self
    }

    pub fn modality(&self) -> Modality {
        self.modality
    }

    pub fn classifier(&self) -> &dyn Classifier {
        self.classifier.as_ref()
    }

    pub fn tokenizer(&self) -> Option<&SequenceTokenizer> {
        self.tokenizer.as_deref()
    }

    pub fn labels(&self) -> &LabelManifest {
        &self.labels
    }
}

/// Source of model artifacts
pub trait ModelLoader: Send + Sync {
    fn load(&self, modality: Modality) -> Result<ModelHandle, LoadError>;
}

/// Availability of each modality's model, as reported by `GET /status`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ModelStatus {
    pub text: bool,
    pub audio: bool,
    pub image: bool,
}

impl ModelStatus {
    pub fn get(&self, modality: Modality) -> bool {
        match modality {
            Modality::Text => self.text,
            Modality::Audio => self.audio,
            Modality::Image => self.image,
        }
    }
}

#[derive(Default)]
struct ModelSlot {
    cell: OnceCell<ModelHandle>,
    last_error: Mutex<Option<String>>,
}

impl ModelSlot {
    fn last_error(&self) -> Option<String> {
        self.last_error
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Store the error, returning whether it differs from the previous one
    fn record_error(&self, message: Option<String>) -> bool {
        let mut guard = self
            .last_error
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let changed = *guard != message;
        *guard = message;
        changed
    }
}

pub struct ModelRegistry {
    loader: Box<dyn ModelLoader>,
    text: ModelSlot,
    audio: ModelSlot,
    image: ModelSlot,
}

impl ModelRegistry {
    pub fn new(loader: impl ModelLoader + 'static) -> Self {
        Self {
            loader: Box::new(loader),
            text: ModelSlot::default(),
            audio: ModelSlot::default(),
            image: ModelSlot::default(),
        }
    }

    fn slot(&self, modality: Modality) -> &ModelSlot {
        match modality {
            Modality::Text => &self.text,
            Modality::Audio => &self.audio,
            Modality::Image => &self.image,
        }
    }

    /// Return the model for `modality`, loading it on first use
    pub fn ensure_loaded(&self, modality: Modality) -> Result<ModelHandle, LoadError> {
        let slot = self.slot(modality);
        if let Some(handle) = slot.cell.get() {
            return Ok(handle.clone());
        }

        let result = slot.cell.get_or_try_init(|| {
            debug!(%modality, "Loading model");
            self.loader.load(modality)
        });

        match result {
            Ok(handle) => {
                if slot.record_error(None) {
                    info!(%modality, "Model loaded after earlier failure");
                }
                Ok(handle.clone())
            }
            Err(e) => {
                let message = e.to_string();
                if slot.record_error(Some(message.clone())) {
                    warn!(%modality, error = %message, "Model unavailable");
                } else {
                    debug!(%modality, error = %message, "Model still unavailable");
                }
                Err(e)
            }
        }
    }

    /// Whether the model is loaded, without attempting a load
    pub fn is_loaded(&self, modality: Modality) -> bool {
        self.slot(modality).cell.get().is_some()
    }

    /// Message of the most recent failed load, cleared by a later success
    pub fn last_error(&self, modality: Modality) -> Option<String> {
        self.slot(modality).last_error()
    }

    /// Availability of every modality, retrying any that are not loaded yet
    pub fn status(&self) -> ModelStatus {
        ModelStatus {
            text: self.ensure_loaded(Modality::Text).is_ok(),
            audio: self.ensure_loaded(Modality::Audio).is_ok(),
            image: self.ensure_loaded(Modality::Image).is_ok(),
        }
    }

    /// Eagerly load all models at startup, logging each outcome
    pub fn preload(&self) -> ModelStatus {
        for modality in Modality::ALL {
            match self.ensure_loaded(modality) {
                Ok(handle) => info!(
                    %modality,
                    input_shape = ?handle.classifier().input_shape().dims(),
                    tokenizer = handle.tokenizer().is_some(),
                    "✓ Model ready"
                ),
                Err(_) => warn!(%modality, "Model not loaded; requests will get 503 until it loads"),
            }
        }
        ModelStatus {
            text: self.is_loaded(Modality::Text),
            audio: self.is_loaded(Modality::Audio),
            image: self.is_loaded(Modality::Image),
        }
    }
}
