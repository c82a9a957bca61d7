//! Model inference seam
//!
//! Pipelines talk to models only through [`Classifier`]: a declared input
//! shape plus `predict` (and optionally `predict_proba`). The ONNX backend in
//! [`onnx`] is the production implementation; tests substitute fakes.

pub mod manifest;
pub mod onnx;

pub use manifest::{LabelManifest, ScalarMeaning};
pub use onnx::OnnxClassifier;

use crate::error::InferenceError;
use ndarray::{Array2, ArrayD};

/// Declared input shape of a model; `None` marks a dynamic dimension
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputShape {
    dims: Vec<Option<usize>>,
}

impl InputShape {
    pub fn new(dims: Vec<Option<usize>>) -> Self {
        Self { dims }
    }

    /// Build from an ONNX-style shape where non-positive entries are dynamic
    pub fn from_signed(dims: &[i64]) -> Self {
        Self::new(
            dims.iter()
                .map(|&d| if d > 0 { Some(d as usize) } else { None })
                .collect(),
        )
    }

    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    pub fn dims(&self) -> &[Option<usize>] {
        &self.dims
    }

    /// Size of axis `axis`, `None` if dynamic or out of range
    pub fn dim(&self, axis: usize) -> Option<usize> {
        self.dims.get(axis).copied().flatten()
    }

    /// Element count of one batch item, if every non-batch axis is fixed
    pub fn item_size(&self) -> Option<usize> {
        if self.dims.len() < 2 {
            return None;
        }
        self.dims[1..]
            .iter()
            .try_fold(1usize, |acc, d| d.map(|d| acc * d))
    }
}

/// Model input built by a feature extractor
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureTensor {
    /// Dense float tensor including the batch axis
    Dense(ArrayD<f32>),
    /// Token ids, shape (1, sequence length)
    Tokens(Array2<i64>),
    /// Raw text for models that vectorize internally
    Text(String),
}

impl FeatureTensor {
    pub fn kind_name(&self) -> &'static str {
        match self {
            FeatureTensor::Dense(_) => "dense",
            FeatureTensor::Tokens(_) => "token",
            FeatureTensor::Text(_) => "text",
        }
    }

    pub fn shape(&self) -> Vec<usize> {
        match self {
            FeatureTensor::Dense(array) => array.shape().to_vec(),
            FeatureTensor::Tokens(array) => array.shape().to_vec(),
            FeatureTensor::Text(_) => vec![1],
        }
    }
}

/// Class label emitted by a label-predicting model
#[derive(Debug, Clone, PartialEq)]
pub enum Label {
    Int(i64),
    Bool(bool),
    Text(String),
}

/// Raw model output, meaningful only to the matching normalizer
#[derive(Debug, Clone, PartialEq)]
pub enum RawPrediction {
    /// Scores of the first batch row, flattened
    Scores(Vec<f32>),
    Label(Label),
}

/// A loaded, read-only classification model
pub trait Classifier: Send + Sync {
    fn input_shape(&self) -> &InputShape;

    fn predict(&self, input: &FeatureTensor) -> Result<RawPrediction, InferenceError>;

    /// Whether [`Classifier::predict_proba`] yields class probabilities
    fn supports_proba(&self) -> bool {
        false
    }

    /// Class probability vector for the first batch row
    fn predict_proba(&self, _input: &FeatureTensor) -> Result<Vec<f32>, InferenceError> {
        Err(InferenceError::UnsupportedInput(
            "model does not expose class probabilities".to_string(),
        ))
    }
}
