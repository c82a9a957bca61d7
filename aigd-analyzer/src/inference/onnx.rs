//! ONNX Runtime backed [`Classifier`]
//!
//! Works with the usual export layouts of binary classifiers:
//! - Keras networks: one float output, either `[N, 2]` probabilities or a
//!   `[N, 1]` sigmoid scalar
//! - scikit-learn pipelines (skl2onnx, `zipmap=False`): output 0 is the label
//!   tensor, output 1 the `[N, 2]` probability tensor
//!
//! `ort` sessions need exclusive access to run, so the session sits behind a
//! mutex; concurrent requests on the same model serialize here.

use std::path::Path;
use std::sync::Mutex;

use ndarray::{ArrayViewD, Axis};
use ort::session::{builder::GraphOptimizationLevel, Session, SessionOutputs};
use ort::tensor::TensorElementType;
use ort::value::{DynValue, Tensor, ValueType};
use tracing::{debug, info};

use super::{Classifier, FeatureTensor, InputShape, Label, RawPrediction};
use crate::error::{InferenceError, LoadError};

const INTRA_OP_THREADS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputKind {
    Float,
    Int64,
    Bool,
    Text,
    Other,
}

#[derive(Debug, Clone)]
struct OutputSpec {
    name: String,
    kind: OutputKind,
    shape: InputShape,
}

pub struct OnnxClassifier {
    session: Mutex<Session>,
    input_name: String,
    input_element: TensorElementType,
    input_shape: InputShape,
    outputs: Vec<OutputSpec>,
    proba_output: Option<usize>,
}

impl std::fmt::Debug for OnnxClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxClassifier")
            .field("input_name", &self.input_name)
            .field("input_element", &self.input_element)
            .field("input_shape", &self.input_shape)
            .field("outputs", &self.outputs)
            .field("proba_output", &self.proba_output)
            .finish()
    }
}

fn build_session(path: &Path) -> Result<Session, String> {
    let builder = Session::builder().map_err(|e| e.to_string())?;
    let builder = builder
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(|e| e.to_string())?;
    let mut builder = builder
        .with_intra_threads(INTRA_OP_THREADS)
        .map_err(|e| e.to_string())?;
    builder.commit_from_file(path).map_err(|e| e.to_string())
}

fn backend(err: ort::Error) -> InferenceError {
    InferenceError::Backend(err.to_string())
}

fn output_kind(ty: TensorElementType) -> OutputKind {
    match ty {
        TensorElementType::Float32 => OutputKind::Float,
        TensorElementType::Int64 => OutputKind::Int64,
        TensorElementType::Bool => OutputKind::Bool,
        TensorElementType::String => OutputKind::Text,
        _ => OutputKind::Other,
    }
}

/// First batch row of an output, flattened
fn first_row<T: Clone>(view: ArrayViewD<'_, T>) -> Result<Vec<T>, InferenceError> {
    if view.ndim() >= 2 {
        if view.shape()[0] == 0 {
            return Err(InferenceError::UnexpectedOutput(
                "model returned an empty batch".to_string(),
            ));
        }
        return Ok(view.index_axis(Axis(0), 0).iter().cloned().collect());
    }
    Ok(view.iter().cloned().collect())
}

fn first_value<T: Clone>(view: ArrayViewD<'_, T>) -> Result<T, InferenceError> {
    first_row(view)?
        .into_iter()
        .next()
        .ok_or_else(|| InferenceError::UnexpectedOutput("model returned no values".to_string()))
}

impl OnnxClassifier {
    /// Load an ONNX artifact and introspect its signature
    pub fn load(path: &Path) -> Result<Self, LoadError> {
        if !path.exists() {
            return Err(LoadError::Missing {
                path: path.to_path_buf(),
            });
        }

        let session = build_session(path).map_err(|message| LoadError::Deserialize {
            path: path.to_path_buf(),
            message,
        })?;

        let incompatible = |message: String| LoadError::Incompatible {
            path: path.to_path_buf(),
            message,
        };

        let input = session
            .inputs
            .first()
            .ok_or_else(|| incompatible("model declares no inputs".to_string()))?;
        let (input_element, input_shape) = match &input.input_type {
            ValueType::Tensor { ty, shape, .. } => (*ty, InputShape::from_signed(shape)),
            other => {
                return Err(incompatible(format!(
                    "first input '{}' is not a tensor: {:?}",
                    input.name, other
                )))
            }
        };
        let input_name = input.name.clone();

        let outputs: Vec<OutputSpec> = session
            .outputs
            .iter()
            .map(|output| match &output.output_type {
                ValueType::Tensor { ty, shape, .. } => OutputSpec {
                    name: output.name.clone(),
                    kind: output_kind(*ty),
                    shape: InputShape::from_signed(shape),
                },
                _ => OutputSpec {
                    name: output.name.clone(),
                    kind: OutputKind::Other,
                    shape: InputShape::new(Vec::new()),
                },
            })
            .collect();

        if outputs.is_empty() {
            return Err(incompatible("model declares no outputs".to_string()));
        }
        if outputs[0].kind == OutputKind::Other {
            return Err(incompatible(format!(
                "first output '{}' is not a numeric, boolean or string tensor",
                outputs[0].name
            )));
        }

        let proba_output = Self::find_proba_output(&outputs);

        info!(
            path = %path.display(),
            input = %input_name,
            input_shape = ?input_shape.dims(),
            outputs = outputs.len(),
            exposes_probabilities = proba_output.is_some(),
            "Loaded ONNX model"
        );

        Ok(Self {
            session: Mutex::new(session),
            input_name,
            input_element,
            input_shape,
            outputs,
            proba_output,
        })
    }

    /// skl2onnx puts probabilities second; a lone float `[N, 2]` output is a
    /// softmax head.
    fn find_proba_output(outputs: &[OutputSpec]) -> Option<usize> {
        if outputs.len() >= 2 && outputs[1].kind == OutputKind::Float {
            return Some(1);
        }
        let only = &outputs[0];
        let last_dim = only.shape.rank().checked_sub(1).and_then(|axis| only.shape.dim(axis));
        if outputs.len() == 1 && only.kind == OutputKind::Float && last_dim == Some(2) {
            return Some(0);
        }
        None
    }

    fn to_value(&self, input: &FeatureTensor) -> Result<DynValue, InferenceError> {
        let mismatch = || {
            InferenceError::UnsupportedInput(format!(
                "cannot feed {} features of shape {:?} to an input of type {:?}",
                input.kind_name(),
                input.shape(),
                self.input_element
            ))
        };

        match (input, self.input_element) {
            (FeatureTensor::Dense(array), TensorElementType::Float32) => {
                let data: Vec<f32> = array.iter().copied().collect();
                Tensor::from_array((array.shape().to_vec(), data.into_boxed_slice()))
                    .map(|t| t.into_dyn())
                    .map_err(backend)
            }
            (FeatureTensor::Tokens(tokens), TensorElementType::Int64) => {
                let data: Vec<i64> = tokens.iter().copied().collect();
                Tensor::from_array((tokens.shape().to_vec(), data.into_boxed_slice()))
                    .map(|t| t.into_dyn())
                    .map_err(backend)
            }
            (FeatureTensor::Tokens(tokens), TensorElementType::Int32) => {
                let data: Vec<i32> = tokens.iter().map(|&t| t as i32).collect();
                Tensor::from_array((tokens.shape().to_vec(), data.into_boxed_slice()))
                    .map(|t| t.into_dyn())
                    .map_err(backend)
            }
            (FeatureTensor::Tokens(tokens), TensorElementType::Float32) => {
                let data: Vec<f32> = tokens.iter().map(|&t| t as f32).collect();
                Tensor::from_array((tokens.shape().to_vec(), data.into_boxed_slice()))
                    .map(|t| t.into_dyn())
                    .map_err(backend)
            }
            (FeatureTensor::Text(text), TensorElementType::String) => {
                let shape = if self.input_shape.rank() <= 1 {
                    vec![1usize]
                } else {
                    vec![1usize, 1]
                };
                Tensor::from_string_array((shape, &[text.clone()][..]))
                    .map(|t| t.into_dyn())
                    .map_err(backend)
            }
            _ => Err(mismatch()),
        }
    }

    fn run<T>(
        &self,
        input: &FeatureTensor,
        extract: impl FnOnce(&SessionOutputs<'_>) -> Result<T, InferenceError>,
    ) -> Result<T, InferenceError> {
        let value = self.to_value(input)?;
        let mut session = self
            .session
            .lock()
            .map_err(|_| InferenceError::Backend("session lock poisoned".to_string()))?;

        debug!(input = %self.input_name, shape = ?input.shape(), "Running ONNX inference");
        let outputs = session
            .run(ort::inputs![self.input_name.as_str() => value])
            .map_err(backend)?;
        extract(&outputs)
    }
}

impl Classifier for OnnxClassifier {
    fn input_shape(&self) -> &InputShape {
        &self.input_shape
    }

    fn predict(&self, input: &FeatureTensor) -> Result<RawPrediction, InferenceError> {
        let kind = self.outputs[0].kind;
        self.run(input, |outputs| {
            let value = &outputs[0];
            match kind {
                OutputKind::Float => {
                    let view = value.try_extract_array::<f32>().map_err(backend)?;
                    Ok(RawPrediction::Scores(first_row(view)?))
                }
                OutputKind::Int64 => {
                    let view = value.try_extract_array::<i64>().map_err(backend)?;
                    Ok(RawPrediction::Label(Label::Int(first_value(view)?)))
                }
                OutputKind::Bool => {
                    let view = value.try_extract_array::<bool>().map_err(backend)?;
                    Ok(RawPrediction::Label(Label::Bool(first_value(view)?)))
                }
                OutputKind::Text => {
                    let array = value.try_extract_string_array().map_err(backend)?;
                    Ok(RawPrediction::Label(Label::Text(first_value(array.view())?)))
                }
                OutputKind::Other => Err(InferenceError::UnexpectedOutput(
                    "first output has an unsupported element type".to_string(),
                )),
            }
        })
    }

    fn supports_proba(&self) -> bool {
        self.proba_output.is_some()
    }

    fn predict_proba(&self, input: &FeatureTensor) -> Result<Vec<f32>, InferenceError> {
        let index = self.proba_output.ok_or_else(|| {
            InferenceError::UnsupportedInput("model does not expose class probabilities".to_string())
        })?;
        self.run(input, |outputs| {
            let view = outputs[index].try_extract_array::<f32>().map_err(backend)?;
            first_row(view)
        })
    }
}
