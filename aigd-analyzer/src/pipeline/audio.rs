//! Audio pipeline
//!
//! decode → mono → 22.05 kHz → pad to 1 s → 40 MFCCs → shaped to the model's
//! declared input rank.

use aigd_common::AnalysisResult;
use ndarray::{Array2, ArrayD, Axis, IxDyn, Slice};
use once_cell::sync::Lazy;
use std::path::Path;
use tracing::debug;

use super::{from_label, from_scores};
use crate::error::PipelineError;
use crate::features::{Mfcc, MfccConfig};
use crate::inference::{FeatureTensor, InputShape, RawPrediction};
use crate::registry::ModelHandle;
use crate::utils::{decode_audio_file, resample_mono, ANALYSIS_SAMPLE_RATE};

/// Shortest clip handed to the feature extractor, in samples
pub const MIN_SAMPLES: usize = ANALYSIS_SAMPLE_RATE as usize;

static MFCC: Lazy<Mfcc> = Lazy::new(|| {
    Mfcc::new(MfccConfig {
        sample_rate: ANALYSIS_SAMPLE_RATE,
        ..MfccConfig::default()
    })
});

pub fn extract(handle: &ModelHandle, path: &Path) -> Result<FeatureTensor, PipelineError> {
    let decoded =
        decode_audio_file(path).map_err(|e| PipelineError::Extract(format!("{:#}", e)))?;
    if decoded.samples.is_empty() {
        return Err(PipelineError::Extract(
            "audio stream contains no samples".to_string(),
        ));
    }

    let mut samples = resample_mono(&decoded.samples, decoded.sample_rate, ANALYSIS_SAMPLE_RATE)
        .map_err(|e| PipelineError::Extract(format!("{:#}", e)))?;
    if samples.len() < MIN_SAMPLES {
        samples.resize(MIN_SAMPLES, 0.0);
    }

    let mfcc = MFCC.compute(&samples);
    debug!(
        source_rate = decoded.sample_rate,
        channels = decoded.channels,
        frames = mfcc.ncols(),
        "MFCC features extracted"
    );

    shape_for_model(mfcc, handle.classifier().input_shape())
}

/// Zero-pad or truncate `axis` to `target` when the model fixes its length
fn fit_axis(array: Array2<f32>, axis: Axis, target: Option<usize>) -> Array2<f32> {
    let Some(target) = target else {
        return array;
    };
    let len = array.len_of(axis);
    if len == target {
        array
    } else if len > target {
        array.slice_axis(axis, Slice::from(0..target)).to_owned()
    } else {
        let mut dim = array.raw_dim();
        dim[axis.index()] = target;
        let mut fitted = Array2::<f32>::zeros(dim);
        fitted
            .slice_axis_mut(axis, Slice::from(0..len))
            .assign(&array);
        fitted
    }
}

fn check_axis(shape: &InputShape, axis: usize, actual: usize) -> Result<(), PipelineError> {
    match shape.dim(axis) {
        Some(expected) if expected != actual => Err(PipelineError::Extract(format!(
            "model expects {} on axis {} but MFCC provides {}",
            expected, axis, actual
        ))),
        _ => Ok(()),
    }
}

fn dense(dims: &[usize], values: Vec<f32>) -> Result<FeatureTensor, PipelineError> {
    ArrayD::from_shape_vec(IxDyn(dims), values)
        .map(FeatureTensor::Dense)
        .map_err(|e| PipelineError::Extract(e.to_string()))
}

/// Arrange an (n_mfcc × frames) matrix for the model's input rank
///
/// - rank 4: `[1, n_mfcc, frames, 1]`, frames fitted to a fixed width
/// - rank 3: `[1, frames, n_mfcc]`, frames fitted to a fixed length
/// - otherwise: per-coefficient means `[1, n]`, fitted to the flat item size
pub fn shape_for_model(
    mfcc: Array2<f32>,
    shape: &InputShape,
) -> Result<FeatureTensor, PipelineError> {
    match shape.rank() {
        4 => {
            check_axis(shape, 1, mfcc.nrows())?;
            let image = fit_axis(mfcc, Axis(1), shape.dim(2));
            let (height, width) = image.dim();
            dense(&[1, height, width, 1], image.iter().copied().collect())
        }
        3 => {
            check_axis(shape, 2, mfcc.nrows())?;
            let sequence = fit_axis(mfcc.reversed_axes(), Axis(0), shape.dim(1));
            let (frames, coefficients) = sequence.dim();
            dense(&[1, frames, coefficients], sequence.iter().copied().collect())
        }
        _ => {
            let mut means = mfcc
                .mean_axis(Axis(1))
                .ok_or_else(|| PipelineError::Extract("MFCC has no frames".to_string()))?
                .to_vec();
            if let Some(size) = shape.item_size() {
                means.resize(size, 0.0);
            }
            let len = means.len();
            dense(&[1, len], means)
        }
    }
}

pub fn normalize(
    handle: &ModelHandle,
    features: &FeatureTensor,
) -> Result<AnalysisResult, PipelineError> {
    match handle.classifier().predict(features)? {
        RawPrediction::Scores(scores) => from_scores(&scores, handle.labels()),
        RawPrediction::Label(label) => Ok(from_label(&label)),
    }
}

pub fn analyze(handle: &ModelHandle, path: &Path) -> Result<AnalysisResult, PipelineError> {
    let features = extract(handle, path)?;
    normalize(handle, &features)
}
