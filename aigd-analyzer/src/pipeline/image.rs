//! Image pipeline

use aigd_common::AnalysisResult;
use image::imageops::FilterType;
use image::{ImageReader, RgbImage};
use ndarray::{Array4, ArrayD};
use std::path::Path;
use tracing::debug;

use super::{from_label, from_scores};
use crate::error::PipelineError;
use crate::inference::{FeatureTensor, InputShape, RawPrediction};
use crate::registry::ModelHandle;

/// Target size when the model leaves height or width dynamic
pub const DEFAULT_SIZE: u32 = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// `[batch, height, width, channels]`
    Nhwc,
    /// `[batch, channels, height, width]`
    Nchw,
}

/// Layout and spatial size the model expects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageTarget {
    pub layout: Layout,
    pub height: u32,
    pub width: u32,
}

impl ImageTarget {
    pub fn for_shape(shape: &InputShape) -> Self {
        if shape.rank() != 4 {
            return Self {
                layout: Layout::Nhwc,
                height: DEFAULT_SIZE,
                width: DEFAULT_SIZE,
            };
        }

        let channels_first = shape.dim(1) == Some(3) && shape.dim(3) != Some(3);
        let (layout, h_axis, w_axis) = if channels_first {
            (Layout::Nchw, 2, 3)
        } else {
            (Layout::Nhwc, 1, 2)
        };
        let (height, width) = match (shape.dim(h_axis), shape.dim(w_axis)) {
            (Some(h), Some(w)) => (h as u32, w as u32),
            _ => (DEFAULT_SIZE, DEFAULT_SIZE),
        };

        Self {
            layout,
            height,
            width,
        }
    }
}

fn decode(path: &Path) -> Result<RgbImage, PipelineError> {
    let reader = ImageReader::open(path)?
        .with_guessed_format()
        .map_err(PipelineError::Read)?;
    let image = reader
        .decode()
        .map_err(|e| PipelineError::Extract(format!("failed to decode image: {}", e)))?;
    Ok(image.to_rgb8())
}

/// Scale pixels to [0, 1] in the requested layout, with a batch axis
pub fn to_tensor(image: &RgbImage, layout: Layout) -> ArrayD<f32> {
    let (width, height) = image.dimensions();
    let (h, w) = (height as usize, width as usize);
    let pixel = |y: usize, x: usize, c: usize| image.get_pixel(x as u32, y as u32)[c] as f32 / 255.0;

    let tensor = match layout {
        Layout::Nhwc => Array4::from_shape_fn((1, h, w, 3), |(_, y, x, c)| pixel(y, x, c)),
        Layout::Nchw => Array4::from_shape_fn((1, 3, h, w), |(_, c, y, x)| pixel(y, x, c)),
    };
    tensor.into_dyn()
}

pub fn extract(handle: &ModelHandle, path: &Path) -> Result<FeatureTensor, PipelineError> {
    let rgb = decode(path)?;
    let target = ImageTarget::for_shape(handle.classifier().input_shape());
    debug!(
        source_width = rgb.width(),
        source_height = rgb.height(),
        target_width = target.width,
        target_height = target.height,
        layout = ?target.layout,
        "Image decoded"
    );

    let resized = if rgb.dimensions() == (target.width, target.height) {
        rgb
    } else {
        image::imageops::resize(&rgb, target.width, target.height, FilterType::Nearest)
    };
    Ok(FeatureTensor::Dense(to_tensor(&resized, target.layout)))
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
