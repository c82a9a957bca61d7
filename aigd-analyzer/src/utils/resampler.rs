//! Mono resampling using rubato
//!
//! The audio networks expect 22.05 kHz input, librosa's default load rate.

use anyhow::{anyhow, Result};
use rubato::{FastFixedIn, PolynomialDegree, Resampler};
use tracing::debug;

/// Sample rate every audio upload is converted to before feature extraction
pub const ANALYSIS_SAMPLE_RATE: u32 = 22_050;

/// Resample mono samples from `input_rate` to `output_rate`.
///
/// Returns a copy when the rates already match. The whole signal is processed
/// as one chunk.
pub fn resample_mono(input: &[f32], input_rate: u32, output_rate: u32) -> Result<Vec<f32>> {
    if input_rate == 0 {
        return Err(anyhow!("input sample rate is zero"));
    }
    if input_rate == output_rate || input.is_empty() {
        debug!(input_rate, output_rate, "Skipping resample");
        return Ok(input.to_vec());
    }

    debug!(
        input_rate,
        output_rate,
        frames = input.len(),
        "Resampling mono audio"
    );

    let mut resampler = FastFixedIn::<f32>::new(
        output_rate as f64 / input_rate as f64,
        1.0,
        PolynomialDegree::Septic,
        input.len(),
        1,
    )
    .map_err(|e| anyhow!("Failed to create resampler: {}", e))?;

    let mut output = resampler
        .process(&[input], None)
        .map_err(|e| anyhow!("Resampling failed: {}", e))?;

    Ok(output.pop().unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_rate_is_copy() {
        let input = vec![0.1, -0.2, 0.3];
        assert_eq!(resample_mono(&input, 22_050, 22_050).unwrap(), input);
    }

    #[test]
    fn test_empty_input() {
        assert!(resample_mono(&[], 44_100, 22_050).unwrap().is_empty());
    }

    #[test]
    fn test_zero_rate_rejected() {
        assert!(resample_mono(&[0.0; 4], 0, 22_050).is_err());
    }

    #[test]
    fn test_downsample_44k_to_22k() {
        let input_rate = 44_100;
        let frames = 4410;
        let input: Vec<f32> = (0..frames)
            .map(|i| (2.0 * std::f32::consts::PI * 440.0 * i as f32 / input_rate as f32).sin() * 0.5)
            .collect();

        let output = resample_mono(&input, input_rate, ANALYSIS_SAMPLE_RATE).unwrap();

        // Allow some variance due to resampler internals
        let expected = frames / 2;
        assert!(
            output.len() >= expected - 10 && output.len() <= expected + 10,
            "Expected ~{} frames, got {}",
            expected,
            output.len()
        );
    }
}
