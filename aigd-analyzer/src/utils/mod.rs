//! Utility modules for aigd-analyzer

pub mod audio_decoder;
pub mod resampler;

pub use audio_decoder::{decode_audio_file, DecodedAudio};
pub use resampler::{resample_mono, ANALYSIS_SAMPLE_RATE};
