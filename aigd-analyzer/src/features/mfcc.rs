//! Mel-frequency cepstral coefficients
//!
//! Reproduces `librosa.feature.mfcc` defaults so features match what the
//! audio networks were trained on:
//!
//! 1. Centered STFT: zero-pad `n_fft / 2` on both sides, periodic Hann window,
//!    `n_fft = 2048`, hop 512
//! 2. Power spectrum `|X|^2`
//! 3. 128-band Slaney mel filterbank (Slaney area normalization, 0..sr/2)
//! 4. `power_to_db` with ref 1.0, amin 1e-10, top_db 80 (clip relative to the
//!    global maximum)
//! 5. Orthonormal DCT-II, first `n_mfcc` coefficients

use ndarray::Array2;
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::f64::consts::PI;
use std::sync::Arc;

/// Power floor before taking the log
const AMIN: f32 = 1e-10;

#[derive(Debug, Clone, PartialEq)]
pub struct MfccConfig {
    pub sample_rate: u32,
    pub n_mfcc: usize,
    pub n_fft: usize,
    pub hop_length: usize,
    pub n_mels: usize,
    /// Dynamic range kept below the loudest mel bin, in dB
    pub top_db: Option<f32>,
}

impl Default for MfccConfig {
    fn default() -> Self {
        Self {
            sample_rate: 22_050,
            n_mfcc: 40,
            n_fft: 2048,
            hop_length: 512,
            n_mels: 128,
            top_db: Some(80.0),
        }
    }
}

/// Precomputed MFCC extractor (window, filterbank, DCT basis, FFT plan)
pub struct Mfcc {
    config: MfccConfig,
    window: Vec<f32>,
    mel_filters: Vec<Vec<f32>>,
    dct_basis: Vec<Vec<f32>>,
    fft: Arc<dyn Fft<f32>>,
}

impl std::fmt::Debug for Mfcc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mfcc").field("config", &self.config).finish()
    }
}

// Slaney mel scale: linear below 1 kHz, logarithmic above
const F_SP: f64 = 200.0 / 3.0;
const MIN_LOG_HZ: f64 = 1000.0;
const MIN_LOG_MEL: f64 = MIN_LOG_HZ / F_SP;

fn log_step() -> f64 {
    6.4f64.ln() / 27.0
}

pub fn hz_to_mel(hz: f64) -> f64 {
    if hz >= MIN_LOG_HZ {
        MIN_LOG_MEL + (hz / MIN_LOG_HZ).ln() / log_step()
    } else {
        hz / F_SP
    }
}

pub fn mel_to_hz(mel: f64) -> f64 {
    if mel >= MIN_LOG_MEL {
        MIN_LOG_HZ * (log_step() * (mel - MIN_LOG_MEL)).exp()
    } else {
        F_SP * mel
    }
}

/// Periodic Hann window (`scipy.signal.get_window("hann", n, fftbins=True)`)
fn hann_window(n: usize) -> Vec<f32> {
    (0..n)
        .map(|i| (0.5 - 0.5 * (2.0 * PI * i as f64 / n as f64).cos()) as f32)
        .collect()
}

/// `librosa.filters.mel(htk=False, norm="slaney")`, shape (n_mels, 1 + n_fft/2)
fn mel_filterbank(sample_rate: u32, n_fft: usize, n_mels: usize) -> Vec<Vec<f32>> {
    let n_bins = 1 + n_fft / 2;
    let sr = sample_rate as f64;
    let fft_freqs: Vec<f64> = (0..n_bins).map(|k| k as f64 * sr / n_fft as f64).collect();

    let mel_min = hz_to_mel(0.0);
    let mel_max = hz_to_mel(sr / 2.0);
    let mel_points: Vec<f64> = (0..n_mels + 2)
        .map(|i| {
            let mel = mel_min + (mel_max - mel_min) * i as f64 / (n_mels + 1) as f64;
            mel_to_hz(mel)
        })
        .collect();

    (0..n_mels)
        .map(|m| {
            let left = mel_points[m];
            let center = mel_points[m + 1];
            let right = mel_points[m + 2];
            let enorm = 2.0 / (right - left);
            fft_freqs
                .iter()
                .map(|&f| {
                    let lower = (f - left) / (center - left);
                    let upper = (right - f) / (right - center);
                    (lower.min(upper).max(0.0) * enorm) as f32
                })
                .collect()
        })
        .collect()
}

/// Orthonormal DCT-II basis, shape (n_mfcc, n_mels)
fn dct_basis(n_mfcc: usize, n_mels: usize) -> Vec<Vec<f32>> {
    let n = n_mels as f64;
    (0..n_mfcc)
        .map(|k| {
            let scale = if k == 0 { (1.0 / n).sqrt() } else { (2.0 / n).sqrt() };
            (0..n_mels)
                .map(|i| (scale * (PI * k as f64 * (2.0 * i as f64 + 1.0) / (2.0 * n)).cos()) as f32)
                .collect()
        })
        .collect()
}

impl Mfcc {
    pub fn new(config: MfccConfig) -> Self {
        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(config.n_fft);
        Self {
            window: hann_window(config.n_fft),
            mel_filters: mel_filterbank(config.sample_rate, config.n_fft, config.n_mels),
            dct_basis: dct_basis(config.n_mfcc, config.n_mels),
            fft,
            config,
        }
    }

    /// Number of STFT frames produced for `n_samples` input samples
    pub fn frame_count(&self, n_samples: usize) -> usize {
        1 + n_samples / self.config.hop_length
    }

    /// Log-power mel spectrogram, shape (n_mels, frames)
    fn mel_db(&self, samples: &[f32]) -> Array2<f32> {
        let n_fft = self.config.n_fft;
        let pad = n_fft / 2;
        let mut padded = vec![0.0f32; samples.len() + 2 * pad];
        padded[pad..pad + samples.len()].copy_from_slice(samples);

        let frames = self.frame_count(samples.len());
        let n_bins = 1 + n_fft / 2;
        let mut mel = Array2::<f32>::zeros((self.config.n_mels, frames));
        let mut buffer = vec![Complex::new(0.0f32, 0.0); n_fft];
        let mut power = vec![0.0f32; n_bins];

        for t in 0..frames {
            let start = t * self.config.hop_length;
            for (i, slot) in buffer.iter_mut().enumerate() {
                *slot = Complex::new(padded[start + i] * self.window[i], 0.0);
            }
            self.fft.process(&mut buffer);
            for (k, p) in power.iter_mut().enumerate() {
                *p = buffer[k].norm_sqr();
            }
            for (m, filter) in self.mel_filters.iter().enumerate() {
                mel[[m, t]] = filter.iter().zip(&power).map(|(w, p)| w * p).sum();
            }
        }

        mel.mapv_inplace(|v| 10.0 * v.max(AMIN).log10());
        if let Some(top_db) = self.config.top_db {
            let peak = mel.iter().copied().fold(f32::NEG_INFINITY, f32::max);
            let floor = peak - top_db;
            mel.mapv_inplace(|v| v.max(floor));
        }
        mel
    }

    /// MFCC matrix, shape (n_mfcc, frames)
    pub fn compute(&self, samples: &[f32]) -> Array2<f32> {
        let mel_db = self.mel_db(samples);
        let frames = mel_db.ncols();
        let mut mfcc = Array2::<f32>::zeros((self.config.n_mfcc, frames));

        for t in 0..frames {
            let column = mel_db.column(t);
            for (k, basis) in self.dct_basis.iter().enumerate() {
                mfcc[[k, t]] = basis.iter().zip(column.iter()).map(|(b, v)| b * v).sum();
            }
        }
        mfcc
    }
}
