//! # AIGD Common Library
//!
//! Shared code for the AIGD detection service:
//! - Modality identifiers
//! - The canonical analysis result record
//! - Configuration file loading
//! - Common error types

pub mod config;
pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{AnalysisResult, Modality};
