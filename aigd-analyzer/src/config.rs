//! Service configuration
//!
//! Resolution order per setting: command-line flag, environment variable
//! (both via clap), TOML config file, built-in default.

use aigd_common::config::{default_config_path, load_toml_config, TomlConfig};
use aigd_common::{Error, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::info;

use crate::registry::ModelPaths;

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:5000";
pub const DEFAULT_UPLOAD_DIR: &str = "uploads";
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;
pub const DEFAULT_TEXT_MODEL: &str = "models/text_pipeline.onnx";
pub const DEFAULT_TOKENIZER: &str = "models/tokenizer.json";
pub const DEFAULT_AUDIO_MODEL: &str = "models/resnet50.onnx";
pub const DEFAULT_IMAGE_MODEL: &str = "models/images_model.onnx";

/// Command-line arguments for aigd-analyzer
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "aigd-analyzer")]
#[command(about = "AI-generated content detection service for text, audio and images")]
#[command(version)]
pub struct Args {
    /// Path to a TOML config file
    #[arg(short, long, env = "AIGD_CONFIG")]
    pub config: Option<PathBuf>,

    /// Address to listen on, e.g. 0.0.0.0:5000
    #[arg(short, long, env = "AIGD_BIND_ADDR")]
    pub bind_addr: Option<String>,

    /// Directory for transient upload files
    #[arg(long, env = "AIGD_UPLOAD_DIR")]
    pub upload_dir: Option<PathBuf>,

    /// Maximum request body size in bytes
    #[arg(long, env = "AIGD_MAX_UPLOAD_BYTES")]
    pub max_upload_bytes: Option<usize>,

    /// Text classifier artifact (.onnx)
    #[arg(long, env = "AIGD_TEXT_MODEL")]
    pub text_model: Option<PathBuf>,

    /// Keras tokenizer JSON for the text classifier
    #[arg(long, env = "AIGD_TOKENIZER")]
    pub tokenizer: Option<PathBuf>,

    /// Audio classifier artifact (.onnx)
    #[arg(long, env = "AIGD_AUDIO_MODEL")]
    pub audio_model: Option<PathBuf>,

    /// Image classifier artifact (.onnx)
    #[arg(long, env = "AIGD_IMAGE_MODEL")]
    pub image_model: Option<PathBuf>,
}

/// Fully resolved configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub upload_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub models: ModelPaths,
    /// `logging.level` from the TOML file; `RUST_LOG` takes precedence
    pub log_level: Option<String>,
    /// Config file that was read, if any
    pub config_file: Option<PathBuf>,
}

impl Config {
    /// Merge arguments with the config file and defaults
    ///
    /// An explicitly named config file must exist; the default location is
    /// optional.
    pub fn resolve(args: &Args) -> Result<Self> {
        let config_file = match &args.config {
            Some(path) if !path.exists() => {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    path.display()
                )))
            }
            Some(path) => Some(path.clone()),
            None => default_config_path(),
        };
        let toml = match &config_file {
            Some(path) => load_toml_config(path)?,
            None => TomlConfig::default(),
        };

        Self::merge(args, toml, config_file)
    }

    fn merge(args: &Args, toml: TomlConfig, config_file: Option<PathBuf>) -> Result<Self> {
        let bind_addr_text = args
            .bind_addr
            .clone()
            .or(toml.bind_addr)
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr: SocketAddr = bind_addr_text.parse().map_err(|e| {
            Error::Config(format!("Invalid bind address '{}': {}", bind_addr_text, e))
        })?;

        let max_upload_bytes = args
            .max_upload_bytes
            .or(toml.max_upload_bytes)
            .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES);
        if max_upload_bytes == 0 {
            return Err(Error::Config("max_upload_bytes must be positive".to_string()));
        }

        let pick = |cli: &Option<PathBuf>, file: Option<PathBuf>, default: &str| {
            cli.clone().or(file).unwrap_or_else(|| PathBuf::from(default))
        };

        Ok(Self {
            bind_addr,
            upload_dir: pick(&args.upload_dir, toml.upload_dir, DEFAULT_UPLOAD_DIR),
            max_upload_bytes,
            models: ModelPaths {
                text: pick(&args.text_model, toml.models.text, DEFAULT_TEXT_MODEL),
                tokenizer: pick(&args.tokenizer, toml.models.tokenizer, DEFAULT_TOKENIZER),
                audio: pick(&args.audio_model, toml.models.audio, DEFAULT_AUDIO_MODEL),
                image: pick(&args.image_model, toml.models.image, DEFAULT_IMAGE_MODEL),
            },
            log_level: toml.logging.level,
            config_file,
        })
    }

    pub fn log_summary(&self) {
        match &self.config_file {
            Some(path) => info!("Config file: {}", path.display()),
            None => info!("No config file found, using defaults"),
        }
        info!("Upload directory: {}", self.upload_dir.display());
        info!("Max upload size: {} bytes", self.max_upload_bytes);
        info!("Text model: {}", self.models.text.display());
        info!("Tokenizer: {}", self.models.tokenizer.display());
        info!("Audio model: {}", self.models.audio.display());
        info!("Image model: {}", self.models.image.display());
    }
}
