//! Configuration file loading
//!
//! The TOML file is the lowest-priority configuration tier: command-line
//! arguments and environment variables override it, built-in defaults fill
//! whatever it leaves out.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Contents of `config.toml`. Every field is optional.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct TomlConfig {
    /// Listen address, e.g. "127.0.0.1:5000"
    pub bind_addr: Option<String>,
    /// Directory for transient uploads
    pub upload_dir: Option<PathBuf>,
    /// Maximum accepted request body size in bytes
    pub max_upload_bytes: Option<usize>,
    pub models: ModelsConfig,
    pub logging: LoggingConfig,
}

/// Model artifact locations
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct ModelsConfig {
    pub text: Option<PathBuf>,
    pub tokenizer: Option<PathBuf>,
    pub audio: Option<PathBuf>,
    pub image: Option<PathBuf>,
}

/// Logging configuration
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive, e.g. "info" or "aigd_analyzer=debug"
    pub level: Option<String>,
}

/// Parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    let config = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))?;
    debug!(path = %path.display(), "Loaded TOML config");
    Ok(config)
}

/// Locate the default config file for the platform, if one exists.
///
/// Linux checks `~/.config/aigd/config.toml` then `/etc/aigd/config.toml`;
/// other platforms check only the per-user config directory.
pub fn default_config_path() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("aigd").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/aigd/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_full_config() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
bind_addr = "0.0.0.0:8080"
upload_dir = "/tmp/aigd-uploads"
max_upload_bytes = 1024

[models]
text = "m/text.onnx"
tokenizer = "m/tokenizer.json"
audio = "m/audio.onnx"
image = "m/image.onnx"

[logging]
level = "debug"
"#,
        )
        .unwrap();

        let config = load_toml_config(&path).unwrap();
        assert_eq!(config.bind_addr.as_deref(), Some("0.0.0.0:8080"));
        assert_eq!(config.upload_dir, Some(PathBuf::from("/tmp/aigd-uploads")));
        assert_eq!(config.max_upload_bytes, Some(1024));
        assert_eq!(config.models.audio, Some(PathBuf::from("m/audio.onnx")));
        assert_eq!(config.logging.level.as_deref(), Some("debug"));
    }

    #[test]
    fn test_partial_config_leaves_rest_unset() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[models]\nimage = \"img.onnx\"\n").unwrap();

        let config = load_toml_config(&path).unwrap();
        assert_eq!(config.bind_addr, None);
        assert_eq!(config.models.text, None);
        assert_eq!(config.models.image, Some(PathBuf::from("img.onnx")));
    }

    #[test]
    fn test_malformed_config_is_config_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "bind_addr = [unterminated").unwrap();

        let err = load_toml_config(&path).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("Parse"));
    }

    #[test]
    fn test_missing_config_is_config_error() {
        let err = load_toml_config(Path::new("/nonexistent/aigd/config.toml")).unwrap_err();
        assert!(err.to_string().contains("Read"));
    }
}
