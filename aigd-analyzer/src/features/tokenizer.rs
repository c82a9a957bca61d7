//! Word-index tokenizer compatible with Keras `Tokenizer` exports
//!
//! Accepts either the JSON written by `tokenizer.to_json()` (where
//! `config.word_index` is itself a JSON-encoded string) or a bare
//! `{"word": index, ...}` object.

use ndarray::Array2;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;

use crate::error::LoadError;

/// Keras' default `filters` argument
pub const DEFAULT_FILTERS: &str = "!\"#$%&()*+,-./:;<=>?@[\\]^_`{|}~\t\n";

/// Sequence length the text models were trained on
pub const SEQUENCE_LENGTH: usize = 500;

#[derive(Debug, Clone)]
pub struct SequenceTokenizer {
    word_index: HashMap<String, i64>,
    num_words: Option<i64>,
    lower: bool,
    filters: String,
    split: String,
    char_level: bool,
    oov_index: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct KerasExport {
    config: KerasConfig,
}

#[derive(Debug, Deserialize)]
struct KerasConfig {
    num_words: Option<i64>,
    #[serde(default = "default_filters")]
    filters: String,
    #[serde(default = "default_true")]
    lower: bool,
    #[serde(default = "default_split")]
    split: String,
    #[serde(default)]
    char_level: bool,
    oov_token: Option<String>,
    word_index: Value,
}

fn default_filters() -> String {
    DEFAULT_FILTERS.to_string()
}

fn default_true() -> bool {
    true
}

fn default_split() -> String {
    " ".to_string()
}

fn parse_word_index(value: Value) -> Result<HashMap<String, i64>, String> {
    match value {
        Value::String(encoded) => serde_json::from_str(&encoded).map_err(|e| e.to_string()),
        other => serde_json::from_value(other).map_err(|e| e.to_string()),
    }
}

impl SequenceTokenizer {
    /// Tokenizer with Keras defaults over a given vocabulary
    pub fn new(word_index: HashMap<String, i64>) -> Self {
        Self {
            word_index,
            num_words: None,
            lower: true,
            filters: DEFAULT_FILTERS.to_string(),
            split: " ".to_string(),
            char_level: false,
            oov_index: None,
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, String> {
        let value: Value = serde_json::from_str(json).map_err(|e| e.to_string())?;

        // A bare vocabulary may contain the word "config" itself
        if value.get("config").map_or(false, Value::is_object) {
            let export: KerasExport = serde_json::from_value(value).map_err(|e| e.to_string())?;
            let config = export.config;
            let word_index = parse_word_index(config.word_index)?;
            let oov_index = config
                .oov_token
                .as_ref()
                .and_then(|token| word_index.get(token).copied());
            return Ok(Self {
                word_index,
                num_words: config.num_words,
                lower: config.lower,
                filters: config.filters,
                split: config.split,
                char_level: config.char_level,
                oov_index,
            });
        }

        Ok(Self::new(parse_word_index(value)?))
    }

    pub fn from_json_file(path: &Path) -> Result<Self, LoadError> {
        let tokenizer_error = |message: String| LoadError::Tokenizer {
            path: path.to_path_buf(),
            message,
        };
        let content = std::fs::read_to_string(path).map_err(|e| tokenizer_error(e.to_string()))?;
        Self::from_json_str(&content).map_err(tokenizer_error)
    }

    pub fn vocabulary_size(&self) -> usize {
        self.word_index.len()
    }

    fn words(&self, text: &str) -> Vec<String> {
        let text = if self.lower {
            text.to_lowercase()
        } else {
            text.to_string()
        };

        if self.char_level {
            return text.chars().map(String::from).collect();
        }

        let translated: String = text
            .chars()
            .map(|c| {
                if self.filters.contains(c) {
                    self.split.clone()
                } else {
                    c.to_string()
                }
            })
            .collect();

        translated
            .split(self.split.as_str())
            .filter(|w| !w.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Word ids for `text`, unknown words dropped (or mapped to the OOV id)
    pub fn texts_to_sequence(&self, text: &str) -> Vec<i64> {
        let mut sequence = Vec::new();
        for word in self.words(text) {
            match self.word_index.get(&word) {
                Some(&index) => match self.num_words {
                    Some(limit) if index >= limit => {
                        if let Some(oov) = self.oov_index {
                            sequence.push(oov);
                        }
                    }
                    _ => sequence.push(index),
                },
                None => {
                    if let Some(oov) = self.oov_index {
                        sequence.push(oov);
                    }
                }
            }
        }
        sequence
    }

    /// Tokenize and pad to a `(1, length)` batch
    pub fn encode_padded(&self, text: &str, length: usize) -> Array2<i64> {
        let padded = pad_sequence(&self.texts_to_sequence(text), length);
        Array2::from_shape_fn((1, length), |(_, i)| padded[i])
    }
}

/// Keras `pad_sequences` with default `padding="pre"`, `truncating="pre"`:
/// longer sequences keep their tail, shorter ones are left-padded with zeros.
pub fn pad_sequence(sequence: &[i64], length: usize) -> Vec<i64> {
    if sequence.len() >= length {
        return sequence[sequence.len() - length..].to_vec();
    }
    let mut padded = vec![0; length - sequence.len()];
    padded.extend_from_slice(sequence);
    padded
}
