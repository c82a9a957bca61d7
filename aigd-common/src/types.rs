//! Shared domain types: modalities and the canonical analysis result

use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// Input kind accepted by the detector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Modality {
    Text,
    Audio,
    Image,
}

impl Modality {
    /// All modalities, in status-report order
    pub const ALL: [Modality; 3] = [Modality::Text, Modality::Audio, Modality::Image];

    /// Wire name, as sent in the `type` form field
    pub fn as_str(self) -> &'static str {
        match self {
            Modality::Text => "text",
            Modality::Audio => "audio",
            Modality::Image => "image",
        }
    }

    /// Capitalized name used in user-facing messages ("Audio model not available")
    pub fn title(self) -> &'static str {
        match self {
            Modality::Text => "Text",
            Modality::Audio => "Audio",
            Modality::Image => "Image",
        }
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Modality {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(Modality::Text),
            "audio" => Ok(Modality::Audio),
            "image" => Ok(Modality::Image),
            other => Err(Error::InvalidInput(format!("unknown modality '{}'", other))),
        }
    }
}

/// Canonical detection verdict returned for every modality
///
/// Only constructible through [`AnalysisResult::from_percentages`], which keeps
/// `confidence == max(ai, human)` and `is_generated == (ai > human)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    is_generated: bool,
    confidence: f64,
    ai_confidence: f64,
    human_confidence: f64,
}

impl AnalysisResult {
    /// Build a result from AI / human percentages.
    ///
    /// Values are clamped to [0, 100] and rounded to two decimals. Non-finite
    /// inputs collapse to 0.
    pub fn from_percentages(ai: f64, human: f64) -> Self {
        let ai_confidence = sanitize_percentage(ai);
        let human_confidence = sanitize_percentage(human);

        Self {
            is_generated: ai_confidence > human_confidence,
            confidence: ai_confidence.max(human_confidence),
            ai_confidence,
            human_confidence,
        }
    }

    /// 50/50 placeholder used when a modality degrades instead of failing
    pub fn neutral() -> Self {
        Self::from_percentages(50.0, 50.0)
    }

    pub fn is_generated(&self) -> bool {
        self.is_generated
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn ai_confidence(&self) -> f64 {
        self.ai_confidence
    }

    pub fn human_confidence(&self) -> f64 {
        self.human_confidence
    }
}

fn sanitize_percentage(value: f64) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    (value.clamp(0.0, 100.0) * 100.0).round() / 100.0
}
