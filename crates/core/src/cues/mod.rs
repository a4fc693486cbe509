//! Extraction of bracketed sound cues from annotated story text.
//!
//! A cue is any single-bracket span such as `[door creaking]`. Cue positions
//! are character offsets into the text with every annotation already
//! removed, so earlier cues contribute zero width to later offsets. Nested
//! brackets are not supported and produce whatever the leftmost match yields.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::Result;

const CUE_PATTERN: &str = r"\[([^\]]+)\]";

/// A single sound-effect event. Created by the extractor, enriched with a
/// time offset by the timing estimator and with an audio reference and gain
/// by the generation step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cue {
    pub description: String,
    /// Character offset into the de-annotated text.
    pub position: usize,
    pub time_offset: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_ref: Option<String>,
    #[serde(default)]
    pub gain_db: f64,
}

impl Cue {
    pub fn new(description: impl Into<String>, position: usize) -> Self {
        Self {
            description: description.into(),
            position,
            time_offset: 0.0,
            audio_ref: None,
            gain_db: 0.0,
        }
    }
}

/// Output of [`CueExtractor::extract`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedStory {
    /// Input with all annotations removed and whitespace collapsed.
    pub clean_text: String,
    pub cues: Vec<Cue>,
}

/// Finds `[...]` annotations in story text.
#[derive(Debug, Clone)]
pub struct CueExtractor {
    pattern: Regex,
}

impl CueExtractor {
    pub fn new() -> Result<Self> {
        Ok(Self {
            pattern: Regex::new(CUE_PATTERN)?,
        })
    }

    /// Scans `text` left to right and returns the de-annotated text together
    /// with the cues in source order.
    pub fn extract(&self, text: &str) -> ExtractedStory {
        let mut cues = Vec::new();
        let mut stripped = String::with_capacity(text.len());
        let mut cursor = 0;
        let mut position = 0;

        for captures in self.pattern.captures_iter(text) {
            let (Some(whole), Some(inner)) = (captures.get(0), captures.get(1)) else {
                continue;
            };
            let between = &text[cursor..whole.start()];
            position += between.chars().count();
            stripped.push_str(between);
            cursor = whole.end();

            tracing::debug!(description = inner.as_str(), position, "found cue");
            cues.push(Cue::new(inner.as_str(), position));
        }
        stripped.push_str(&text[cursor..]);

        ExtractedStory {
            clean_text: collapse_whitespace(&stripped),
            cues,
        }
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
