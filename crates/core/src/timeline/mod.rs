//! Persisted hand-off between generation and mixing.
//!
//! The descriptor names the narration file and an ordered list of cues. Only
//! the structure is checked at load time; whether the referenced files exist
//! is left to the mixer.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{cues::Cue, Result, StoryMixError};

/// Latest cue offset accepted by [`TimelineDescriptor::load`].
pub const DEFAULT_MAX_OFFSET_SECONDS: f64 = 3_600.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineDescriptor {
    #[serde(rename = "narration_file")]
    pub narration_ref: String,
    /// Kept in extraction order. Offsets are not required to ascend.
    #[serde(default)]
    pub cues: Vec<TimelineCue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineCue {
    #[serde(default)]
    pub description: String,
    #[serde(rename = "file")]
    pub audio_ref: String,
    #[serde(rename = "time_sec")]
    pub time_offset: f64,
    #[serde(rename = "volume_db", default)]
    pub gain_db: f64,
}

impl TimelineCue {
    /// Builds a persisted cue from an enriched [`Cue`]. Returns `None` when
    /// no audio has been generated for it.
    pub fn from_cue(cue: &Cue) -> Option<Self> {
        let audio_ref = cue.audio_ref.clone()?;
        Some(Self {
            description: cue.description.clone(),
            audio_ref,
            time_offset: cue.time_offset,
            gain_db: cue.gain_db,
        })
    }
}

impl TimelineDescriptor {
    pub fn new(narration_ref: impl Into<String>, cues: Vec<TimelineCue>) -> Self {
        Self {
            narration_ref: narration_ref.into(),
            cues,
        }
    }

    /// Reads and validates a descriptor from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::load_with_max_offset(path, DEFAULT_MAX_OFFSET_SECONDS)
    }

    /// Like [`load`](Self::load), rejecting cues later than
    /// `max_offset_seconds`.
    pub fn load_with_max_offset(path: impl AsRef<Path>, max_offset_seconds: f64) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(StoryMixError::TimelineNotFound(path.to_path_buf()));
        }
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_with_max_offset(&raw, path, max_offset_seconds)
    }

    /// Parses a descriptor. `origin` is only used in diagnostics.
    pub fn from_json(raw: &str, origin: impl AsRef<Path>) -> Result<Self> {
        Self::from_json_with_max_offset(raw, origin, DEFAULT_MAX_OFFSET_SECONDS)
    }

    pub fn from_json_with_max_offset(
        raw: &str,
        origin: impl AsRef<Path>,
        max_offset_seconds: f64,
    ) -> Result<Self> {
        let origin = origin.as_ref();
        let descriptor: Self =
            serde_json::from_str(raw).map_err(|err| malformed(origin, err.to_string()))?;
        descriptor.validate(origin, max_offset_seconds)?;
        Ok(descriptor)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    fn validate(&self, origin: &Path, max_offset_seconds: f64) -> Result<()> {
        if self.narration_ref.trim().is_empty() {
            return Err(malformed(origin, "narration_file is empty"));
        }
        for (index, cue) in self.cues.iter().enumerate() {
            if cue.audio_ref.trim().is_empty() {
                return Err(malformed(origin, format!("cues[{index}].file is empty")));
            }
            if !cue.time_offset.is_finite() || cue.time_offset < 0.0 {
                return Err(malformed(
                    origin,
                    format!("cues[{index}].time_sec must be a non-negative number"),
                ));
            }
            if cue.time_offset > max_offset_seconds {
                return Err(malformed(
                    origin,
                    format!(
                        "cues[{index}].time_sec {} exceeds the {max_offset_seconds}s limit",
                        cue.time_offset
                    ),
                ));
            }
            if !cue.gain_db.is_finite() {
                return Err(malformed(
                    origin,
                    format!("cues[{index}].volume_db must be finite"),
                ));
            }
        }
        Ok(())
    }
}

fn malformed(origin: &Path, reason: impl Into<String>) -> StoryMixError {
    StoryMixError::MalformedTimeline {
        path: PathBuf::from(origin),
        reason: reason.into(),
    }
}
