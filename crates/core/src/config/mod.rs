use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{timeline::DEFAULT_MAX_OFFSET_SECONDS, Result, StoryMixError};

const MAX_PRECISION_DIGITS: u32 = 9;

/// Top-level configuration structure for the application.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub timing: TimingConfig,
    pub mixer: MixerConfig,
    pub generation: GenerationConfig,
}

impl AppConfig {
    /// Reads a JSON configuration file. Sections or fields that are absent
    /// fall back to their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects values the timing model or the generators cannot work with.
    pub fn validate(&self) -> Result<()> {
        let wpm = self.timing.words_per_minute;
        if !wpm.is_finite() || wpm <= 0.0 {
            return Err(StoryMixError::InvalidConfig(format!(
                "words_per_minute must be a positive number, got {wpm}"
            )));
        }
        if self.timing.precision_digits > MAX_PRECISION_DIGITS {
            return Err(StoryMixError::InvalidConfig(format!(
                "precision_digits must be at most {MAX_PRECISION_DIGITS}, got {}",
                self.timing.precision_digits
            )));
        }
        let max_offset = self.mixer.max_offset_seconds;
        if !max_offset.is_finite() || max_offset <= 0.0 {
            return Err(StoryMixError::InvalidConfig(format!(
                "max_offset_seconds must be a positive number, got {max_offset}"
            )));
        }
        if self.generation.narration_sample_rate == 0 {
            return Err(StoryMixError::InvalidConfig(
                "narration_sample_rate must be non-zero".to_string(),
            ));
        }
        let duration = self.generation.sfx_duration_seconds;
        if !duration.is_finite() || duration < 0.0 {
            return Err(StoryMixError::InvalidConfig(format!(
                "sfx_duration_seconds must be non-negative, got {duration}"
            )));
        }
        Ok(())
    }
}

/// Speech-rate model used to turn word positions into seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub words_per_minute: f64,
    /// Number of decimal places kept on computed offsets (2 = centiseconds).
    pub precision_digits: u32,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            words_per_minute: 122.0,
            precision_digits: 2,
        }
    }
}

/// Locations used by the mixing engine. Every file name is resolved relative
/// to `output_dir`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MixerConfig {
    pub output_dir: PathBuf,
    pub timeline_file: String,
    pub output_file: String,
    /// Cues later than this are rejected when the timeline is loaded.
    pub max_offset_seconds: f64,
}

impl Default for MixerConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("story_output"),
            timeline_file: "timeline_for_mixer.json".to_string(),
            output_file: "final_story_mixed.wav".to_string(),
            max_offset_seconds: DEFAULT_MAX_OFFSET_SECONDS,
        }
    }
}

impl MixerConfig {
    pub fn resolve(&self, file: impl AsRef<Path>) -> PathBuf {
        self.output_dir.join(file)
    }
}

/// Settings for the narration and sound-effect generation services.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub voice: String,
    pub narration_file: String,
    pub narration_sample_rate: u32,
    pub narration_style_prefix: String,
    pub sfx_duration_seconds: f64,
    pub prompt_influence: f64,
    /// Gain written to every generated cue unless overridden per run.
    pub default_gain_db: f64,
    /// Pause between consecutive sound-effect requests.
    pub request_delay_ms: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            voice: "Aoede".to_string(),
            narration_file: "narration.wav".to_string(),
            narration_sample_rate: 24_000,
            narration_style_prefix: "Say naturally and expressively: ".to_string(),
            sfx_duration_seconds: 3.0,
            prompt_influence: 0.3,
            default_gain_db: 5.0,
            request_delay_ms: 1_000,
        }
    }
}
