//! Story generation: turns annotated text into a narration file, one clip
//! per cue and the timeline the mixer consumes.
//!
//! The speech and sound-effect services sit behind the
//! [`NarrationSynthesizer`] and [`EffectSynthesizer`] traits; [`http`] holds
//! the network-backed implementations.

pub mod http;

use std::{path::PathBuf, thread, time::Duration};

use serde::Serialize;

use crate::{
    audio::{self, AudioTrack},
    config::{AppConfig, GenerationConfig, MixerConfig},
    cues::{Cue, CueExtractor},
    timeline::{TimelineCue, TimelineDescriptor},
    timing::TimingEstimator,
    Result, StoryMixError,
};

pub use http::{ElevenLabsEffects, GeminiNarrator};

/// Produces decoded narration audio for a block of text.
pub trait NarrationSynthesizer {
    fn synthesize(&self, text: &str, voice: &str) -> Result<AudioTrack>;
}

/// Produces an encoded sound-effect clip for a description.
pub trait EffectSynthesizer {
    fn synthesize(&self, description: &str, duration_seconds: f64) -> Result<Vec<u8>>;
}

/// Summary of a generation run.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationReport {
    pub clean_text: String,
    pub narration_path: PathBuf,
    pub timeline_path: PathBuf,
    pub cues: Vec<Cue>,
    /// Descriptions of cues whose effect could not be generated.
    pub failed: Vec<String>,
}

/// Generates narration and effect clips for a story and writes its timeline.
pub struct StoryGenerator<N, E> {
    extractor: CueExtractor,
    estimator: TimingEstimator,
    mixer: MixerConfig,
    generation: GenerationConfig,
    narrator: N,
    effects: E,
}

impl<N, E> StoryGenerator<N, E>
where
    N: NarrationSynthesizer,
    E: EffectSynthesizer,
{
    pub fn new(config: &AppConfig, narrator: N, effects: E) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            extractor: CueExtractor::new()?,
            estimator: TimingEstimator::new(config.timing.clone()),
            mixer: config.mixer.clone(),
            generation: config.generation.clone(),
            narrator,
            effects,
        })
    }

    /// Runs the pipeline with the configured default cue gain.
    pub fn process(&self, story: &str) -> Result<GenerationReport> {
        self.process_with_gain(story, self.generation.default_gain_db)
    }

    pub fn process_with_gain(&self, story: &str, gain_db: f64) -> Result<GenerationReport> {
        std::fs::create_dir_all(&self.mixer.output_dir)?;

        tracing::info!("parsing story");
        let extracted = self.extractor.extract(story);
        let mut cues = extracted.cues;
        self.estimator.estimate(&extracted.clean_text, &mut cues);
        tracing::info!(cues = cues.len(), "calculated cue timestamps");

        let narration_path = self.generate_narration(&extracted.clean_text)?;

        let mut failed = Vec::new();
        for (index, cue) in cues.iter_mut().enumerate() {
            if index > 0 && self.generation.request_delay_ms > 0 {
                thread::sleep(Duration::from_millis(self.generation.request_delay_ms));
            }
            match self.generate_effect(index, cue) {
                Ok(file) => {
                    cue.audio_ref = Some(file);
                    cue.gain_db = gain_db;
                }
                Err(err) => {
                    tracing::warn!(
                        description = cue.description.as_str(),
                        error = %err,
                        "sound effect generation failed, dropping cue"
                    );
                    failed.push(cue.description.clone());
                }
            }
        }

        let timeline = TimelineDescriptor::new(
            self.generation.narration_file.clone(),
            cues.iter().filter_map(TimelineCue::from_cue).collect(),
        );
        let timeline_path = self.mixer.resolve(&self.mixer.timeline_file);
        timeline.save(&timeline_path)?;
        tracing::info!(
            path = %timeline_path.display(),
            cues = timeline.cues.len(),
            "timeline saved"
        );

        Ok(GenerationReport {
            clean_text: extracted.clean_text,
            narration_path,
            timeline_path,
            cues,
            failed,
        })
    }

    fn generate_narration(&self, text: &str) -> Result<PathBuf> {
        tracing::info!(voice = self.generation.voice.as_str(), "generating narration");
        let track = self
            .narrator
            .synthesize(text, &self.generation.voice)
            .map_err(|err| StoryMixError::Generation(format!("narration: {err}")))?;
        let path = self.mixer.resolve(&self.generation.narration_file);
        audio::write_wav(&track, &path)?;
        tracing::info!(path = %path.display(), "saved narration");
        Ok(path)
    }

    fn generate_effect(&self, index: usize, cue: &Cue) -> Result<String> {
        tracing::info!(description = cue.description.as_str(), "generating sound effect");
        let bytes = self
            .effects
            .synthesize(&cue.description, self.generation.sfx_duration_seconds)?;
        let file = effect_file_name(index, &cue.description);
        std::fs::write(self.mixer.resolve(&file), bytes)?;
        Ok(file)
    }
}

/// `sfx_<n>_<description>.mp3`, with `n` counted from one and the
/// description cut to 20 characters.
pub fn effect_file_name(index: usize, description: &str) -> String {
    let safe: String = description
        .chars()
        .take(20)
        .map(|c| {
            if c.is_whitespace() || matches!(c, '/' | '\\') {
                '_'
            } else {
                c
            }
        })
        .collect();
    format!("sfx_{}_{safe}.mp3", index + 1)
}
