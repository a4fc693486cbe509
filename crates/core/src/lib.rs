//! Core library for the Story Mixer.
//!
//! Annotated story text flows through the crate in stages: bracketed sound
//! cues are pulled out of the text ([`cues`]), placed in time with a
//! speech-rate model ([`timing`]), recorded with their generated clips in a
//! persisted [`timeline`], and finally composited onto the narration by the
//! [`mixer`]. The [`generate`] module drives the external speech and
//! sound-effect services that sit between parsing and mixing.

pub mod audio;
pub mod config;
pub mod cues;
pub mod error;
pub mod generate;
pub mod mixer;
pub mod timeline;
pub mod timing;

pub use audio::AudioTrack;
pub use config::{AppConfig, GenerationConfig, MixerConfig, TimingConfig};
pub use cues::{Cue, CueExtractor, ExtractedStory};
pub use error::{Result, StoryMixError};
pub use generate::{
    EffectSynthesizer, ElevenLabsEffects, GeminiNarrator, GenerationReport, NarrationSynthesizer,
    StoryGenerator,
};
pub use mixer::{MixOutcome, MixReport, Mixer, Placement};
pub use timeline::{TimelineCue, TimelineDescriptor};
pub use timing::TimingEstimator;
