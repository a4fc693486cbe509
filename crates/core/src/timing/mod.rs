use crate::{config::TimingConfig, cues::Cue};

/// Maps cue positions to seconds using a fixed words-per-minute speech rate.
///
/// The result is an approximation of where the narration reaches a cue, not
/// an alignment against the synthesized speech.
#[derive(Debug, Clone)]
pub struct TimingEstimator {
    config: TimingConfig,
}

impl TimingEstimator {
    pub fn new(config: TimingConfig) -> Self {
        Self { config }
    }

    pub fn words_per_minute(&self) -> f64 {
        self.config.words_per_minute
    }

    /// Assigns `time_offset` to each cue from the words of `clean_text`
    /// preceding its position.
    pub fn estimate(&self, clean_text: &str, cues: &mut [Cue]) {
        for cue in cues.iter_mut() {
            cue.time_offset = self.offset_for_position(clean_text, cue.position);
            tracing::debug!(
                description = cue.description.as_str(),
                time_offset = cue.time_offset,
                "estimated cue time"
            );
        }
    }

    /// Seconds of narration before character `position` of `text`.
    pub fn offset_for_position(&self, text: &str, position: usize) -> f64 {
        let wpm = self.config.words_per_minute;
        if !wpm.is_finite() || wpm <= 0.0 {
            return 0.0;
        }

        let words = word_count(prefix_chars(text, position));
        let seconds = words as f64 / wpm * 60.0;
        round_to(seconds, self.config.precision_digits)
    }
}

impl Default for TimingEstimator {
    fn default() -> Self {
        Self::new(TimingConfig::default())
    }
}

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

fn prefix_chars(text: &str, chars: usize) -> &str {
    match text.char_indices().nth(chars) {
        Some((byte, _)) => &text[..byte],
        None => text,
    }
}

fn round_to(value: f64, digits: u32) -> f64 {
    let scale = 10f64.powi(digits as i32);
    let rounded = (value * scale).round() / scale;
    if rounded.is_finite() {
        rounded
    } else {
        value
    }
}
