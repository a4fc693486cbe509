//! In-memory PCM buffers and the operations the mixer performs on them.
//!
//! Samples are interleaved `f32` normalised to `[-1.0, 1.0]`. Every
//! operation that can push a sample out of range saturates it, mirroring the
//! 16-bit integer container the mix is exported to.

mod decode;
mod export;

pub use decode::{decode_file, DecodeError};
pub use export::write_wav;

use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

use crate::{Result, StoryMixError};

/// Mutable PCM buffer with a fixed sample rate and channel layout.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioTrack {
    sample_rate: u32,
    channels: u16,
    samples: Vec<f32>,
}

impl AudioTrack {
    /// Wraps interleaved samples. The sample count must be a whole number of
    /// frames.
    pub fn new(sample_rate: u32, channels: u16, samples: Vec<f32>) -> Result<Self> {
        if sample_rate == 0 || channels == 0 {
            return Err(StoryMixError::msg(format!(
                "invalid audio layout: {sample_rate} Hz, {channels} channel(s)"
            )));
        }
        if samples.len() % channels as usize != 0 {
            return Err(StoryMixError::msg(format!(
                "{} samples do not form whole {channels}-channel frames",
                samples.len()
            )));
        }
        Ok(Self {
            sample_rate,
            channels,
            samples,
        })
    }

    pub fn silent(sample_rate: u32, channels: u16, frames: usize) -> Result<Self> {
        Self::new(sample_rate, channels, vec![0.0; frames * channels as usize])
    }

    /// Decodes raw little-endian signed 16-bit PCM.
    pub fn from_pcm_i16_le(bytes: &[u8], sample_rate: u32, channels: u16) -> Result<Self> {
        let samples = bytes
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f32 / 32_768.0)
            .collect();
        Self::new(sample_rate, channels, samples)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Length in frames (one sample per channel).
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    pub fn duration_seconds(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }

    /// Frame index corresponding to `seconds` at this track's sample rate.
    pub fn frame_at(&self, seconds: f64) -> Result<usize> {
        if seconds.is_nan() || seconds <= 0.0 {
            return Ok(0);
        }
        let frames = (seconds * self.sample_rate as f64).round();
        if !frames.is_finite() || frames >= usize::MAX as f64 {
            return Err(StoryMixError::OffsetOutOfRange(seconds));
        }
        Ok(frames as usize)
    }

    pub fn peak(&self) -> f32 {
        self.samples
            .iter()
            .fold(0.0_f32, |peak, sample| peak.max(sample.abs()))
    }

    /// Scales every sample by `10^(gain_db / 20)`.
    pub fn apply_gain_db(&mut self, gain_db: f64) {
        if gain_db == 0.0 {
            return;
        }
        let scale = 10f64.powf(gain_db / 20.0) as f32;
        for sample in &mut self.samples {
            *sample = saturate(*sample * scale);
        }
    }

    /// Returns a copy converted to the given sample rate and channel count.
    pub fn conformed(&self, sample_rate: u32, channels: u16) -> Result<Self> {
        let remixed = remix_channels(&self.samples, self.channels, channels);
        let resampled = resample(&remixed, channels, self.sample_rate, sample_rate)?;
        Self::new(sample_rate, channels, resampled)
    }

    /// Adds `clip` onto this track starting at `at_frame`. Samples already
    /// present are summed, never replaced; the track grows if the clip runs
    /// past the current end.
    pub fn overlay(&mut self, clip: &AudioTrack, at_frame: usize) -> Result<()> {
        self.ensure_same_layout(clip)?;
        let start = self.sample_index(at_frame)?;
        let end = start
            .checked_add(clip.samples.len())
            .ok_or(StoryMixError::TrackTooLong)?;
        self.grow_to(end)?;
        for (dst, src) in self.samples[start..end].iter_mut().zip(&clip.samples) {
            *dst = saturate(*dst + *src);
        }
        Ok(())
    }

    pub fn append_silence(&mut self, frames: usize) -> Result<()> {
        let len = self
            .sample_index(frames)?
            .checked_add(self.samples.len())
            .ok_or(StoryMixError::TrackTooLong)?;
        self.grow_to(len)
    }

    /// Concatenates `clip` after the current end.
    pub fn append(&mut self, clip: &AudioTrack) -> Result<()> {
        self.ensure_same_layout(clip)?;
        self.samples.extend_from_slice(&clip.samples);
        Ok(())
    }

    fn sample_index(&self, frame: usize) -> Result<usize> {
        frame
            .checked_mul(self.channels as usize)
            .ok_or(StoryMixError::TrackTooLong)
    }

    /// Zero-extends the buffer to `len` samples, failing instead of aborting
    /// when the allocation cannot be made.
    fn grow_to(&mut self, len: usize) -> Result<()> {
        if len <= self.samples.len() {
            return Ok(());
        }
        self.samples
            .try_reserve_exact(len - self.samples.len())
            .map_err(|_| StoryMixError::TrackTooLong)?;
        self.samples.resize(len, 0.0);
        Ok(())
    }

    fn ensure_same_layout(&self, other: &AudioTrack) -> Result<()> {
        if self.sample_rate != other.sample_rate || self.channels != other.channels {
            return Err(StoryMixError::msg(format!(
                "layout mismatch: track is {} Hz/{} ch, clip is {} Hz/{} ch",
                self.sample_rate, self.channels, other.sample_rate, other.channels
            )));
        }
        Ok(())
    }
}

fn saturate(sample: f32) -> f32 {
    sample.clamp(-1.0, 1.0)
}

fn remix_channels(samples: &[f32], from: u16, to: u16) -> Vec<f32> {
    if from == to {
        return samples.to_vec();
    }
    let (from, to) = (from as usize, to as usize);
    samples
        .chunks_exact(from)
        .flat_map(|frame| {
            let mono = frame.iter().sum::<f32>() / from as f32;
            std::iter::repeat(mono).take(to)
        })
        .collect()
}

/// Band-limited sample rate conversion of interleaved samples. The output
/// holds `round(frames * to / from)` frames with the filter delay removed.
fn resample(samples: &[f32], channels: u16, from_rate: u32, to_rate: u32) -> Result<Vec<f32>> {
    if from_rate == to_rate || samples.is_empty() {
        return Ok(samples.to_vec());
    }
    let channels = channels as usize;
    let in_frames = samples.len() / channels;
    let ratio = to_rate as f64 / from_rate as f64;
    let out_frames = (in_frames as f64 * ratio).round() as usize;

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };
    let mut resampler = SincFixedIn::<f32>::new(ratio, 1.0, params, in_frames, channels)?;

    let planar: Vec<Vec<f32>> = (0..channels)
        .map(|channel| samples.iter().skip(channel).step_by(channels).copied().collect())
        .collect();
    let mut output = resampler.process(&planar, None)?;
    let tail = resampler.process_partial(None::<&[Vec<f32>]>, None)?;
    for (channel, rest) in output.iter_mut().zip(tail) {
        channel.extend(rest);
    }

    let delay = resampler.output_delay();
    let mut interleaved = Vec::with_capacity(out_frames * channels);
    for frame in delay..delay + out_frames {
        for channel in &output {
            interleaved.push(channel.get(frame).copied().unwrap_or(0.0));
        }
    }
    Ok(interleaved)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mono(samples: &[f32]) -> AudioTrack {
        AudioTrack::new(10, 1, samples.to_vec()).unwrap()
    }

    #[test]
    fn rejects_partial_frames() {
        assert!(AudioTrack::new(44_100, 2, vec![0.0; 3]).is_err());
        assert!(AudioTrack::new(0, 1, vec![]).is_err());
    }

    #[test]
    fn overlay_sums_without_changing_length() {
        let mut track = mono(&[0.25, 0.25, 0.25, 0.25]);
        track.overlay(&mono(&[0.5, 0.125]), 1).unwrap();

        assert_eq!(track.frames(), 4);
        assert_eq!(track.samples(), &[0.25, 0.75, 0.375, 0.25]);
    }

    #[test]
    fn overlay_past_end_grows_track() {
        let mut track = mono(&[0.1, 0.1, 0.1]);
        track.overlay(&mono(&[0.2, 0.2, 0.2]), 2).unwrap();

        assert_eq!(track.frames(), 5);
        assert_eq!(track.samples()[4], 0.2);
    }

    #[test]
    fn overlay_saturates() {
        let mut track = mono(&[0.9, -0.9]);
        track.overlay(&mono(&[0.5, -0.5]), 0).unwrap();
        assert_eq!(track.samples(), &[1.0, -1.0]);
    }

    #[test]
    fn append_after_silence() {
        let mut track = mono(&[0.1]);
        track.append_silence(2).unwrap();
        track.append(&mono(&[0.3])).unwrap();
        assert_eq!(track.samples(), &[0.1, 0.0, 0.0, 0.3]);
    }

    #[test]
    fn layout_mismatch_is_an_error() {
        let mut track = mono(&[0.0]);
        let stereo = AudioTrack::new(10, 2, vec![0.0, 0.0]).unwrap();
        assert!(track.overlay(&stereo, 0).is_err());
        assert!(track.append(&stereo).is_err());
    }

    #[test]
    fn gain_in_decibels() {
        let mut track = mono(&[0.1, -0.1]);
        track.apply_gain_db(20.0);
        assert!((track.samples()[0] - 1.0).abs() < 1e-6);

        let mut track = mono(&[0.5]);
        track.apply_gain_db(-6.0);
        assert!((track.samples()[0] - 0.2506).abs() < 1e-3);
    }

    #[test]
    fn conforms_channels_and_rate() {
        let stereo = AudioTrack::new(10, 2, vec![0.2, 0.4, 0.6, 0.8]).unwrap();
        let mono_track = stereo.conformed(10, 1).unwrap();
        assert_eq!(mono_track.channels(), 1);
        assert!((mono_track.samples()[0] - 0.3).abs() < 1e-6);
        assert!((mono_track.samples()[1] - 0.7).abs() < 1e-6);

        let upsampled = mono(&[0.0, 1.0]).conformed(20, 2).unwrap();
        assert_eq!(upsampled.frames(), 4);
        assert_eq!(upsampled.channels(), 2);
        assert_eq!(upsampled.sample_rate(), 20);
    }

    fn tone(sample_rate: u32, frequency: f32, frames: usize, amplitude: f32) -> AudioTrack {
        let samples = (0..frames)
            .map(|n| {
                let t = n as f32 / sample_rate as f32;
                amplitude * (2.0 * std::f32::consts::PI * frequency * t).sin()
            })
            .collect();
        AudioTrack::new(sample_rate, 1, samples).unwrap()
    }

    fn rms(samples: &[f32]) -> f32 {
        (samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32).sqrt()
    }

    #[test]
    fn downsamples_effect_rate_to_narration_rate() {
        let clip = AudioTrack::new(44_100, 1, vec![0.5; 44_100]).unwrap();
        let conformed = clip.conformed(24_000, 1).unwrap();

        assert_eq!(conformed.sample_rate(), 24_000);
        assert_eq!(conformed.frames(), 24_000);
        assert!((conformed.samples()[12_000] - 0.5).abs() < 0.01);
    }

    #[test]
    fn downsampling_filters_content_above_new_nyquist() {
        let audible = tone(44_100, 1_000.0, 44_100, 0.5).conformed(24_000, 1).unwrap();
        let too_high = tone(44_100, 15_000.0, 44_100, 0.5).conformed(24_000, 1).unwrap();

        let middle = 4_000..20_000;
        assert!(rms(&audible.samples()[middle.clone()]) > 0.3);
        assert!(rms(&too_high.samples()[middle]) < 0.05);
    }

    #[test]
    fn frame_positions_round_to_nearest() {
        let track = AudioTrack::silent(1_000, 1, 0).unwrap();
        assert_eq!(track.frame_at(1.4754).unwrap(), 1_475);
        assert_eq!(track.frame_at(-2.0).unwrap(), 0);
    }

    #[test]
    fn huge_offsets_are_errors_not_panics() {
        let mut track = mono(&[0.1; 4]);
        assert!(matches!(
            track.frame_at(1e300),
            Err(StoryMixError::OffsetOutOfRange(_))
        ));
        assert!(matches!(
            track.append_silence(usize::MAX),
            Err(StoryMixError::TrackTooLong)
        ));
        assert!(track.overlay(&mono(&[0.1]), usize::MAX).is_err());
        assert_eq!(track.frames(), 4);
    }

    #[test]
    fn decodes_little_endian_pcm() {
        let track = AudioTrack::from_pcm_i16_le(&[0x00, 0x40, 0x00, 0xC0], 24_000, 1).unwrap();
        assert_eq!(track.samples(), &[0.5, -0.5]);
    }
}
