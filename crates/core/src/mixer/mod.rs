//! Composites cue clips onto a narration track.
//!
//! Cues are applied one at a time, in descriptor order, against the track as
//! it stands after the previous cue. A cue that starts inside the current
//! track is overlaid (summed); a cue at or past the end is appended after a
//! run of silence. Because the branch depends on the live track length, the
//! order of cues in the descriptor is significant and is never re-sorted.

use std::path::PathBuf;

use serde::Serialize;

use crate::{
    audio::{self, AudioTrack},
    config::MixerConfig,
    timeline::{TimelineCue, TimelineDescriptor},
    Result, StoryMixError,
};

/// How a cue ended up in the track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Placement {
    Overlaid,
    Appended,
}

/// A cue that made it into the mix and where it landed.
#[derive(Debug, Clone, Serialize)]
pub struct AppliedCue {
    pub index: usize,
    pub description: String,
    pub at_seconds: f64,
    pub placement: Placement,
}

/// A cue that was left out of the mix.
#[derive(Debug, Clone, Serialize)]
pub struct CueWarning {
    pub index: usize,
    pub description: String,
    pub path: PathBuf,
    pub reason: String,
}

/// Summary of a single mix run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MixReport {
    pub cues_total: usize,
    pub applied: Vec<AppliedCue>,
    pub warnings: Vec<CueWarning>,
    pub duration_seconds: f64,
    pub peak: f32,
    pub output_path: Option<PathBuf>,
}

impl MixReport {
    pub fn cues_mixed(&self) -> usize {
        self.applied.len()
    }

    pub fn count(&self, placement: Placement) -> usize {
        self.applied
            .iter()
            .filter(|cue| cue.placement == placement)
            .count()
    }
}

#[derive(Debug)]
pub struct MixOutcome {
    pub track: AudioTrack,
    pub report: MixReport,
}

/// Mixing engine bound to one output directory.
#[derive(Debug, Clone)]
pub struct Mixer {
    config: MixerConfig,
}

impl Mixer {
    pub fn new(config: MixerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MixerConfig {
        &self.config
    }

    /// Loads `timeline_file` from the output directory, mixes it and writes
    /// the result to `output_file` in the same directory.
    ///
    /// Structural problems with the timeline and an unreadable narration abort
    /// before anything is written. Missing cue clips are skipped and listed in
    /// the report.
    pub fn mix_file(&self, timeline_file: &str, output_file: &str) -> Result<MixReport> {
        let timeline_path = self.config.resolve(timeline_file);
        tracing::info!(path = %timeline_path.display(), "loading timeline");
        let timeline =
            TimelineDescriptor::load_with_max_offset(&timeline_path, self.config.max_offset_seconds)?;

        let MixOutcome { track, mut report } = self.mix(&timeline)?;

        let output_path = self.config.resolve(output_file);
        audio::write_wav(&track, &output_path)?;
        tracing::info!(
            path = %output_path.display(),
            duration_seconds = report.duration_seconds,
            mixed = report.cues_mixed(),
            skipped = report.warnings.len(),
            "mix complete"
        );
        report.output_path = Some(output_path);
        Ok(report)
    }

    /// Mixes a descriptor in memory.
    pub fn mix(&self, timeline: &TimelineDescriptor) -> Result<MixOutcome> {
        let mut track = self.load_narration(&timeline.narration_ref)?;
        tracing::info!(
            narration = timeline.narration_ref.as_str(),
            cues = timeline.cues.len(),
            sample_rate = track.sample_rate(),
            channels = track.channels(),
            "loaded base track"
        );

        let mut report = MixReport {
            cues_total: timeline.cues.len(),
            ..Default::default()
        };

        for (index, cue) in timeline.cues.iter().enumerate() {
            let clip = match self.load_cue(cue, &track) {
                Ok(clip) => clip,
                Err(StoryMixError::CueResourceMissing { path, reason }) => {
                    tracing::warn!(
                        index,
                        description = cue.description.as_str(),
                        path = %path.display(),
                        reason = reason.as_str(),
                        "skipping cue"
                    );
                    report.warnings.push(CueWarning {
                        index,
                        description: cue.description.clone(),
                        path,
                        reason,
                    });
                    continue;
                }
                Err(err) => return Err(err),
            };

            let placement = apply_cue(&mut track, &clip, cue.time_offset)?;
            tracing::debug!(
                index,
                description = cue.description.as_str(),
                at_seconds = cue.time_offset,
                ?placement,
                "mixed cue"
            );
            report.applied.push(AppliedCue {
                index,
                description: cue.description.clone(),
                at_seconds: cue.time_offset,
                placement,
            });
        }

        report.duration_seconds = track.duration_seconds();
        report.peak = track.peak();
        Ok(MixOutcome { track, report })
    }

    fn load_narration(&self, narration_ref: &str) -> Result<AudioTrack> {
        let path = self.config.resolve(narration_ref);
        audio::decode_file(&path).map_err(|err| StoryMixError::NarrationUnreadable {
            path,
            reason: err.to_string(),
        })
    }

    /// Decodes a cue clip, applies its gain and converts it to the track's
    /// layout. Failures come back as [`StoryMixError::CueResourceMissing`].
    fn load_cue(&self, cue: &TimelineCue, track: &AudioTrack) -> Result<AudioTrack> {
        let path = self.config.resolve(&cue.audio_ref);
        let missing = |reason: String| StoryMixError::CueResourceMissing {
            path: path.clone(),
            reason,
        };

        let decoded = audio::decode_file(&path).map_err(|err| missing(err.to_string()))?;
        let mut clip = decoded
            .conformed(track.sample_rate(), track.channels())
            .map_err(|err| missing(err.to_string()))?;
        clip.apply_gain_db(cue.gain_db);
        Ok(clip)
    }
}

/// Places `clip` on `track` at `time_offset` seconds, choosing overlay or
/// gap-fill from the track's current length.
pub fn apply_cue(track: &mut AudioTrack, clip: &AudioTrack, time_offset: f64) -> Result<Placement> {
    let position = track.frame_at(time_offset)?;
    let length = track.frames();

    if position < length {
        track.overlay(clip, position)?;
        Ok(Placement::Overlaid)
    } else {
        track.append_silence(position - length)?;
        track.append(clip)?;
        Ok(Placement::Appended)
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;

    const RATE: u32 = 1_000;
    const NARRATION: i16 = 8_192;
    const EFFECT: i16 = 4_096;

    fn write_wav(path: &Path, sample_rate: u32, channels: u16, frames: usize, value: i16) {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for _ in 0..frames * channels as usize {
            writer.write_sample(value).unwrap();
        }
        writer.finalize().unwrap();
    }

    fn read_output(path: &Path) -> Vec<i16> {
        hound::WavReader::open(path)
            .unwrap()
            .samples::<i16>()
            .map(|sample| sample.unwrap())
            .collect()
    }

    fn cue(file: &str, time_sec: f64) -> TimelineCue {
        TimelineCue {
            description: file.trim_end_matches(".wav").to_string(),
            audio_ref: file.to_string(),
            time_offset: time_sec,
            gain_db: 0.0,
        }
    }

    struct Fixture {
        dir: tempfile::TempDir,
        mixer: Mixer,
    }

    impl Fixture {
        /// One second of mono narration plus a 200 ms effect clip.
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            write_wav(&dir.path().join("narration.wav"), RATE, 1, 1_000, NARRATION);
            write_wav(&dir.path().join("short.wav"), RATE, 1, 200, EFFECT);
            let mixer = Mixer::new(MixerConfig {
                output_dir: dir.path().to_path_buf(),
                ..Default::default()
            });
            Self { dir, mixer }
        }

        fn path(&self, name: &str) -> PathBuf {
            self.dir.path().join(name)
        }

        fn run(&self, cues: Vec<TimelineCue>) -> Result<MixReport> {
            TimelineDescriptor::new("narration.wav", cues)
                .save(self.path("timeline.json"))
                .unwrap();
            self.mixer.mix_file("timeline.json", "out.wav")
        }
    }

    #[test]
    fn empty_cue_list_reproduces_narration() {
        let fixture = Fixture::new();
        let report = fixture.run(Vec::new()).unwrap();

        assert_eq!(report.cues_mixed(), 0);
        assert_eq!(
            read_output(&fixture.path("out.wav")),
            read_output(&fixture.path("narration.wav"))
        );
    }

    #[test]
    fn overlay_inside_narration_keeps_length() {
        let fixture = Fixture::new();
        let report = fixture.run(vec![cue("short.wav", 0.2)]).unwrap();

        let samples = read_output(&fixture.path("out.wav"));
        assert_eq!(samples.len(), 1_000);
        assert_eq!(samples[199], NARRATION);
        assert_eq!(samples[200], NARRATION + EFFECT);
        assert_eq!(samples[399], NARRATION + EFFECT);
        assert_eq!(samples[400], NARRATION);
        assert_eq!(report.count(Placement::Overlaid), 1);
    }

    #[test]
    fn overlay_running_past_end_extends_to_clip_end() {
        let fixture = Fixture::new();
        fixture.run(vec![cue("short.wav", 0.9)]).unwrap();

        let samples = read_output(&fixture.path("out.wav"));
        assert_eq!(samples.len(), 1_100);
        assert_eq!(samples[950], NARRATION + EFFECT);
        assert_eq!(samples[1_050], EFFECT);
    }

    #[test]
    fn gap_fill_pads_with_silence_then_appends() {
        let fixture = Fixture::new();
        let report = fixture.run(vec![cue("short.wav", 1.5)]).unwrap();

        let samples = read_output(&fixture.path("out.wav"));
        assert_eq!(samples.len(), 1_000 + 500 + 200);
        assert!(samples[1_000..1_500].iter().all(|sample| *sample == 0));
        assert!(samples[1_500..].iter().all(|sample| *sample == EFFECT));
        assert_eq!(report.count(Placement::Appended), 1);
        assert!((report.duration_seconds - 1.7).abs() < 1.0 / RATE as f64);
    }

    #[test]
    fn cue_exactly_at_end_is_appended() {
        let fixture = Fixture::new();
        let report = fixture.run(vec![cue("short.wav", 1.0)]).unwrap();

        assert_eq!(report.applied[0].placement, Placement::Appended);
        assert_eq!(read_output(&fixture.path("out.wav")).len(), 1_200);
    }

    #[test]
    fn branch_follows_live_track_length() {
        let fixture = Fixture::new();
        write_wav(&fixture.path("long.wav"), RATE, 1, 500, EFFECT);

        // The first cue grows the track to 1.7 s, so the earlier-timed second
        // cue now lands inside it.
        let report = fixture
            .run(vec![cue("short.wav", 1.5), cue("long.wav", 1.2)])
            .unwrap();

        let placements: Vec<Placement> = report.applied.iter().map(|c| c.placement).collect();
        assert_eq!(placements, vec![Placement::Appended, Placement::Overlaid]);
        let samples = read_output(&fixture.path("out.wav"));
        assert_eq!(samples.len(), 1_700);
        assert_eq!(samples[1_550], EFFECT + EFFECT);
    }

    #[test]
    fn missing_cue_is_skipped_with_warning() {
        let fixture = Fixture::new();
        let report = fixture
            .run(vec![
                cue("short.wav", 0.1),
                cue("gone.wav", 0.3),
                cue("short.wav", 0.6),
            ])
            .unwrap();

        assert_eq!(report.cues_total, 3);
        assert_eq!(report.cues_mixed(), 2);
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.warnings[0].index, 1);
        assert_eq!(report.warnings[0].path, fixture.path("gone.wav"));

        let samples = read_output(&fixture.path("out.wav"));
        assert_eq!(samples[150], NARRATION + EFFECT);
        assert_eq!(samples[350], NARRATION);
        assert_eq!(samples[650], NARRATION + EFFECT);
    }

    #[test]
    fn gain_is_applied_in_decibels() {
        let fixture = Fixture::new();
        let mut loud = cue("short.wav", 0.0);
        loud.gain_db = 20.0 * 2f64.log10();
        fixture.run(vec![loud]).unwrap();

        let samples = read_output(&fixture.path("out.wav"));
        assert!((samples[10] - (NARRATION + 2 * EFFECT)).abs() <= 1);
    }

    #[test]
    fn clips_are_conformed_to_narration_layout() {
        let fixture = Fixture::new();
        write_wav(&fixture.path("stereo.wav"), RATE * 2, 2, 400, EFFECT);

        fixture.run(vec![cue("stereo.wav", 1.0)]).unwrap();

        let reader = hound::WavReader::open(fixture.path("out.wav")).unwrap();
        assert_eq!(reader.spec().channels, 1);
        assert_eq!(reader.spec().sample_rate, RATE);
        assert_eq!(reader.len(), 1_200);
    }

    #[test]
    fn mono_clip_lands_in_both_channels_of_stereo_narration() {
        let fixture = Fixture::new();
        write_wav(&fixture.path("narration.wav"), RATE, 2, 1_000, NARRATION);

        fixture.run(vec![cue("short.wav", 0.2)]).unwrap();

        let reader = hound::WavReader::open(fixture.path("out.wav")).unwrap();
        assert_eq!(reader.spec().channels, 2);
        let samples = read_output(&fixture.path("out.wav"));
        assert_eq!(samples.len(), 2_000);
        // Frame 199 is untouched, frames 200..400 carry the effect on both sides.
        assert_eq!(&samples[398..400], &[NARRATION, NARRATION]);
        assert_eq!(&samples[400..402], &[NARRATION + EFFECT, NARRATION + EFFECT]);
        assert_eq!(&samples[798..800], &[NARRATION + EFFECT, NARRATION + EFFECT]);
        assert_eq!(&samples[800..802], &[NARRATION, NARRATION]);
    }

    #[test]
    fn far_future_cue_is_rejected_at_load() {
        let fixture = Fixture::new();

        let err = fixture.run(vec![cue("short.wav", 1e300)]).unwrap_err();
        assert!(matches!(err, StoryMixError::MalformedTimeline { .. }));
        assert!(!fixture.path("out.wav").exists());
    }

    #[test]
    fn configured_offset_limit_is_enforced() {
        let dir = tempfile::tempdir().unwrap();
        write_wav(&dir.path().join("narration.wav"), RATE, 1, 1_000, NARRATION);
        write_wav(&dir.path().join("short.wav"), RATE, 1, 200, EFFECT);
        let mixer = Mixer::new(MixerConfig {
            output_dir: dir.path().to_path_buf(),
            max_offset_seconds: 2.0,
            ..Default::default()
        });
        TimelineDescriptor::new("narration.wav", vec![cue("short.wav", 2.5)])
            .save(dir.path().join("timeline.json"))
            .unwrap();

        let err = mixer.mix_file("timeline.json", "out.wav").unwrap_err();
        assert!(matches!(err, StoryMixError::MalformedTimeline { .. }));
    }

    #[test]
    fn unvalidated_far_offset_is_an_error() {
        let fixture = Fixture::new();
        let timeline = TimelineDescriptor::new("narration.wav", vec![cue("short.wav", 1e300)]);

        let err = fixture.mixer.mix(&timeline).unwrap_err();
        assert!(matches!(err, StoryMixError::OffsetOutOfRange(_)));
    }

    #[test]
    fn unreadable_narration_is_fatal() {
        let fixture = Fixture::new();
        std::fs::remove_file(fixture.path("narration.wav")).unwrap();

        let err = fixture.run(vec![cue("short.wav", 0.1)]).unwrap_err();
        assert!(matches!(err, StoryMixError::NarrationUnreadable { .. }));
        assert!(err.to_string().contains("narration.wav"));
        assert!(!fixture.path("out.wav").exists());
    }

    #[test]
    fn malformed_timeline_aborts_before_mixing() {
        let fixture = Fixture::new();
        std::fs::write(fixture.path("timeline.json"), r#"{"cues": []}"#).unwrap();

        let err = fixture.mixer.mix_file("timeline.json", "out.wav").unwrap_err();
        assert!(matches!(err, StoryMixError::MalformedTimeline { .. }));
        assert!(!fixture.path("out.wav").exists());
    }

    #[test]
    fn apply_cue_on_empty_track_appends() {
        let mut track = AudioTrack::silent(RATE, 1, 0).unwrap();
        let clip = AudioTrack::new(RATE, 1, vec![0.5; 10]).unwrap();

        assert_eq!(apply_cue(&mut track, &clip, 0.0).unwrap(), Placement::Appended);
        assert_eq!(track.frames(), 10);
    }
}
