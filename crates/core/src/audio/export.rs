use std::path::{Path, PathBuf};

use super::AudioTrack;
use crate::Result;

/// Writes `track` as a 16-bit PCM WAV file at the track's own sample rate
/// and channel count.
///
/// The data goes to a sibling `.part` file first and is renamed into place
/// once complete, so a failed export never leaves a truncated file at `path`.
pub fn write_wav(track: &AudioTrack, path: &Path) -> Result<PathBuf> {
    let partial = partial_path(path);
    if let Err(err) = write_samples(track, &partial) {
        let _ = std::fs::remove_file(&partial);
        return Err(err);
    }
    std::fs::rename(&partial, path)?;
    Ok(path.to_path_buf())
}

fn write_samples(track: &AudioTrack, path: &Path) -> Result<()> {
    let spec = hound::WavSpec {
        channels: track.channels(),
        sample_rate: track.sample_rate(),
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec)?;
    for sample in track.samples() {
        writer.write_sample(to_i16(*sample))?;
    }
    writer.finalize()?;
    Ok(())
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    path.with_file_name(name)
}

fn to_i16(sample: f32) -> i16 {
    (sample * 32_768.0).round().clamp(i16::MIN as f32, i16::MAX as f32) as i16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_track_layout_and_saturates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.wav");
        let track = AudioTrack::new(22_050, 2, vec![0.5, -0.5, 1.0, -1.0]).unwrap();

        write_wav(&track, &path).unwrap();

        let mut reader = hound::WavReader::open(&path).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.sample_rate, 22_050);
        assert_eq!(spec.channels, 2);
        assert_eq!(spec.bits_per_sample, 16);
        let samples: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(samples, vec![16_384, -16_384, i16::MAX, i16::MIN]);
        assert!(!dir.path().join("out.wav.part").exists());
    }

    #[test]
    fn failed_export_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("out.wav");
        let track = AudioTrack::silent(8_000, 1, 4).unwrap();

        assert!(write_wav(&track, &path).is_err());
        assert!(!path.exists());
    }
}
