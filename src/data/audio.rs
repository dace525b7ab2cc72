// ============================================================
// Layer 4 — WAV Audio Source
// ============================================================
// Decodes .wav recordings with the hound crate.
//
// Output is always mono f32 in [-1, 1]:
//   - integer PCM is divided by 2^(bits-1)
//   - float PCM is passed through unchanged
//   - multi-channel audio is averaged down to one channel
//
// fit_length() is shared by the batcher and the scorer to
// give the model inputs of a usable length.
//
// Reference: hound crate documentation

use anyhow::{Context, Result};
use hound::{SampleFormat, WavReader};
use std::path::Path;

use crate::domain::traits::AudioSource;

/// Reads .wav files from disk.
#[derive(Debug, Clone, Copy, Default)]
pub struct WavAudioSource;

impl AudioSource for WavAudioSource {
    fn read(&self, path: &Path) -> Result<(Vec<f32>, u32)> {
        let mut reader = WavReader::open(path)
            .with_context(|| format!("Cannot open audio file '{}'", path.display()))?;
        let spec = reader.spec();

        let interleaved: Vec<f32> = match spec.sample_format {
            SampleFormat::Float => reader
                .samples::<f32>()
                .collect::<Result<_, _>>()
                .with_context(|| format!("Corrupt float samples in '{}'", path.display()))?,
            SampleFormat::Int => {
                let scale = (1i64 << (spec.bits_per_sample.max(1) - 1)) as f32;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|v| v as f32 / scale))
                    .collect::<Result<_, _>>()
                    .with_context(|| format!("Corrupt PCM samples in '{}'", path.display()))?
            }
        };

        let samples = downmix(&interleaved, spec.channels as usize);
        tracing::debug!(
            "Decoded '{}': {} samples @ {} Hz ({} ch)",
            path.display(),
            samples.len(),
            spec.sample_rate,
            spec.channels,
        );
        Ok((samples, spec.sample_rate))
    }
}

/// Average interleaved frames into a single channel.
fn downmix(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect()
}

/// Return exactly `target` samples.
///
/// Long clips are cropped starting at `start` (clamped so the window
/// stays inside the clip). Short clips are repeated end-to-end until
/// they fill the window; an empty clip becomes silence.
pub fn fit_length(samples: &[f32], target: usize, start: usize) -> Vec<f32> {
    if samples.is_empty() {
        return vec![0.0; target];
    }
    if samples.len() >= target {
        let start = start.min(samples.len() - target);
        return samples[start..start + target].to_vec();
    }
    samples.iter().copied().cycle().take(target).collect()
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use hound::{WavSpec, WavWriter};

    #[test]
    fn test_fit_length_crops() {
        let clip: Vec<f32> = (0..10).map(|v| v as f32).collect();
        assert_eq!(fit_length(&clip, 4, 0), vec![0.0, 1.0, 2.0, 3.0]);
        assert_eq!(fit_length(&clip, 4, 3), vec![3.0, 4.0, 5.0, 6.0]);
        // Start past the end is clamped to the last full window
        assert_eq!(fit_length(&clip, 4, 100), vec![6.0, 7.0, 8.0, 9.0]);
    }

    #[test]
    fn test_fit_length_wraps_short_clips() {
        assert_eq!(fit_length(&[1.0, 2.0], 5, 0), vec![1.0, 2.0, 1.0, 2.0, 1.0]);
        assert_eq!(fit_length(&[], 3, 0), vec![0.0; 3]);
    }

    #[test]
    fn test_downmix_stereo() {
        let mono = downmix(&[1.0, 0.0, 0.5, 0.5], 2);
        assert_eq!(mono, vec![0.5, 0.5]);
    }

    #[test]
    fn test_read_16bit_wav() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("301_AUDIO.wav");
        let spec = WavSpec {
            channels:        1,
            sample_rate:     16_000,
            bits_per_sample: 16,
            sample_format:   SampleFormat::Int,
        };
        let mut writer = WavWriter::create(&path, spec).unwrap();
        for s in [0i16, 16384, -16384, i16::MIN] {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();

        let (samples, rate) = WavAudioSource.read(&path).unwrap();
        assert_eq!(rate, 16_000);
        assert_eq!(samples, vec![0.0, 0.5, -0.5, -1.0]);
    }

    #[test]
    fn test_missing_wav_is_an_error() {
        assert!(WavAudioSource.read(Path::new("/nope/missing_AUDIO.wav")).is_err());
    }
}
