use anyhow::Result;
use burn::data::dataset::Dataset;
use std::path::Path;

use crate::domain::{manifest::ManifestEntry, traits::AudioSource};

/// One decoded recording and its label.
#[derive(Debug, Clone)]
pub struct AudioClip {
    pub samples: Vec<f32>,
    pub label:   u8,
}

impl AudioClip {
    pub fn new(samples: Vec<f32>, label: u8) -> Self { Self { samples, label } }

    pub fn duration_secs(&self, sample_rate: u32) -> f64 {
        self.samples.len() as f64 / sample_rate.max(1) as f64
    }
}

/// In-memory clips, decoded once up front so a bad file fails the run
/// before the first epoch instead of inside a loader worker.
pub struct AudioDataset {
    clips: Vec<AudioClip>,
}

impl AudioDataset {
    pub fn new(clips: Vec<AudioClip>) -> Self { Self { clips } }

    pub fn load(
        entries:     &[ManifestEntry],
        audio_dir:   &Path,
        source:      &dyn AudioSource,
        sample_rate: u32,
    ) -> Result<Self> {
        let mut clips = Vec::with_capacity(entries.len());
        for entry in entries {
            let path = entry.audio_path(audio_dir);
            let (samples, rate) = source.read(&path)?;
            if rate != sample_rate {
                tracing::warn!(
                    "'{}' is {} Hz, model expects {} Hz",
                    path.display(), rate, sample_rate
                );
            }
            clips.push(AudioClip::new(samples, entry.label));
        }
        Ok(Self::new(clips))
    }

    /// Total audio duration in seconds
    pub fn total_secs(&self, sample_rate: u32) -> f64 {
        self.clips.iter().map(|c| c.duration_secs(sample_rate)).sum()
    }

    pub fn positives(&self) -> usize {
        self.clips.iter().filter(|c| c.label == 1).count()
    }
}

impl Dataset<AudioClip> for AudioDataset {
    fn get(&self, index: usize) -> Option<AudioClip> {
        self.clips.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.clips.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::path::PathBuf;

    struct FakeSource(HashMap<PathBuf, Vec<f32>>);

    impl AudioSource for FakeSource {
        fn read(&self, path: &Path) -> Result<(Vec<f32>, u32)> {
            self.0
                .get(path)
                .cloned()
                .map(|s| (s, 16_000))
                .ok_or_else(|| anyhow::anyhow!("no such clip: {}", path.display()))
        }
    }

    #[test]
    fn test_load_follows_manifest_order() {
        let dir = Path::new("/audio");
        let source = FakeSource(HashMap::from([
            (dir.join("1_AUDIO.wav"), vec![0.1; 4]),
            (dir.join("2_AUDIO.wav"), vec![0.2; 8]),
        ]));
        let entries = vec![ManifestEntry::new("2", 1), ManifestEntry::new("1", 0)];

        let ds = AudioDataset::load(&entries, dir, &source, 16_000).unwrap();
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.positives(), 1);
        assert_eq!(ds.get(0).unwrap().samples.len(), 8);
        assert_eq!(ds.get(1).unwrap().label, 0);
        assert!(ds.get(2).is_none());
    }

    #[test]
    fn test_load_propagates_missing_audio() {
        let source  = FakeSource(HashMap::new());
        let entries = vec![ManifestEntry::new("9", 1)];
        assert!(AudioDataset::load(&entries, Path::new("/audio"), &source, 16_000).is_err());
    }

    #[test]
    fn test_duration() {
        let clip = AudioClip::new(vec![0.0; 8000], 0);
        assert!((clip.duration_secs(16_000) - 0.5).abs() < 1e-9);
    }
}
