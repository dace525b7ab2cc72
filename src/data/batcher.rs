// ============================================================
// Layer 4 — Audio Batcher
// ============================================================
// Implements Burn's Batcher trait to turn a Vec<AudioClip>
// into one waveform tensor plus one label tensor.
//
// Recordings have different lengths, so every clip is cut
// to the same segment length first:
//   - longer clips:  a window at a random offset (training)
//                    or at offset 0 (random_crop = false)
//   - shorter clips: repeated until they fill the window
//
//   Input:  N clips of arbitrary length
//   Output: waveforms [N, segment_len], labels [N]
//
// Reference: Burn Book §4 (Batcher)

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
};
use rand::Rng;

use crate::data::{audio::fit_length, dataset::AudioClip};

// ─── AudioBatch ───────────────────────────────────────────────────────────────
/// A batch ready for SpeakerNet::forward.
#[derive(Debug, Clone)]
pub struct AudioBatch<B: Backend> {
    /// Raw mono waveforms — shape: [batch_size, segment_len]
    pub waveforms: Tensor<B, 2>,

    /// Binary labels — shape: [batch_size]
    pub labels: Tensor<B, 1, Int>,
}

// ─── AudioBatcher ─────────────────────────────────────────────────────────────
#[derive(Clone, Debug)]
pub struct AudioBatcher<B: Backend> {
    /// Device the tensors are created on
    pub device: B::Device,

    /// Samples per clip after cropping / padding
    pub segment_len: usize,

    /// Pick a random window from long clips instead of the first one
    pub random_crop: bool,
}

impl<B: Backend> AudioBatcher<B> {
    pub fn new(device: B::Device, segment_len: usize, random_crop: bool) -> Self {
        Self { device, segment_len: segment_len.max(1), random_crop }
    }
}

impl<B: Backend> Batcher<AudioClip, AudioBatch<B>> for AudioBatcher<B> {
    fn batch(&self, items: Vec<AudioClip>) -> AudioBatch<B> {
        let batch_size = items.len();
        let mut rng    = rand::thread_rng();

        // ── Flatten fixed-length windows ──────────────────────────────────────
        let mut flat: Vec<f32> = Vec::with_capacity(batch_size * self.segment_len);
        for clip in &items {
            let slack = clip.samples.len().saturating_sub(self.segment_len);
            let start = if self.random_crop && slack > 0 {
                rng.gen_range(0..=slack)
            } else {
                0
            };
            flat.extend(fit_length(&clip.samples, self.segment_len, start));
        }

        let labels: Vec<i32> = items.iter().map(|c| c.label as i32).collect();

        // ── Create tensors ────────────────────────────────────────────────────
        let waveforms = Tensor::<B, 1>::from_floats(
            flat.as_slice(), &self.device
        ).reshape([batch_size, self.segment_len]);

        let labels = Tensor::<B, 1, Int>::from_ints(
            labels.as_slice(), &self.device
        );

        AudioBatch { waveforms, labels }
    }
}
