// ============================================================
// Layer 5 — Step Learning-Rate Decay
// ============================================================
// Multiplies the learning rate by `gamma` once every
// `step_size` epochs:
//
//   lr(epoch) = base_lr · gamma ^ ((epoch - 1) / step_size)
//
// Epochs are 1-based, so epochs 1..=step_size run at base_lr.
// The value is computed from the epoch number rather than by
// counting calls, so resuming at epoch N gives the same rate
// an uninterrupted run would have used.

use burn::LearningRate;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepDecay {
    base_lr:   LearningRate,
    gamma:     f64,
    step_size: usize,
}

impl StepDecay {
    /// `step_size` of 0 is treated as 1.
    pub fn new(base_lr: LearningRate, gamma: f64, step_size: usize) -> Self {
        Self { base_lr, gamma, step_size: step_size.max(1) }
    }

    pub fn lr_at(&self, epoch: usize) -> LearningRate {
        let decays = epoch.saturating_sub(1) / self.step_size;
        self.base_lr * self.gamma.powi(decays as i32)
    }
}
