// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The scorer and the dataset builder both need audio, but
// neither should care how it is decoded. They program
// against AudioSource; the data layer provides the WAV
// implementation and tests can provide an in-memory one.
//
// Reference: Rust Book §10 (Traits: Defining Shared Behaviour)

use anyhow::Result;
use std::path::Path;

// ─── AudioSource ──────────────────────────────────────────────────────────────
/// Anything that can turn a path into mono samples.
///
/// Implementations:
///   - WavAudioSource → decodes .wav files with hound
pub trait AudioSource {
    /// Return (samples in [-1, 1], sample rate in Hz).
    fn read(&self, path: &Path) -> Result<(Vec<f32>, u32)>;
}
