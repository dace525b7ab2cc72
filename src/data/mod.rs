// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything from .wav files on disk to tensor batches.
//
//   manifest entries
//       │
//       ▼
//   WavAudioSource    → decodes each {stem}_AUDIO.wav
//       │
//       ▼
//   AudioDataset      → implements Burn's Dataset trait
//       │
//       ▼
//   AudioBatcher      → crops / pads clips, stacks tensors
//       │
//       ▼
//   DataLoader        → feeds batches to the epoch trainer
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

/// Decodes .wav files using hound
pub mod audio;

/// Implements Burn's Dataset trait for labelled clips
pub mod dataset;

/// Implements Burn's Batcher trait to create tensor batches
pub mod batcher;

/// Seeded, stratified train/validation split
pub mod splitter;
