// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// Everything that touches learnable parameters lives here.
// The data layer only builds tensors; the application layer
// only calls the trainer's five operations.
//
// What's in this layer:
//
//   model.rs       — SpeakerNet: dilated TDNN stack over raw
//                    waveform frames, statistics pooling and a
//                    sigmoid head producing P(label = 1)
//
//   state_dict.rs  — named (shape, values) parameter maps and
//                    the tolerant checkpoint matching rules
//
//   scheduler.rs   — step decay of the learning rate
//
//   trainer.rs     — ClassifierTrainer: train / validate /
//                    score / save / load around one model
//
// Reference: Burn Book §3 (Building Blocks)
//            Burn Book §5 (Training)
//            Snyder et al. (2018) X-vectors

/// TDNN binary classifier architecture
pub mod model;

/// Step-decay learning-rate schedule
pub mod scheduler;

/// Named parameter maps and checkpoint matching
pub mod state_dict;

/// Model lifecycle: training, validation, scoring, persistence
pub mod trainer;
