// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Cross-cutting concerns used by more than one layer:
//
//   checkpoint.rs — safetensors weight files, the latest-epoch
//                   pointer and the JSON training config, so
//                   `eval` can rebuild and reload the model.
//
//   metrics.rs    — appends per-epoch losses and scoring
//                   results to CSV files in the run directory.
//
// Reference: Rust Book §7 (Modules)
//            Rust Book §9 (Error Handling with anyhow)

/// Model checkpoint saving and loading
pub mod checkpoint;

/// Training / scoring CSV logger
pub mod metrics;
