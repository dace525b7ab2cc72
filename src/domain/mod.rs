// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust structs and traits describing what the system
// works with. No Burn types, no tensors in here.
//
//   manifest.rs — labelled recordings parsed from a list file
//   scores.rs   — thresholding plus accuracy / precision / F1
//   traits.rs   — AudioSource, implemented by the data layer
//
// Reference: Rust Book §5 (Structs), §10 (Traits)

// Labelled recording list
pub mod manifest;

// Binary classification metrics
pub mod scores;

// Core abstractions (traits) that other layers implement
pub mod traits;
