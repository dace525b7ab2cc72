// ============================================================
// Layer 4 — Train/Validation Splitter
// ============================================================
// Used when `train` is run without a separate validation
// manifest: part of the training list is held out so the
// validator still has data it never trained on.
//
// The shuffle is seeded, so the same manifest and seed give
// the same held-out recordings across resumed runs. Positive
// and negative recordings are split separately so a small,
// imbalanced list keeps roughly the same label ratio in both
// halves.
//
// Reference: rand crate documentation (SliceRandom, StdRng)

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

use crate::domain::manifest::ManifestEntry;

/// Shuffle `entries` with `seed` and split into (train, validation),
/// stratified by label.
///
/// # Arguments
/// * `entries`        - All labelled recordings (consumed)
/// * `train_fraction` - Proportion kept for training, e.g. 0.8
/// * `seed`           - Shuffle seed
pub fn split_train_val(
    entries:        Vec<ManifestEntry>,
    train_fraction: f64,
    seed:           u64,
) -> (Vec<ManifestEntry>, Vec<ManifestEntry>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let total   = entries.len();

    let (mut positives, mut negatives): (Vec<_>, Vec<_>) =
        entries.into_iter().partition(|e| e.label == 1);

    let mut train = Vec::with_capacity(total);
    let mut val   = Vec::new();

    for group in [&mut positives, &mut negatives] {
        group.shuffle(&mut rng);
        let keep = ((group.len() as f64) * train_fraction.clamp(0.0, 1.0)).round() as usize;
        let held = group.split_off(keep.min(group.len()));
        train.append(group);
        val.extend(held);
    }

    train.shuffle(&mut rng);

    tracing::debug!(
        "Manifest split: {} training, {} validation ({}% / {}%)",
        train.len(),
        val.len(),
        (train.len() * 100) / total.max(1),
        (val.len()   * 100) / total.max(1),
    );

    (train, val)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn entries(pos: usize, neg: usize) -> Vec<ManifestEntry> {
        (0..pos)
            .map(|i| ManifestEntry::new(format!("p{i}"), 1))
            .chain((0..neg).map(|i| ManifestEntry::new(format!("n{i}"), 0)))
            .collect()
    }

    #[test]
    fn test_stratified_sizes() {
        let (train, val) = split_train_val(entries(20, 80), 0.8, 7);
        assert_eq!(train.len(), 80);
        assert_eq!(val.len(), 20);
        assert_eq!(val.iter().filter(|e| e.label == 1).count(), 4);
    }

    #[test]
    fn test_nothing_lost() {
        let (train, val) = split_train_val(entries(3, 4), 0.7, 1);
        assert_eq!(train.len() + val.len(), 7);
    }

    #[test]
    fn test_same_seed_same_split() {
        let a = split_train_val(entries(10, 10), 0.5, 42);
        let b = split_train_val(entries(10, 10), 0.5, 42);
        assert_eq!(a, b);
    }

    #[test]
    fn test_empty_and_full() {
        let (train, val) = split_train_val(Vec::new(), 0.8, 0);
        assert!(train.is_empty() && val.is_empty());

        let (train, val) = split_train_val(entries(2, 3), 1.0, 0);
        assert_eq!(train.len(), 5);
        assert!(val.is_empty());
    }
}
