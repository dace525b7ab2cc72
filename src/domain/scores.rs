// ============================================================
// Layer 3 — Binary Classification Scores
// ============================================================
// Turns probabilities into labels and labels into scores.
//
//   threshold:  p >= 0.5 → 1, otherwise 0
//
//   accuracy  = mean(pred == truth)
//   precision = tp / (tp + fp)
//   recall    = tp / (tp + fn)
//   f1        = 2 · precision · recall / (precision + recall)
//
// A ratio with a zero denominator is defined as 0.0, so a
// run with no predicted positives scores precision = 0 and
// F1 = 0 instead of NaN.
//
// Reference: Rust Book §13 (Iterators)


/// Probabilities at or above this value are classified as positive
pub const DECISION_THRESHOLD: f32 = 0.5;

/// Map one probability to a binary label.
pub fn threshold(prob: f32) -> u8 {
    if prob >= DECISION_THRESHOLD { 1 } else { 0 }
}

/// Confusion counts and derived metrics for one scoring run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BinaryScores {
    pub tp: usize,
    pub fp: usize,
    pub fn_: usize,
    pub tn: usize,

    pub accuracy:  f64,
    pub precision: f64,
    pub recall:    f64,
    pub f1:        f64,
}

impl BinaryScores {
    /// Compare predictions against ground truth element-wise.
    ///
    /// Both slices must have the same length; extra elements in the
    /// longer one are ignored.
    pub fn from_labels(truth: &[u8], predicted: &[u8]) -> Self {
        let (mut tp, mut fp, mut fn_, mut tn) = (0usize, 0usize, 0usize, 0usize);

        for (&t, &p) in truth.iter().zip(predicted) {
            match (t == 1, p == 1) {
                (true,  true)  => tp  += 1,
                (false, true)  => fp  += 1,
                (true,  false) => fn_ += 1,
                (false, false) => tn  += 1,
            }
        }

        let total     = tp + fp + fn_ + tn;
        let accuracy  = ratio(tp + tn, total);
        let precision = ratio(tp, tp + fp);
        let recall    = ratio(tp, tp + fn_);
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };

        Self { tp, fp, fn_, tn, accuracy, precision, recall, f1 }
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 { 0.0 } else { num as f64 / den as f64 }
}
