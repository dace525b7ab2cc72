// ============================================================
// Layer 5 — Named Parameter Mapping
// ============================================================
// A StateDict is a flat, ordered map from parameter name to
// (shape, f32 values). It is what gets written to and read
// from checkpoint files.
//
// Loading a checkpoint into a live model is a two-phase
// lookup per saved entry:
//
//   1. exact name                         "model.fc.weight"
//   2. name with "module." removed        "module.model.fc.weight"
//                                            → "model.fc.weight"
//
// and then a shape check. Every entry ends up as exactly one
// of Applied / ShapeMismatch / NotFound. Only Applied entries
// are copied; the rest are logged and skipped, never fatal.

use anyhow::{anyhow, Result};
use burn::{module::Param, prelude::*};
use std::collections::BTreeMap;

/// Prefix added by data-parallel wrappers around a model
pub const PARALLEL_PREFIX: &str = "module.";

/// One parameter: row-major f32 values plus their shape.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamTensor {
    pub shape:  Vec<usize>,
    pub values: Vec<f32>,
}

impl ParamTensor {
    pub fn new(shape: Vec<usize>, values: Vec<f32>) -> Self {
        Self { shape, values }
    }

    pub fn numel(&self) -> usize {
        self.shape.iter().product()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateDict {
    entries: BTreeMap<String, ParamTensor>,
}

impl StateDict {
    pub fn new() -> Self { Self::default() }

    pub fn insert(&mut self, name: impl Into<String>, tensor: ParamTensor) {
        self.entries.insert(name.into(), tensor);
    }

    pub fn get(&self, name: &str) -> Option<&ParamTensor> { self.entries.get(name) }

    pub fn contains(&self, name: &str) -> bool { self.entries.contains_key(name) }

    pub fn len(&self) -> usize { self.entries.len() }

    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParamTensor)> {
        self.entries.iter()
    }

    /// Total number of scalar parameters.
    pub fn numel(&self) -> usize {
        self.entries.values().map(ParamTensor::numel).sum()
    }

    /// Every name gets `prefix` in front of it.
    pub fn with_prefix(self, prefix: &str) -> Self {
        let entries = self
            .entries
            .into_iter()
            .map(|(name, t)| (format!("{prefix}{name}"), t))
            .collect();
        Self { entries }
    }

    /// Keep only names starting with `prefix`, with the prefix removed.
    pub fn strip_prefix(self, prefix: &str) -> Self {
        let entries = self
            .entries
            .into_iter()
            .filter_map(|(name, t)| name.strip_prefix(prefix).map(|n| (n.to_string(), t)))
            .collect();
        Self { entries }
    }
}

// ─── Checkpoint matching ──────────────────────────────────────────────────────

/// What happened to one saved entry.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamLoad {
    /// Copied into the live parameter `target`
    Applied { target: String },
    /// Name resolved to `target` but the shapes differ
    ShapeMismatch { target: String, model: Vec<usize>, loaded: Vec<usize> },
    /// No live parameter with this name, with or without the prefix
    NotFound,
}

/// Per-entry outcome of applying a checkpoint.
#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    /// (saved name, outcome), in checkpoint order
    pub outcomes: Vec<(String, ParamLoad)>,
}

impl LoadReport {
    pub fn applied(&self) -> usize {
        self.count(|o| matches!(o, ParamLoad::Applied { .. }))
    }

    pub fn mismatched(&self) -> usize {
        self.count(|o| matches!(o, ParamLoad::ShapeMismatch { .. }))
    }

    pub fn missing(&self) -> usize {
        self.count(|o| matches!(o, ParamLoad::NotFound))
    }

    fn count(&self, pred: impl Fn(&ParamLoad) -> bool) -> usize {
        self.outcomes.iter().filter(|(_, o)| pred(o)).count()
    }
}

/// Resolve every saved entry against the live parameters.
///
/// Returns the report plus a StateDict keyed by *live* names holding
/// only the entries that may be copied.
pub fn match_checkpoint(live: &StateDict, saved: &StateDict) -> (LoadReport, StateDict) {
    let mut report  = LoadReport::default();
    let mut applied = StateDict::new();

    for (name, tensor) in saved.iter() {
        let target = if live.contains(name) {
            Some(name.clone())
        } else {
            let stripped = name.replace(PARALLEL_PREFIX, "");
            live.contains(&stripped).then_some(stripped)
        };

        let outcome = match target {
            None => ParamLoad::NotFound,
            Some(target) => {
                // contains() above guarantees the lookup succeeds
                let model_shape = live.get(&target).map(|t| t.shape.clone()).unwrap_or_default();
                if model_shape != tensor.shape {
                    ParamLoad::ShapeMismatch {
                        target,
                        model:  model_shape,
                        loaded: tensor.shape.clone(),
                    }
                } else {
                    applied.insert(target.clone(), tensor.clone());
                    ParamLoad::Applied { target }
                }
            }
        };

        match &outcome {
            ParamLoad::NotFound => tracing::warn!("{} is not in the model.", name),
            ParamLoad::ShapeMismatch { model, loaded, .. } => tracing::warn!(
                "Wrong parameter length: {}, model: {:?}, loaded: {:?}",
                name, model, loaded
            ),
            ParamLoad::Applied { .. } => {}
        }
        report.outcomes.push((name.clone(), outcome));
    }

    (report, applied)
}

// ─── Burn parameter bridge ────────────────────────────────────────────────────

/// Copy a live parameter into `dict` under `name`.
pub fn export_param<B: Backend, const D: usize>(
    dict:  &mut StateDict,
    name:  impl Into<String>,
    param: &Param<Tensor<B, D>>,
) -> Result<()> {
    let name = name.into();
    let data = param.val().into_data().convert::<f32>();
    let values = data
        .to_vec::<f32>()
        .map_err(|e| anyhow!("Cannot read parameter '{name}': {e:?}"))?;
    dict.insert(name, ParamTensor::new(data.shape.clone(), values));
    Ok(())
}

/// Replace a live parameter's value when `entry` is present.
///
/// The parameter keeps its id, so optimizer state stays attached, and
/// the new value is marked as requiring gradients again.
pub fn import_param<B: Backend, const D: usize>(
    param:  Param<Tensor<B, D>>,
    entry:  Option<&ParamTensor>,
    device: &B::Device,
) -> Param<Tensor<B, D>> {
    match entry {
        None => param,
        Some(entry) => {
            let data = TensorData::new(entry.values.clone(), entry.shape.clone())
                .convert::<B::FloatElem>();
            param.map(|_| Tensor::<B, D>::from_data(data, device).require_grad())
        }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn dict(items: &[(&str, Vec<usize>)]) -> StateDict {
        let mut d = StateDict::new();
        for (name, shape) in items {
            let n = shape.iter().product();
            d.insert(*name, ParamTensor::new(shape.clone(), vec![1.0; n]));
        }
        d
    }

    #[test]
    fn test_exact_name_is_applied() {
        let live  = dict(&[("model.fc.weight", vec![2, 3])]);
        let saved = dict(&[("model.fc.weight", vec![2, 3])]);
        let (report, applied) = match_checkpoint(&live, &saved);

        assert_eq!(report.applied(), 1);
        assert!(applied.contains("model.fc.weight"));
    }

    #[test]
    fn test_parallel_prefix_is_stripped() {
        let live  = dict(&[("model.fc.bias", vec![3])]);
        let saved = dict(&[("module.model.fc.bias", vec![3])]);
        let (report, applied) = match_checkpoint(&live, &saved);

        assert_eq!(
            report.outcomes[0].1,
            ParamLoad::Applied { target: "model.fc.bias".into() }
        );
        // Applied entries are keyed by the live name
        assert!(applied.contains("model.fc.bias"));
        assert!(!applied.contains("module.model.fc.bias"));
    }

    #[test]
    fn test_shape_mismatch_and_unknown_are_skipped() {
        let live  = dict(&[("model.a", vec![4]), ("model.b", vec![2, 2])]);
        let saved = dict(&[
            ("model.a", vec![5]),
            ("model.b", vec![2, 2]),
            ("classifier.w", vec![1]),
        ]);
        let (report, applied) = match_checkpoint(&live, &saved);

        assert_eq!(report.applied(), 1);
        assert_eq!(report.mismatched(), 1);
        assert_eq!(report.missing(), 1);
        assert_eq!(applied.len(), 1);
        assert!(applied.contains("model.b"));

        let a = report.outcomes.iter().find(|(n, _)| n == "model.a").unwrap();
        assert_eq!(
            a.1,
            ParamLoad::ShapeMismatch { target: "model.a".into(), model: vec![4], loaded: vec![5] }
        );
    }

    #[test]
    fn test_prefix_helpers() {
        let d = dict(&[("fc.weight", vec![1]), ("fc.bias", vec![1])]).with_prefix("model.");
        assert!(d.contains("model.fc.weight"));

        let mut mixed = d.clone();
        mixed.insert("other.x", ParamTensor::new(vec![1], vec![0.0]));
        let stripped = mixed.strip_prefix("model.");
        assert_eq!(stripped.len(), 2);
        assert!(stripped.contains("fc.bias"));
    }

    #[test]
    fn test_numel() {
        let d = dict(&[("a", vec![2, 3]), ("b", vec![4])]);
        assert_eq!(d.numel(), 10);
    }
}
