// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Saves and restores named parameter mappings (StateDict) as
// safetensors files, plus the JSON config needed to rebuild
// the same architecture.
//
// What gets saved:
//   1. Model weights (.safetensors) — name → f32 tensor + shape
//   2. latest_epoch.json             — which epoch was last saved
//   3. train_config.json             — architecture + schedule
//
// File naming convention:
//   {save_path}/
//     model/
//       model_0001.safetensors   ← weights after epoch 1
//       model_0002.safetensors
//       ...
//     latest_epoch.json
//     train_config.json
//
// The safetensors container carries no version field. Names
// and shapes are checked against the live model when the file
// is applied (see ml::state_dict), not here.
//
// Reference: safetensors crate documentation
//            Rust Book §9 (Error Handling)

use anyhow::{anyhow, Context, Result};
use safetensors::{tensor::TensorView, Dtype, SafeTensors};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::application::train_use_case::TrainConfig;
use crate::ml::state_dict::{ParamTensor, StateDict};

/// Write a StateDict to `path` as a safetensors file.
pub fn write_state_dict(path: &Path, dict: &StateDict) -> Result<()> {
    let views = dict
        .iter()
        .map(|(name, t)| {
            let view = TensorView::new(Dtype::F32, t.shape.clone(), bytemuck::cast_slice(&t.values))
                .map_err(|e| anyhow!("Invalid tensor '{name}': {e:?}"))?;
            Ok((name.as_str(), view))
        })
        .collect::<Result<Vec<_>>>()?;

    let bytes = safetensors::serialize(views, &None)
        .map_err(|e| anyhow!("Cannot serialise checkpoint '{}': {e:?}", path.display()))?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, bytes)
        .with_context(|| format!("Failed to save checkpoint to '{}'", path.display()))?;

    tracing::debug!(
        "Wrote {} tensors ({} values) to '{}'",
        dict.len(),
        dict.numel(),
        path.display()
    );
    Ok(())
}

/// Read a safetensors file into a StateDict.
///
/// F32 and F64 tensors are accepted (F64 is narrowed); entries of any
/// other dtype are skipped with a warning.
pub fn read_state_dict(path: &Path) -> Result<StateDict> {
    let bytes = fs::read(path)
        .with_context(|| format!("Cannot read checkpoint '{}'", path.display()))?;
    let file = SafeTensors::deserialize(&bytes)
        .map_err(|e| anyhow!("Cannot decode checkpoint '{}': {e:?}", path.display()))?;

    let mut dict = StateDict::new();
    for (name, view) in file.tensors() {
        let values: Vec<f32> = match view.dtype() {
            Dtype::F32 => bytemuck::pod_collect_to_vec::<u8, f32>(view.data()),
            Dtype::F64 => bytemuck::pod_collect_to_vec::<u8, f64>(view.data())
                .into_iter()
                .map(|v| v as f32)
                .collect(),
            other => {
                tracing::warn!("Skipping '{}': unsupported dtype {:?}", name, other);
                continue;
            }
        };
        dict.insert(name, ParamTensor::new(view.shape().to_vec(), values));
    }
    Ok(dict)
}

/// Manages the checkpoint directory of one training run.
pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    /// Creates the directory (and its model/ subdirectory) if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(dir.join("model"))
            .with_context(|| format!("Cannot create checkpoint dir '{}'", dir.display()))?;
        Ok(Self { dir })
    }

    /// {dir}/model/model_{epoch:04}.safetensors
    pub fn model_path(&self, epoch: usize) -> PathBuf {
        self.dir.join("model").join(format!("model_{epoch:04}.safetensors"))
    }

    /// Point latest_epoch.json at `epoch`, whose weights must
    /// already be at `model_path(epoch)`.
    pub fn mark_latest(&self, epoch: usize) -> Result<()> {
        let latest_path = self.dir.join("latest_epoch.json");
        fs::write(&latest_path, serde_json::to_string(&epoch)?)
            .with_context(|| "Failed to write latest_epoch.json")?;

        tracing::debug!("Latest checkpoint: epoch {}", epoch);
        Ok(())
    }

    /// Path of the most recently saved epoch.
    pub fn latest_model_path(&self) -> Result<PathBuf> {
        Ok(self.model_path(self.latest_epoch()?))
    }

    /// Save the training configuration to JSON so `eval` can rebuild
    /// the same architecture.
    pub fn save_config(&self, cfg: &TrainConfig) -> Result<()> {
        let path = self.dir.join("train_config.json");
        let json = serde_json::to_string_pretty(cfg)?;
        fs::write(&path, json)
            .with_context(|| format!("Cannot write config to '{}'", path.display()))?;
        tracing::debug!("Saved training config to '{}'", path.display());
        Ok(())
    }

    pub fn load_config(&self) -> Result<TrainConfig> {
        let path = self.dir.join("train_config.json");
        let json = fs::read_to_string(&path).with_context(|| {
            format!(
                "Cannot read config from '{}'. \
                 Make sure you have run 'train' before 'eval'.",
                path.display()
            )
        })?;
        Ok(serde_json::from_str(&json)?)
    }

    /// Epoch of the newest checkpoint, if this run has saved one.
    pub fn saved_epoch(&self) -> Option<usize> {
        self.latest_epoch().ok().filter(|&e| self.model_path(e).exists())
    }

    fn latest_epoch(&self) -> Result<usize> {
        let path = self.dir.join("latest_epoch.json");
        let s = fs::read_to_string(&path)
            .with_context(|| "Cannot find 'latest_epoch.json'. Have you run 'train' first?")?;
        Ok(serde_json::from_str::<usize>(&s)?)
    }
}
