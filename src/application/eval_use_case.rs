// ============================================================
// Layer 2 — Eval Use Case
// ============================================================
//   1. Rebuild the network from the run's train_config.json
//   2. Load a checkpoint (explicit path, or the latest epoch)
//   3. Score every recording in the manifest

use anyhow::Result;
use burn::prelude::Backend;
use std::path::{Path, PathBuf};

use crate::data::audio::WavAudioSource;
use crate::domain::scores::BinaryScores;
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::trainer::{build_trainer, InferBackend, TrainBackend};

pub struct EvalUseCase {
    save_path:  String,
    checkpoint: Option<String>,
    eval_list:  String,
    eval_path:  Option<String>,
}

impl EvalUseCase {
    pub fn new(
        save_path:  String,
        checkpoint: Option<String>,
        eval_list:  String,
        eval_path:  Option<String>,
    ) -> Self {
        Self { save_path, checkpoint, eval_list, eval_path }
    }

    pub fn execute(&self) -> Result<BinaryScores> {
        let ckpt = CheckpointManager::new(&self.save_path)?;
        let mut cfg = ckpt.load_config()?;
        cfg.check()?;
        if let Some(path) = &self.eval_path {
            cfg.eval_path = Some(path.clone());
        }

        let weights: PathBuf = match &self.checkpoint {
            Some(path) => PathBuf::from(path),
            None => ckpt.latest_model_path()?,
        };

        let device      = <InferBackend as Backend>::Device::default();
        let mut trainer = build_trainer::<TrainBackend>(&cfg, device);
        let report      = trainer.load_parameters(&weights)?;
        if report.applied() == 0 {
            tracing::warn!("No parameters from '{}' matched the model", weights.display());
        }

        trainer.test_network(
            Path::new(&self.eval_list),
            Path::new(cfg.eval_audio_dir()),
            &WavAudioSource,
        )
    }
}
