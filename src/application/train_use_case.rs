// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates the full training pipeline in order:
//
//   Step 1: Read the training manifest      (Layer 3 - domain)
//   Step 2: Validation list or split        (Layer 4 - data)
//   Step 3: Decode every recording          (Layer 4 - data)
//   Step 4: Save config                     (Layer 6 - infra)
//   Step 5: Build trainer, resume weights   (Layer 5 - ml)
//   Step 6: Build data loaders              (Layer 4 - data)
//   Step 7: Epoch loop                      (Layer 5 - ml)
//   Step 8: Score the eval manifest         (Layer 5 - ml)
//
// Reference: Rust Book §13 (Iterators and Closures)
//            Burn Book §5 (Training)

use anyhow::{bail, Result};
use burn::{
    data::{
        dataloader::{DataLoader, DataLoaderBuilder},
        dataset::Dataset,
    },
    prelude::Backend,
};
use serde::{Deserialize, Serialize};
use std::{path::Path, sync::Arc};

use crate::data::{
    audio::WavAudioSource,
    batcher::{AudioBatch, AudioBatcher},
    dataset::AudioDataset,
    splitter::split_train_val,
};
use crate::domain::{manifest::read_manifest, scores::BinaryScores};
use crate::infra::{
    checkpoint::CheckpointManager,
    metrics::{EpochMetrics, MetricsLogger},
};
use crate::ml::{
    model::SpeakerNetConfig,
    trainer::{build_trainer, InferBackend, TrainBackend},
};

// ─── Training Configuration ──────────────────────────────────────────────────
// All settings for a training run. Saved next to the checkpoints
// so `eval` can rebuild exactly the same network.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    /// Manifest of training recordings (header + `id score label` rows)
    pub train_list:    String,
    /// Directory holding `{id}_AUDIO.wav` for the training list
    pub train_path:    String,
    /// Validation manifest; when absent `val_fraction` of the
    /// training list is held out instead
    pub val_list:      Option<String>,
    /// Manifest scored after the last epoch
    pub eval_list:     Option<String>,
    /// Audio directory for `eval_list`, defaults to `train_path`
    pub eval_path:     Option<String>,
    /// Run directory: checkpoints, config, CSV logs
    pub save_path:     String,
    /// Checkpoint to start from when the run directory has none
    pub initial_model: Option<String>,

    pub max_epoch:     usize,
    pub batch_size:    usize,
    pub num_workers:   usize,
    /// Frames per training segment; one frame is `frame_len` samples
    pub num_frames:    usize,
    pub sample_rate:   u32,

    pub lr:            f64,
    pub lr_decay:      f64,
    /// Validate + checkpoint every N epochs, also the decay interval
    pub test_step:     usize,

    pub channels:      usize,
    pub frame_len:     usize,
    pub hidden:        usize,
    pub dropout:       f64,
    pub aug_noise_std: f64,
    pub validate_with_augmentation: bool,

    pub val_fraction:  f64,
    pub seed:          u64,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            train_list:    "data/train_list.txt".to_string(),
            train_path:    "data/audio".to_string(),
            val_list:      None,
            eval_list:     None,
            eval_path:     None,
            save_path:     "exps/exp1".to_string(),
            initial_model: None,
            max_epoch:     80,
            batch_size:    32,
            num_workers:   4,
            num_frames:    200,
            sample_rate:   16_000,
            lr:            0.001,
            lr_decay:      0.97,
            test_step:     1,
            channels:      512,
            frame_len:     160,
            hidden:        128,
            dropout:       0.1,
            aug_noise_std: 0.005,
            validate_with_augmentation: true,
            val_fraction:  0.2,
            seed:          42,
        }
    }
}

impl TrainConfig {
    pub fn model_config(&self) -> SpeakerNetConfig {
        SpeakerNetConfig::new(self.channels)
            .with_frame_len(self.frame_len)
            .with_hidden(self.hidden)
            .with_dropout(self.dropout)
            .with_aug_noise_std(self.aug_noise_std)
    }

    /// Samples per training segment
    pub fn segment_len(&self) -> usize {
        self.num_frames * self.frame_len
    }

    pub fn eval_audio_dir(&self) -> &str {
        self.eval_path.as_deref().unwrap_or(&self.train_path)
    }

    /// Reject sizes the network or the loaders cannot work with.
    /// Configs read back from JSON skip clap's range checks, so both
    /// `train` and `eval` call this.
    pub fn check(&self) -> Result<()> {
        let sizes = [
            ("batch_size", self.batch_size),
            ("num_frames", self.num_frames),
            ("frame_len",  self.frame_len),
            ("channels",   self.channels),
            ("hidden",     self.hidden),
        ];
        if let Some((name, _)) = sizes.iter().find(|(_, v)| *v == 0) {
            bail!("{name} must be at least 1");
        }
        if !(0.0..1.0).contains(&self.val_fraction) {
            bail!("val_fraction must be in [0, 1), got {}", self.val_fraction);
        }
        Ok(())
    }
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    /// Run the whole pipeline. Returns the final scores when an
    /// eval manifest is configured.
    pub fn execute(&self) -> Result<Option<BinaryScores>> {
        let cfg    = &self.config;
        cfg.check()?;
        let source = WavAudioSource;
        let audio_dir = Path::new(&cfg.train_path);

        // ── Step 1: Read the training manifest ────────────────────────────────
        let entries = read_manifest(Path::new(&cfg.train_list))?;
        tracing::info!("Read {} entries from '{}'", entries.len(), cfg.train_list);

        // ── Step 2: Validation list, or hold out part of the training list ────
        let (train_entries, val_entries) = match &cfg.val_list {
            Some(val_list) => (entries, read_manifest(Path::new(val_list))?),
            None => split_train_val(entries, 1.0 - cfg.val_fraction, cfg.seed),
        };
        tracing::info!(
            "Split: {} train, {} validation",
            train_entries.len(),
            val_entries.len()
        );

        // ── Step 3: Decode all audio up front ─────────────────────────────────
        let train_dataset = AudioDataset::load(&train_entries, audio_dir, &source, cfg.sample_rate)?;
        let val_dataset   = AudioDataset::load(&val_entries, audio_dir, &source, cfg.sample_rate)?;
        tracing::info!(
            "Training audio: {:.2} h, {} positive of {}",
            train_dataset.total_secs(cfg.sample_rate) / 3600.0,
            train_dataset.positives(),
            train_dataset.len()
        );

        // ── Step 4: Save config for eval ──────────────────────────────────────
        let ckpt    = CheckpointManager::new(&cfg.save_path)?;
        let metrics = MetricsLogger::new(&cfg.save_path)?;
        ckpt.save_config(cfg)?;

        // ── Step 5: Build trainer and pick the starting epoch ─────────────────
        let device      = <InferBackend as Backend>::Device::default();
        let mut trainer = build_trainer::<TrainBackend>(cfg, device.clone());

        let start_epoch = match (ckpt.saved_epoch(), &cfg.initial_model) {
            (Some(epoch), _) => {
                tracing::info!("Resuming from epoch {}", epoch);
                trainer.load_parameters(&ckpt.model_path(epoch))?;
                epoch + 1
            }
            (None, Some(initial)) => {
                tracing::info!("Model {} loaded from previous state!", initial);
                trainer.load_parameters(Path::new(initial))?;
                1
            }
            (None, None) => 1,
        };

        // ── Step 6: Data loaders ──────────────────────────────────────────────
        // Training batches on the autodiff backend, validation on the
        // inner backend (no gradient tracking).
        let train_loader = DataLoaderBuilder::new(
            AudioBatcher::<TrainBackend>::new(device.clone(), cfg.segment_len(), true),
        )
        .batch_size(cfg.batch_size)
        .shuffle(cfg.seed)
        .num_workers(cfg.num_workers)
        .build(train_dataset);

        let val_loader: Option<Arc<dyn DataLoader<AudioBatch<InferBackend>>>> =
            if val_dataset.is_empty() {
                tracing::warn!("No validation recordings; validation is skipped");
                None
            } else {
                Some(
                    DataLoaderBuilder::new(
                        AudioBatcher::<InferBackend>::new(device.clone(), cfg.segment_len(), false),
                    )
                    .batch_size(cfg.batch_size)
                    .num_workers(cfg.num_workers)
                    .build(val_dataset),
                )
            };

        // ── Step 7: Epoch loop ────────────────────────────────────────────────
        let mut best_val = f64::INFINITY;
        let mut last_saved = start_epoch.saturating_sub(1);

        for epoch in start_epoch..=cfg.max_epoch {
            let (train_loss, lr) = trainer.train_network(epoch, &*train_loader)?;

            let checkpoint_epoch = epoch % cfg.test_step.max(1) == 0;
            let val_loss = match (&val_loader, checkpoint_epoch) {
                (Some(loader), true) => Some(trainer.validate_network(&**loader)?),
                _ => None,
            };

            let row = EpochMetrics::new(epoch, lr, train_loss, val_loss);
            if row.is_improvement(best_val) {
                best_val = val_loss.unwrap_or(best_val);
                tracing::info!("New best validation loss {:.5} at epoch {}", best_val, epoch);
            }
            metrics.log(&row)?;

            println!(
                "Epoch {:>3}/{} | lr={:.6} | train_loss={:.4} | val_loss={}",
                epoch,
                cfg.max_epoch,
                lr,
                train_loss,
                val_loss.map(|v| format!("{v:.4}")).unwrap_or_else(|| "-".into()),
            );

            if checkpoint_epoch {
                let path = ckpt.model_path(epoch);
                trainer.save_parameters(&path)?;
                ckpt.mark_latest(epoch)?;
                tracing::info!("Checkpoint saved to '{}'", path.display());
                last_saved = epoch;
            }
        }

        // The last epoch is always on disk, even off the test_step grid
        if last_saved < cfg.max_epoch && start_epoch <= cfg.max_epoch {
            trainer.save_parameters(&ckpt.model_path(cfg.max_epoch))?;
            ckpt.mark_latest(cfg.max_epoch)?;
            last_saved = cfg.max_epoch;
        }
        tracing::info!(
            "Training complete! Losses in '{}'",
            metrics.metrics_path().display()
        );

        // ── Step 8: Score the eval manifest ───────────────────────────────────
        let Some(eval_list) = &cfg.eval_list else {
            return Ok(None);
        };
        let scores = trainer.test_network(
            Path::new(eval_list),
            Path::new(cfg.eval_audio_dir()),
            &source,
        )?;
        metrics.log_scores(last_saved, &scores)?;
        tracing::info!("Scores appended to '{}'", metrics.scores_path().display());
        println!(
            "{} epoch, ACC {:2.2}%, F1 {:2.2}%",
            last_saved,
            scores.accuracy * 100.0,
            scores.f1 * 100.0
        );
        Ok(Some(scores))
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_passes_check() {
        assert!(TrainConfig::default().check().is_ok());
    }

    #[test]
    fn test_zero_frame_len_is_rejected() {
        let cfg = TrainConfig { frame_len: 0, ..TrainConfig::default() };
        let err = cfg.check().unwrap_err().to_string();
        assert!(err.contains("frame_len"), "{err}");
    }

    #[test]
    fn test_zero_batch_size_fails_before_any_io() {
        // Paths do not exist: the size check must fire first
        let cfg = TrainConfig {
            batch_size: 0,
            train_list: "/nonexistent/list.txt".into(),
            ..TrainConfig::default()
        };
        let err = TrainUseCase::new(cfg).execute().unwrap_err().to_string();
        assert!(err.contains("batch_size"), "{err}");
    }

    #[test]
    fn test_val_fraction_must_leave_training_data() {
        let cfg = TrainConfig { val_fraction: 1.0, ..TrainConfig::default() };
        assert!(cfg.check().is_err());
    }
}
