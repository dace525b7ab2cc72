// ============================================================
// Layer 5 — Classifier Trainer (model lifecycle)
// ============================================================
// Owns everything that lives as long as the model does:
//
//   model      SpeakerNet on the autodiff backend
//   loss       binary cross-entropy over probabilities
//   optimiser  Adam, weight decay 2e-5
//   scheduler  StepDecay(lr, lr_decay, test_step)
//
// and exposes the five operations the driver needs:
//
//   train_network     one epoch, one Adam step per batch
//   validate_network  same loss, no updates, inference view
//   test_network      manifest → probabilities → accuracy/F1
//   save_parameters   named weights → safetensors
//   load_parameters   safetensors → named weights, tolerant
//
// Key Burn insight (same as the training loop before it):
//   - training runs on TrainBackend = Autodiff<InferBackend>
//   - model.valid() returns the model on InferBackend, with
//     dropout disabled and no gradient tracking
//   - the validation loader must batch on InferBackend too
//
// Reference: Burn Book §5, Kingma & Ba (2015) Adam

use anyhow::{bail, Result};
use burn::{
    data::dataloader::DataLoader,
    module::AutodiffModule,
    nn::loss::BinaryCrossEntropyLossConfig,
    optim::{decay::WeightDecayConfig, AdamConfig, GradientsParams, Optimizer},
    prelude::*,
    tensor::{backend::AutodiffBackend, ElementConversion},
    LearningRate,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;

use crate::application::train_use_case::TrainConfig;
use crate::data::{audio::fit_length, batcher::AudioBatch};
use crate::domain::{
    manifest::read_manifest,
    scores::{threshold, BinaryScores},
    traits::AudioSource,
};
use crate::infra::checkpoint::{read_state_dict, write_state_dict};
use crate::ml::{
    model::SpeakerNet,
    scheduler::StepDecay,
    state_dict::{match_checkpoint, LoadReport, StateDict},
};

#[cfg(feature = "wgpu")]
pub type InferBackend = burn::backend::Wgpu;
#[cfg(not(feature = "wgpu"))]
pub type InferBackend = burn::backend::NdArray;

pub type TrainBackend = burn::backend::Autodiff<InferBackend>;

/// Parameter names in checkpoints are scoped under the wrapped model
pub const MODEL_PREFIX: &str = "model.";

/// L2 penalty applied by Adam to every parameter
pub const WEIGHT_DECAY: f32 = 2e-5;

pub struct ClassifierTrainer<B: AutodiffBackend, O> {
    model:       SpeakerNet<B>,
    optim:       O,
    loss:        BinaryCrossEntropyLossConfig,
    scheduler:   StepDecay,
    device:      B::Device,
    sample_rate: u32,
    /// Validation keeps augmentation on unless this is false
    validate_with_augmentation: bool,
}

/// Build the model, optimiser and schedule described by `cfg`.
pub fn build_trainer<B: AutodiffBackend>(
    cfg:    &TrainConfig,
    device: B::Device,
) -> ClassifierTrainer<B, impl Optimizer<SpeakerNet<B>, B>> {
    let model: SpeakerNet<B> = cfg.model_config().init(&device);

    // m = β1*m + (1-β1)*g          (mean)
    // v = β2*v + (1-β2)*g²         (variance)
    // θ = θ - lr * m / (√v + ε)    (update, g includes the L2 term)
    let optim = AdamConfig::new()
        .with_weight_decay(Some(WeightDecayConfig::new(WEIGHT_DECAY)))
        .init::<B, SpeakerNet<B>>();

    tracing::info!(
        "Model para number = {:.2}",
        model.num_params() as f64 / 1024.0 / 1024.0
    );

    ClassifierTrainer {
        model,
        optim,
        loss:        BinaryCrossEntropyLossConfig::new(),
        scheduler:   StepDecay::new(cfg.lr, cfg.lr_decay, cfg.test_step),
        device,
        sample_rate: cfg.sample_rate,
        validate_with_augmentation: cfg.validate_with_augmentation,
    }
}

impl<B, O> ClassifierTrainer<B, O>
where
    B: AutodiffBackend,
    O: Optimizer<SpeakerNet<B>, B>,
{
    /// Run one epoch. `epoch` is 1-based and only selects the
    /// learning rate. Returns (average loss, learning rate used).
    pub fn train_network(
        &mut self,
        epoch:  usize,
        loader: &dyn DataLoader<AudioBatch<B>>,
    ) -> Result<(f64, LearningRate)> {
        let lr  = self.scheduler.lr_at(epoch);
        let bce = self.loss.init::<B>(&self.device);
        let mut bar = EpochProgress::new("Training")?;

        let mut loss_sum = 0.0f64;
        let mut num      = 0usize;

        let mut iter = loader.iter();
        while let Some(batch) = iter.next() {
            let probs = self.model.forward(batch.waveforms, true);
            let loss  = bce.forward(probs, batch.labels);

            loss_sum += loss.clone().into_scalar().elem::<f64>();
            num      += 1;

            // Backward pass + Adam update
            let grads  = GradientsParams::from_grads(loss.backward(), &self.model);
            self.model = self.optim.step(lr, self.model.clone(), grads);

            let progress = iter.progress();
            bar.update(
                progress.items_processed,
                progress.items_total,
                format!("[{epoch:2}] Lr: {lr:.6}, Train_Loss: {:.5}", loss_sum / num as f64),
            );
        }
        bar.finish();

        if num == 0 {
            bail!("Epoch {epoch}: the training loader produced no batches");
        }
        Ok((loss_sum / num as f64, lr))
    }

    /// Average loss over `loader` without touching the parameters.
    pub fn validate_network(
        &self,
        loader: &dyn DataLoader<AudioBatch<B::InnerBackend>>,
    ) -> Result<f64> {
        let model = self.model.valid();
        let bce   = self.loss.init::<B::InnerBackend>(&self.device);
        let mut bar = EpochProgress::new("Validating")?;

        let mut loss_sum = 0.0f64;
        let mut num      = 0usize;

        let mut iter = loader.iter();
        while let Some(batch) = iter.next() {
            let probs = model.forward(batch.waveforms, self.validate_with_augmentation);
            loss_sum += bce.forward(probs, batch.labels).into_scalar().elem::<f64>();
            num      += 1;

            let progress = iter.progress();
            bar.update(
                progress.items_processed,
                progress.items_total,
                format!("Validate_Loss: {:.5}", loss_sum / num as f64),
            );
        }
        bar.finish();

        if num == 0 {
            bail!("the validation loader produced no batches");
        }
        Ok(loss_sum / num as f64)
    }

    /// Score every manifest entry and compare with its label.
    ///
    /// Each entry's audio is read from its own
    /// `{audio_dir}/{stem}_AUDIO.wav`, one forward pass per recording.
    pub fn test_network(
        &self,
        manifest:  &Path,
        audio_dir: &Path,
        source:    &dyn AudioSource,
    ) -> Result<BinaryScores> {
        let entries = read_manifest(manifest)?;
        if entries.is_empty() {
            bail!("Manifest '{}' has no entries to score", manifest.display());
        }

        let model     = self.model.valid();
        let frame_len = model.frame_len;
        let mut truth     = Vec::with_capacity(entries.len());
        let mut predicted = Vec::with_capacity(entries.len());

        for entry in &entries {
            let path = entry.audio_path(audio_dir);
            let (mut samples, rate) = source.read(&path)?;
            if rate != self.sample_rate {
                tracing::warn!(
                    "'{}' is {} Hz, model expects {} Hz",
                    path.display(), rate, self.sample_rate
                );
            }
            // The network needs at least one full frame
            if samples.len() < frame_len {
                samples = fit_length(&samples, frame_len, 0);
            }

            let n     = samples.len();
            let input = Tensor::<B::InnerBackend, 1>::from_floats(samples.as_slice(), &self.device)
                .reshape([1, n]);
            let prob: f32 = model.forward(input, false).into_scalar().elem::<f32>();

            tracing::debug!("{}: p={:.4} label={}", entry.stem, prob, entry.label);
            truth.push(entry.label);
            predicted.push(threshold(prob));
        }

        Ok(BinaryScores::from_labels(&truth, &predicted))
    }

    /// Named copy of all parameters, as written by `save_parameters`.
    pub fn state_dict(&self) -> Result<StateDict> {
        Ok(self.model.state_dict()?.with_prefix(MODEL_PREFIX))
    }

    pub fn save_parameters(&self, path: &Path) -> Result<()> {
        write_state_dict(path, &self.state_dict()?)
    }

    /// Apply a checkpoint. Unknown names and shape mismatches are
    /// reported and skipped; only I/O and decoding failures are errors.
    pub fn load_parameters(&mut self, path: &Path) -> Result<LoadReport> {
        let saved = read_state_dict(path)?;
        if saved.is_empty() {
            tracing::warn!("Checkpoint '{}' holds no tensors", path.display());
        }
        let live  = self.state_dict()?;

        let (report, applied) = match_checkpoint(&live, &saved);
        let applied = applied.strip_prefix(MODEL_PREFIX);
        self.model  = self.model.clone().load_state(&applied, &self.device);

        tracing::info!(
            "Loaded '{}': {} applied, {} wrong shape, {} unknown",
            path.display(),
            report.applied(),
            report.mismatched(),
            report.missing(),
        );
        Ok(report)
    }
}

// ─── Progress reporting ───────────────────────────────────────────────────────
/// Per-batch progress on stderr. indicatif draws nothing when stderr is
/// not a terminal, so in that case a log line is emitted each time
/// another tenth of the pass completes.
struct EpochProgress {
    bar:        ProgressBar,
    stage:      &'static str,
    plain:      bool,
    last_tenth: Option<usize>,
}

impl EpochProgress {
    fn new(stage: &'static str) -> Result<Self> {
        Self::with_bar(ProgressBar::new(0), stage)
    }

    fn with_bar(bar: ProgressBar, stage: &'static str) -> Result<Self> {
        bar.set_style(ProgressStyle::with_template(&format!(
            "{{msg}} {stage}: {{percent:>3}}% [{{bar:30}}] {{pos}}/{{len}}"
        ))?);
        let plain = bar.is_hidden();
        Ok(Self { bar, stage, plain, last_tenth: None })
    }

    /// Returns the fallback log line, if one was emitted.
    fn update(&mut self, processed: usize, total: usize, msg: String) -> Option<String> {
        self.bar.set_length(total as u64);
        self.bar.set_position(processed as u64);

        let mut line = None;
        if self.plain {
            let percent = processed * 100 / total.max(1);
            let tenth   = percent / 10;
            if self.last_tenth != Some(tenth) {
                self.last_tenth = Some(tenth);
                let text = format!("{msg} {}: {percent}%", self.stage);
                tracing::info!("{text}");
                line = Some(text);
            }
        }

        self.bar.set_message(msg);
        line
    }

    fn finish(&self) {
        self.bar.finish();
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{
        batcher::AudioBatcher,
        dataset::{AudioClip, AudioDataset},
    };
    use crate::ml::state_dict::{ParamLoad, ParamTensor};
    use burn::{
        backend::{Autodiff, NdArray},
        data::dataloader::DataLoaderBuilder,
    };
    use std::{cell::RefCell, collections::HashMap, path::PathBuf, sync::Arc};

    type Inner = NdArray<f32>;
    type TB    = Autodiff<Inner>;

    const SEGMENT: usize = 64;

    fn tiny_config() -> TrainConfig {
        TrainConfig {
            channels:  4,
            frame_len: 8,
            hidden:    4,
            lr:        1e-2,
            lr_decay:  0.5,
            test_step: 2,
            ..TrainConfig::default()
        }
    }

    fn clips(n: usize) -> Vec<AudioClip> {
        (0..n)
            .map(|i| {
                let label = (i % 2) as u8;
                let level = if label == 1 { 0.5 } else { -0.5 };
                AudioClip::new(vec![level; SEGMENT + 3 * i], label)
            })
            .collect()
    }

    fn train_loader(clips: Vec<AudioClip>) -> Arc<dyn DataLoader<AudioBatch<TB>>> {
        DataLoaderBuilder::new(AudioBatcher::<TB>::new(Default::default(), SEGMENT, true))
            .batch_size(2)
            .build(AudioDataset::new(clips))
    }

    fn val_loader(clips: Vec<AudioClip>) -> Arc<dyn DataLoader<AudioBatch<Inner>>> {
        DataLoaderBuilder::new(AudioBatcher::<Inner>::new(Default::default(), SEGMENT, false))
            .batch_size(2)
            .build(AudioDataset::new(clips))
    }

    struct FakeSource {
        clips: HashMap<PathBuf, Vec<f32>>,
        reads: RefCell<Vec<PathBuf>>,
    }

    impl AudioSource for FakeSource {
        fn read(&self, path: &Path) -> Result<(Vec<f32>, u32)> {
            self.reads.borrow_mut().push(path.to_path_buf());
            self.clips
                .get(path)
                .cloned()
                .map(|s| (s, 16_000))
                .ok_or_else(|| anyhow::anyhow!("missing {}", path.display()))
        }
    }

    #[test]
    fn test_train_epoch_updates_weights_and_reports_lr() {
        let mut trainer = build_trainer::<TB>(&tiny_config(), Default::default());
        let before = trainer.state_dict().unwrap();

        let (loss, lr) = trainer.train_network(1, &*train_loader(clips(6))).unwrap();
        assert!(loss.is_finite() && loss > 0.0);
        assert_eq!(lr, 1e-2);
        assert_ne!(trainer.state_dict().unwrap(), before);
    }

    #[test]
    fn test_learning_rate_follows_step_schedule() {
        let mut trainer = build_trainer::<TB>(&tiny_config(), Default::default());
        let loader = train_loader(clips(2));

        let (_, lr2) = trainer.train_network(2, &*loader).unwrap();
        let (_, lr3) = trainer.train_network(3, &*loader).unwrap();
        assert_eq!(lr2, 1e-2);
        assert!((lr3 - 5e-3).abs() < 1e-12);
    }

    #[test]
    fn test_empty_epoch_is_an_error_not_a_nan() {
        let mut trainer = build_trainer::<TB>(&tiny_config(), Default::default());
        assert!(trainer.train_network(1, &*train_loader(Vec::new())).is_err());
        assert!(trainer.validate_network(&*val_loader(Vec::new())).is_err());
    }

    #[test]
    fn test_validation_leaves_parameters_alone() {
        let trainer = build_trainer::<TB>(&tiny_config(), Default::default());
        let before  = trainer.state_dict().unwrap();

        let loss = trainer.validate_network(&*val_loader(clips(5))).unwrap();
        assert!(loss.is_finite());
        assert_eq!(trainer.state_dict().unwrap(), before);
    }

    #[test]
    fn test_validation_noise_follows_flag() {
        let loader = val_loader(clips(4));
        let noisy  = TrainConfig { aug_noise_std: 0.05, ..tiny_config() };

        let augmented = build_trainer::<TB>(&noisy, Default::default());
        let a = augmented.validate_network(&*loader).unwrap();
        let b = augmented.validate_network(&*loader).unwrap();
        assert_ne!(a, b, "augmented validation should see fresh noise each pass");

        let clean_cfg = TrainConfig { validate_with_augmentation: false, ..noisy };
        let clean = build_trainer::<TB>(&clean_cfg, Default::default());
        let a = clean.validate_network(&*loader).unwrap();
        let b = clean.validate_network(&*loader).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_redirected_progress_logs_each_tenth() {
        let mut progress = EpochProgress::with_bar(ProgressBar::hidden(), "Training").unwrap();
        let lines: Vec<String> = (1..=20)
            .filter_map(|done| progress.update(done, 20, format!("[ 1] batch {done}")))
            .collect();

        // 5% opens the first tenth, then one line per tenth up to 100%
        assert_eq!(lines.len(), 11);
        assert_eq!(lines[0], "[ 1] batch 1 Training: 5%");
        assert_eq!(lines[10], "[ 1] batch 20 Training: 100%");
    }

    #[test]
    fn test_save_then_load_into_fresh_model() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("model_0001.safetensors");

        let mut trained = build_trainer::<TB>(&tiny_config(), Default::default());
        trained.train_network(1, &*train_loader(clips(4))).unwrap();
        trained.save_parameters(&path).unwrap();

        let mut fresh = build_trainer::<TB>(&tiny_config(), Default::default());
        let report = fresh.load_parameters(&path).unwrap();

        assert_eq!(report.applied(), 10);
        assert_eq!(fresh.state_dict().unwrap(), trained.state_dict().unwrap());
    }

    #[test]
    fn test_partial_checkpoint_only_touches_matching_entries() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("foreign.safetensors");

        let mut trainer = build_trainer::<TB>(&tiny_config(), Default::default());
        let before = trainer.state_dict().unwrap();

        let head_bias = ParamTensor::new(vec![1], vec![0.75]);
        let mut foreign = StateDict::new();
        // data-parallel prefix, right shape → applied
        foreign.insert("module.model.head.bias", head_bias.clone());
        // right name, wrong shape → skipped
        foreign.insert("model.fc.bias", ParamTensor::new(vec![3], vec![9.0; 3]));
        // unknown → skipped
        foreign.insert("speaker_loss.weight", ParamTensor::new(vec![2], vec![1.0, 2.0]));
        write_state_dict(&path, &foreign).unwrap();

        let report = trainer.load_parameters(&path).unwrap();
        assert_eq!((report.applied(), report.mismatched(), report.missing()), (1, 1, 1));
        assert!(report
            .outcomes
            .iter()
            .any(|(_, o)| *o == ParamLoad::Applied { target: "model.head.bias".into() }));

        let after = trainer.state_dict().unwrap();
        assert_eq!(after.get("model.head.bias"), Some(&head_bias));
        for (name, tensor) in before.iter().filter(|(n, _)| *n != "model.head.bias") {
            assert_eq!(after.get(name), Some(tensor), "{name} changed");
        }
    }

    #[test]
    fn test_scoring_reads_each_entry_once() {
        let dir      = tempfile::tempdir().unwrap();
        let manifest = dir.path().join("test_list.txt");
        std::fs::write(&manifest, "id score binary\n301 3 0\n302 14 1\n303 2 0\n").unwrap();

        let audio_dir = Path::new("/audio");
        let source = FakeSource {
            clips: HashMap::from([
                (audio_dir.join("301_AUDIO.wav"), vec![0.1; 40]),
                (audio_dir.join("302_AUDIO.wav"), vec![0.2; 3]),
                (audio_dir.join("303_AUDIO.wav"), vec![0.3; 90]),
            ]),
            reads: RefCell::new(Vec::new()),
        };

        let trainer = build_trainer::<TB>(&tiny_config(), Default::default());
        let scores  = trainer.test_network(&manifest, audio_dir, &source).unwrap();

        assert_eq!(scores.tp + scores.fp + scores.fn_ + scores.tn, 3);
        assert!((0.0..=1.0).contains(&scores.accuracy));
        assert!((0.0..=1.0).contains(&scores.f1));
        assert_eq!(*source.reads.borrow(), vec![
            audio_dir.join("301_AUDIO.wav"),
            audio_dir.join("302_AUDIO.wav"),
            audio_dir.join("303_AUDIO.wav"),
        ]);
    }

    #[test]
    fn test_scoring_empty_manifest_fails() {
        let dir      = tempfile::tempdir().unwrap();
        let manifest = dir.path().join("empty.txt");
        std::fs::write(&manifest, "id score binary\n").unwrap();

        let source  = FakeSource { clips: HashMap::new(), reads: RefCell::new(Vec::new()) };
        let trainer = build_trainer::<TB>(&tiny_config(), Default::default());
        assert!(trainer.test_network(&manifest, Path::new("/audio"), &source).is_err());
    }
}
