// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the two subcommands: `train` and `eval`
// and all their configurable flags.
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{builder::RangedU64ValueParser, Args, Subcommand};
use crate::application::train_use_case::TrainConfig;

/// Sizes that divide or allocate must be positive
fn at_least_one() -> RangedU64ValueParser<usize> {
    RangedU64ValueParser::new().range(1..)
}

/// The two top-level subcommands available to the user
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train the classifier, validating and checkpointing as it goes
    Train(TrainArgs),

    /// Score a saved checkpoint against a manifest
    Eval(EvalArgs),
}

/// All arguments for the `train` command.
#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Training manifest: header line, then `id score label` rows
    #[arg(long, default_value = "data/train_list.txt")]
    pub train_list: String,

    /// Directory containing `{id}_AUDIO.wav` files
    #[arg(long, default_value = "data/audio")]
    pub train_path: String,

    /// Validation manifest (audio read from --train-path).
    /// Without it, --val-fraction of the training list is held out
    #[arg(long)]
    pub val_list: Option<String>,

    /// Manifest scored once training finishes
    #[arg(long)]
    pub eval_list: Option<String>,

    /// Audio directory for --eval-list (default: --train-path)
    #[arg(long)]
    pub eval_path: Option<String>,

    /// Run directory for checkpoints, config and CSV logs
    #[arg(long, default_value = "exps/exp1")]
    pub save_path: String,

    /// Checkpoint to start from; ignored when --save-path already has one
    #[arg(long)]
    pub initial_model: Option<String>,

    #[arg(long, default_value_t = 80)]
    pub max_epoch: usize,

    #[arg(long, default_value_t = 32, value_parser = at_least_one())]
    pub batch_size: usize,

    /// Data loader worker threads
    #[arg(long, default_value_t = 4)]
    pub n_cpu: usize,

    /// Training segment length in frames
    #[arg(long, default_value_t = 200, value_parser = at_least_one())]
    pub num_frames: usize,

    /// Expected audio sample rate; other rates are logged, not resampled
    #[arg(long, default_value_t = 16_000)]
    pub sample_rate: u32,

    #[arg(long, default_value_t = 0.001)]
    pub lr: f64,

    /// Learning rate multiplier applied every --test-step epochs
    #[arg(long, default_value_t = 0.97)]
    pub lr_decay: f64,

    /// Validate and save a checkpoint every N epochs
    #[arg(long, default_value_t = 1)]
    pub test_step: usize,

    /// Channel width of the TDNN layers
    #[arg(long = "C", default_value_t = 512, value_parser = at_least_one())]
    pub channels: usize,

    /// Samples per input frame
    #[arg(long, default_value_t = 160, value_parser = at_least_one())]
    pub frame_len: usize,

    #[arg(long, default_value_t = 128, value_parser = at_least_one())]
    pub hidden: usize,

    #[arg(long, default_value_t = 0.1)]
    pub dropout: f64,

    /// Std-dev of the noise added to training waveforms
    #[arg(long, default_value_t = 0.005)]
    pub aug_noise_std: f64,

    /// Validate on clean audio instead of augmented audio
    #[arg(long)]
    pub clean_validation: bool,

    /// Share of the training list held out when --val-list is absent
    #[arg(long, default_value_t = 0.2)]
    pub val_fraction: f64,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,
}

/// Convert CLI TrainArgs into the application-layer TrainConfig.
/// The application layer never sees clap types.
impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        TrainConfig {
            train_list:    a.train_list,
            train_path:    a.train_path,
            val_list:      a.val_list,
            eval_list:     a.eval_list,
            eval_path:     a.eval_path,
            save_path:     a.save_path,
            initial_model: a.initial_model,
            max_epoch:     a.max_epoch,
            batch_size:    a.batch_size,
            num_workers:   a.n_cpu,
            num_frames:    a.num_frames,
            sample_rate:   a.sample_rate,
            lr:            a.lr,
            lr_decay:      a.lr_decay,
            test_step:     a.test_step,
            channels:      a.channels,
            frame_len:     a.frame_len,
            hidden:        a.hidden,
            dropout:       a.dropout,
            aug_noise_std: a.aug_noise_std,
            validate_with_augmentation: !a.clean_validation,
            val_fraction:  a.val_fraction,
            seed:          a.seed,
        }
    }
}

/// All arguments for the `eval` command
#[derive(Args, Debug)]
pub struct EvalArgs {
    /// Manifest to score
    #[arg(long)]
    pub eval_list: String,

    /// Audio directory (default: the one saved with the run)
    #[arg(long)]
    pub eval_path: Option<String>,

    /// Run directory written by `train`
    #[arg(long, default_value = "exps/exp1")]
    pub save_path: String,

    /// Weights to score (default: the latest saved epoch)
    #[arg(long)]
    pub initial_model: Option<String>,
}
