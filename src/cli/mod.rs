// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// This is the entry point for all user interaction.
// It uses the `clap` crate to parse command line arguments.
// All business logic is delegated to Layer 2 (application).
//
// Two commands are supported:
//   1. `train` — trains, validates and checkpoints the model
//   2. `eval`  — loads a checkpoint and scores a manifest
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, EvalArgs, TrainArgs};

#[derive(Parser, Debug)]
#[command(
    name = "speech-phq-classifier",
    version = "0.1.0",
    about = "Train a binary depression classifier on interview audio, then score it."
)]
pub struct Cli {
    /// The subcommand to run (train or eval)
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Dispatch to the matching use case.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args) => run_train(args),
            Commands::Eval(args)  => run_eval(args),
        }
    }
}

fn run_train(args: TrainArgs) -> Result<()> {
    use crate::application::train_use_case::TrainUseCase;

    tracing::info!("Training on '{}' (audio in '{}')", args.train_list, args.train_path);

    let save_path = args.save_path.clone();
    TrainUseCase::new(args.into()).execute()?;

    println!("Training complete. Checkpoints in '{save_path}'.");
    Ok(())
}

fn run_eval(args: EvalArgs) -> Result<()> {
    use crate::application::eval_use_case::EvalUseCase;

    let scores = EvalUseCase::new(
        args.save_path,
        args.initial_model,
        args.eval_list,
        args.eval_path,
    )
    .execute()?;

    println!(
        "ACC {:2.2}%, F1 {:2.2}% (precision {:.3}, recall {:.3}; TP {} FP {} FN {} TN {})",
        scores.accuracy * 100.0,
        scores.f1 * 100.0,
        scores.precision,
        scores.recall,
        scores.tp,
        scores.fp,
        scores.fn_,
        scores.tn,
    );
    Ok(())
}
