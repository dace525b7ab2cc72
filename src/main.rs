#![recursion_limit = "256"]

mod cli;
mod application;
mod domain;
mod data;
mod ml;
mod infra;

use anyhow::Result;
use cli::Cli;
use clap::Parser;

fn main() -> Result<()> {
    // Logs share stderr with the progress bars; stdout carries epoch
    // summaries and scores only.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("speech_phq_classifier=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    cli.run()
}
