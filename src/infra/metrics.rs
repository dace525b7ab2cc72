// ============================================================
// Layer 6 — Metrics Logger
// ============================================================
// Appends training and scoring results to CSV files in the
// run directory so learning curves survive the process.
//
//   metrics.csv   epoch,lr,train_loss,val_loss
//   scores.csv    epoch,accuracy,precision,recall,f1
//
// val_loss is left empty on epochs where no validation ran.
//
// Reference: Rust Book §12 (I/O and File Handling)

use anyhow::Result;
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};
use serde::{Deserialize, Serialize};

use crate::domain::scores::BinaryScores;

const METRICS_HEADER: &str = "epoch,lr,train_loss,val_loss";
const SCORES_HEADER:  &str = "epoch,accuracy,precision,recall,f1";

/// One row of metrics for a single training epoch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpochMetrics {
    /// The epoch number (starts at 1)
    pub epoch: usize,

    /// Learning rate used for every step of this epoch
    pub lr: f64,

    /// Average BCE loss over all training batches
    pub train_loss: f64,

    /// Average BCE loss on the validation set, if it ran
    pub val_loss: Option<f64>,
}

impl EpochMetrics {
    pub fn new(epoch: usize, lr: f64, train_loss: f64, val_loss: Option<f64>) -> Self {
        Self { epoch, lr, train_loss, val_loss }
    }

    /// True if this epoch validated below `best_val_loss`
    pub fn is_improvement(&self, best_val_loss: f64) -> bool {
        self.val_loss.is_some_and(|v| v < best_val_loss)
    }
}

/// Logs epoch metrics and scoring results to CSV files.
pub struct MetricsLogger {
    metrics_path: PathBuf,
    scores_path:  PathBuf,
}

impl MetricsLogger {
    /// Writes each CSV header only if that file doesn't exist yet,
    /// so a resumed run keeps appending to the same log.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        let metrics_path = dir.join("metrics.csv");
        let scores_path  = dir.join("scores.csv");
        ensure_header(&metrics_path, METRICS_HEADER)?;
        ensure_header(&scores_path, SCORES_HEADER)?;

        Ok(Self { metrics_path, scores_path })
    }

    /// Append one epoch's metrics.
    pub fn log(&self, m: &EpochMetrics) -> Result<()> {
        let val = m.val_loss.map(|v| format!("{v:.6}")).unwrap_or_default();
        append_line(
            &self.metrics_path,
            &format!("{},{:.8},{:.6},{}", m.epoch, m.lr, m.train_loss, val),
        )?;

        tracing::debug!(
            "Logged epoch {} metrics: lr={:.6}, train_loss={:.4}",
            m.epoch,
            m.lr,
            m.train_loss,
        );
        Ok(())
    }

    /// Append one scoring run, tagged with the epoch it evaluated.
    pub fn log_scores(&self, epoch: usize, s: &BinaryScores) -> Result<()> {
        append_line(
            &self.scores_path,
            &format!(
                "{},{:.6},{:.6},{:.6},{:.6}",
                epoch, s.accuracy, s.precision, s.recall, s.f1
            ),
        )
    }

    pub fn metrics_path(&self) -> &Path {
        &self.metrics_path
    }

    pub fn scores_path(&self) -> &Path {
        &self.scores_path
    }
}

fn ensure_header(path: &Path, header: &str) -> Result<()> {
    if !path.exists() {
        let mut f = fs::File::create(path)?;
        writeln!(f, "{header}")?;
        tracing::debug!("Created CSV log: '{}'", path.display());
    }
    Ok(())
}

fn append_line(path: &Path, line: &str) -> Result<()> {
    let mut f = OpenOptions::new().append(true).open(path)?;
    writeln!(f, "{line}")?;
    Ok(())
}
