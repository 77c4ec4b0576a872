// ============================================================
// Layer 6 - Metrics
// ============================================================
// EpochMetrics      - mean loss and accuracy of one pass over a split
// MetricAccumulator - collects per-batch values and reduces them
//                     with an unweighted mean
// ScalarLogger      - appends scalar records to a CSV file
//
// Scalar tags follow the pattern <metric>_<prefix>:
//   loss_train, accuracy_train        (step = epoch)
//   loss_valid, accuracy_valid        (step = epoch)
//   loss_per_batch, accuracy_per_batch (step = global batch counter)
//
// Output file: logs/<model_identifier>/scalars.csv
//
// Example CSV output:
//   tag,value,step
//   loss_per_batch,0.693147,1
//   accuracy_per_batch,0.500000,1
//   ...
//   loss_train,0.612300,1
//
// Rows are appended across runs; a resumed run continues the
// same file unless logs are renewed.
//
// Reference: Rust Book §12 (I/O and File Handling)

use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Loss and accuracy of one pass over a split
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EpochMetrics {
    /// Mean cross-entropy over the batches of the pass
    pub loss:     f64,
    /// Mean fraction of correct predictions, in [0, 1]
    pub accuracy: f64,
}

// ─── MetricAccumulator ────────────────────────────────────────────────────────
#[derive(Debug, Default, Clone)]
pub struct MetricAccumulator {
    loss_sum:     f64,
    accuracy_sum: f64,
    batches:      usize,
}

impl MetricAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, loss: f64, accuracy: f64) {
        self.loss_sum     += loss;
        self.accuracy_sum += accuracy;
        self.batches      += 1;
    }

    /// Unweighted mean over batches; None when nothing was pushed
    pub fn mean(&self) -> Option<EpochMetrics> {
        (self.batches > 0).then(|| EpochMetrics {
            loss:     self.loss_sum / self.batches as f64,
            accuracy: self.accuracy_sum / self.batches as f64,
        })
    }
}

// ─── ScalarLogger ─────────────────────────────────────────────────────────────
pub struct ScalarLogger {
    csv_path: PathBuf,
}

impl ScalarLogger {
    /// Create the log directory and write the CSV header if the
    /// file doesn't exist yet.
    pub fn new(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)
            .with_context(|| format!("Cannot create log directory '{}'", dir.display()))?;

        let csv_path = dir.join("scalars.csv");
        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)
                .with_context(|| format!("Cannot create '{}'", csv_path.display()))?;
            writeln!(f, "tag,value,step")?;
            tracing::debug!("Created scalar log: '{}'", csv_path.display());
        }

        Ok(Self { csv_path })
    }

    pub fn log_scalar(&self, tag: &str, value: f64, step: usize) -> Result<()> {
        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)
            .with_context(|| format!("Cannot open '{}'", self.csv_path.display()))?;
        writeln!(f, "{tag},{value:.6},{step}")?;
        Ok(())
    }

    /// Write loss_<prefix> and accuracy_<prefix> at `step`
    pub fn log_loss_accuracy(&self, metrics: &EpochMetrics, step: usize, prefix: &str) -> Result<()> {
        self.log_scalar(&format!("loss_{prefix}"), metrics.loss, step)?;
        self.log_scalar(&format!("accuracy_{prefix}"), metrics.accuracy, step)
    }
}
