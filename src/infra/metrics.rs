// ============================================================
// Layer 6: Metrics
// ============================================================
// Two pieces:
//
//   RunningMse: epoch-to-date reconstruction error. Keeps an
//                    exact sum of (batch MSE × batch size) and the
//                    number of samples seen, so a short final batch
//                    is weighted by its real size.
//
//   MetricsLogger: appends one CSV row per completed epoch to
//                    {save_path}/metrics.csv.
//
// Example CSV output:
//   epoch,steps,samples,avg_mse,lr
//   1,293,37413,0.041377,0.000300
//   2,293,37413,0.021904,0.000300
//
// Reference: Rust Book §12 (I/O and File Handling)

use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use crate::domain::error::TrainResult;
use crate::domain::progress::EpochSummary;

// ─── RunningMse ───────────────────────────────────────────────────────────────
/// Exact running mean of per-sample reconstruction error.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct RunningMse {
    sum_weighted_error: f64,
    sample_count:       usize,
}

impl RunningMse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget everything seen so far. Called at the start of every epoch.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Record a batch whose mean per-sample error is `per_sample_error`.
    pub fn observe(&mut self, per_sample_error: f64, batch_size: usize) {
        self.sum_weighted_error += per_sample_error * batch_size as f64;
        self.sample_count += batch_size;
    }

    /// Epoch-to-date mean, or None while no sample has been observed.
    pub fn running_average(&self) -> Option<f64> {
        if self.sample_count == 0 {
            None
        } else {
            Some(self.sum_weighted_error / self.sample_count as f64)
        }
    }

    pub fn sample_count(&self) -> usize {
        self.sample_count
    }
}

// ─── MetricsLogger ────────────────────────────────────────────────────────────
pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Create the logger, writing the CSV header only if the file is new
    /// so a resumed run keeps appending to the same log.
    pub fn new(dir: impl AsRef<Path>) -> TrainResult<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        let csv_path = dir.join("metrics.csv");
        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)?;
            writeln!(f, "epoch,steps,samples,avg_mse,lr")?;
            tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        }

        Ok(Self { csv_path })
    }

    /// Append one epoch's totals. The epoch column is 1-based, like
    /// checkpoint names.
    pub fn log(&self, summary: &EpochSummary) -> TrainResult<()> {
        let mut f = OpenOptions::new().append(true).open(&self.csv_path)?;

        let avg = summary
            .avg_recon_loss
            .map(|v| format!("{v:.6}"))
            .unwrap_or_default();

        writeln!(
            f,
            "{},{},{},{},{:.6}",
            summary.epoch + 1,
            summary.steps,
            summary.samples,
            avg,
            summary.lr,
        )?;
        Ok(())
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }
}
