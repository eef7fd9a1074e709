// ============================================================
// Layer 3: Progress Observations
// ============================================================
// What the loop tells the outside world. These are side
// effects only: nothing in the loop ever reads them back.

use std::path::PathBuf;

/// One observation emitted after every optimizer step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepProgress {
    /// Zero-based epoch index
    pub epoch: usize,

    /// Zero-based step index within the epoch
    pub step: usize,

    /// Reconstruction MSE of this batch
    pub recon_loss: f64,

    /// Batch-averaged latent loss of this batch
    pub latent_loss: f64,

    /// Epoch-to-date mean reconstruction error (None before any sample)
    pub avg_recon_loss: Option<f64>,

    /// Learning rate the optimizer step just used
    pub lr: f64,
}

impl StepProgress {
    /// The one-line description shown next to the progress bar.
    pub fn describe(&self) -> String {
        let avg = match self.avg_recon_loss {
            Some(avg) => format!("{avg:.5}"),
            None      => "n/a".to_string(),
        };
        format!(
            "epoch: {}; mse: {:.5}; latent: {:.3}; avg mse: {}; lr: {:.5}",
            self.epoch + 1,
            self.recon_loss,
            self.latent_loss,
            avg,
            self.lr,
        )
    }
}

/// Totals for one completed epoch.
#[derive(Debug, Clone, PartialEq)]
pub struct EpochSummary {
    pub epoch:   usize,
    pub steps:   usize,
    pub samples: usize,

    /// None for an epoch that saw no data
    pub avg_recon_loss: Option<f64>,

    /// Learning rate at the end of the epoch
    pub lr: f64,

    /// Where the end-of-epoch checkpoint was written
    pub checkpoint: Option<PathBuf>,
}
