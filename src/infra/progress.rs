// ============================================================
// Layer 6: Progress Reporting
// ============================================================
// One indicatif bar per epoch whose message is the familiar
//   epoch: 3; mse: 0.02113; latent: 0.412; avg mse: 0.02409; lr: 0.00030
// line. Each step is mirrored at debug level and each finished
// epoch at info level, so a log file still has the full story
// when no terminal is attached.

use indicatif::{ProgressBar, ProgressStyle};

use crate::domain::progress::{EpochSummary, StepProgress};
use crate::domain::traits::ProgressReporter;

pub struct BarReporter {
    /// Exclusive upper bound of the run, for the "E/N" prefix
    end_epoch: usize,
    bar:       Option<ProgressBar>,
}

impl BarReporter {
    pub fn new(end_epoch: usize) -> Self {
        Self { end_epoch, bar: None }
    }
}

impl ProgressReporter for BarReporter {
    fn epoch_started(&mut self, epoch: usize, total_steps: usize) {
        let bar = ProgressBar::new(total_steps as u64);
        let style = ProgressStyle::default_bar()
            .template("{prefix} [{elapsed_precise}] {bar:30} {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-");
        bar.set_style(style);
        bar.set_prefix(format!("{}/{}", epoch + 1, self.end_epoch));
        self.bar = Some(bar);
    }

    fn observe(&mut self, progress: &StepProgress) {
        let line = progress.describe();
        tracing::debug!(step = progress.step, "{line}");
        if let Some(bar) = &self.bar {
            bar.set_message(line);
            bar.inc(1);
        }
    }

    fn epoch_finished(&mut self, summary: &EpochSummary) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
        match summary.avg_recon_loss {
            Some(avg) => tracing::info!(
                "Epoch {:>3}/{} | steps={} | samples={} | avg_mse={:.5} | lr={:.6}",
                summary.epoch + 1, self.end_epoch, summary.steps, summary.samples, avg, summary.lr,
            ),
            None => tracing::info!(
                "Epoch {:>3}/{} | no data",
                summary.epoch + 1, self.end_epoch,
            ),
        }
    }
}
