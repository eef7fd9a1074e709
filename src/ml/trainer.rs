// ============================================================
// Layer 5: Training Loop
// ============================================================
// Sequences steps into epochs and epochs into a run.
//
// One step, always in this order:
//   1. zero gradients
//   2. forward + combined loss + backward      (learner)
//   3. reject NaN / Inf losses
//   4. schedule.step()   → rewrites ParamGroup.lr
//   5. optimizer step    → uses that same lr
//   6. running MSE += mse · batch_size
//   7. progress observation
//   8. sample snapshot when step % 100 == 0
//
// One epoch: reset the running MSE, pull batches until the
// source is exhausted, then save checkpoint `epoch + 1`.
//
// A run covers epochs [start, end). A StopFlag is checked
// between steps and between epochs; an interrupted epoch is
// abandoned without a checkpoint, so the newest checkpoint on
// disk is always the last fully completed epoch.
//
// Reference: Burn Book §5 (Training)

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use crate::domain::error::{TrainError, TrainResult};
use crate::domain::progress::{EpochSummary, StepProgress};
use crate::domain::traits::{
    BatchSource, GridWriter, Learner, ProgressReporter, Schedule, StepLosses, TrainBatch,
};
use crate::infra::checkpoint::CheckpointManager;
use crate::infra::metrics::{MetricsLogger, RunningMse};
use crate::ml::sampler::Sampler;

// ─── StopFlag ─────────────────────────────────────────────────────────────────
/// Shared request to stop at the next step boundary.
#[derive(Debug, Clone, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EpochOutcome {
    Completed(EpochSummary),
    Interrupted { epoch: usize, steps: usize },
}

/// What a call to `run` achieved.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    /// Every epoch completed (and checkpointed) by this call
    pub epochs: Vec<EpochSummary>,

    /// Zero-based epoch a later `--start` / `--resume` continues at
    pub resume_from: usize,

    /// True when the run ended because a stop was requested
    pub stopped: bool,
}

// ─── TrainingLoop ─────────────────────────────────────────────────────────────
pub struct TrainingLoop<L: Learner> {
    learner:     L,
    checkpoints: CheckpointManager,
    sampler:     Sampler,
    schedule:    Option<Box<dyn Schedule>>,
    writer:      Option<Box<dyn GridWriter>>,
    reporter:    Option<Box<dyn ProgressReporter>>,
    metrics_log: Option<MetricsLogger>,
    stop:        StopFlag,
    metrics:     RunningMse,
}

impl<L: Learner> TrainingLoop<L> {
    pub fn new(learner: L, checkpoints: CheckpointManager) -> Self {
        Self {
            learner,
            checkpoints,
            sampler:     Sampler::default(),
            schedule:    None,
            writer:      None,
            reporter:    None,
            metrics_log: None,
            stop:        StopFlag::new(),
            metrics:     RunningMse::new(),
        }
    }

    pub fn with_schedule(mut self, schedule: Box<dyn Schedule>) -> Self {
        self.schedule = Some(schedule);
        self
    }

    pub fn with_writer(mut self, writer: Box<dyn GridWriter>) -> Self {
        self.writer = Some(writer);
        self
    }

    pub fn with_reporter(mut self, reporter: Box<dyn ProgressReporter>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    pub fn with_metrics_log(mut self, log: MetricsLogger) -> Self {
        self.metrics_log = Some(log);
        self
    }

    pub fn with_stop_flag(mut self, stop: StopFlag) -> Self {
        self.stop = stop;
        self
    }

    pub fn learner(&self) -> &L {
        &self.learner
    }

    pub fn into_learner(self) -> L {
        self.learner
    }

    /// One optimizer step on `batch`.
    pub fn train_step(&mut self, epoch: usize, step: usize, batch: &L::Batch) -> TrainResult<StepLosses> {
        self.learner.zero_grad();
        let losses = self.learner.forward_backward(batch)?;

        if !losses.recon.is_finite() || !losses.latent.is_finite() {
            return Err(TrainError::NonFiniteLoss {
                epoch,
                step,
                recon:  losses.recon,
                latent: losses.latent,
            });
        }

        // The schedule must write the lr this very step will use.
        if let Some(schedule) = self.schedule.as_mut() {
            schedule.step(self.learner.param_group_mut());
        }
        self.learner.optimizer_step()?;

        self.metrics.observe(losses.recon, batch.size());

        if let Some(reporter) = self.reporter.as_mut() {
            reporter.observe(&StepProgress {
                epoch,
                step,
                recon_loss:     losses.recon,
                latent_loss:    losses.latent,
                avg_recon_loss: self.metrics.running_average(),
                lr:             self.learner.param_group().lr,
            });
        }

        self.sample(epoch, step, batch)?;
        Ok(losses)
    }

    /// Snapshot on cadence. A failed forward pass is an error; a failed
    /// write only costs the picture and is logged.
    fn sample(&mut self, epoch: usize, step: usize, batch: &L::Batch) -> TrainResult<()> {
        let Some(writer) = self.writer.as_ref() else {
            return Ok(());
        };
        let Some(artifact) = self.sampler.maybe_sample(epoch, step, batch, &mut self.learner)? else {
            return Ok(());
        };
        match writer.write(&artifact) {
            Ok(path) => tracing::debug!("Sample written to '{}'", path.display()),
            Err(e)   => tracing::warn!("Could not write sample {}: {e}", artifact.file_name()),
        }
        Ok(())
    }

    /// One full pass over `source`. No checkpoint is written here.
    pub fn run_epoch(&mut self, source: &dyn BatchSource<L::Batch>, epoch: usize) -> TrainResult<EpochOutcome> {
        self.metrics.reset();
        if let Some(reporter) = self.reporter.as_mut() {
            reporter.epoch_started(epoch, source.batches_per_epoch());
        }

        let mut steps = 0;
        for (step, batch) in source.batches().enumerate() {
            if self.stop.is_stop_requested() {
                return Ok(EpochOutcome::Interrupted { epoch, steps });
            }
            let batch = batch?;
            self.train_step(epoch, step, &batch)?;
            steps += 1;
        }

        Ok(EpochOutcome::Completed(EpochSummary {
            epoch,
            steps,
            samples:        self.metrics.sample_count(),
            avg_recon_loss: self.metrics.running_average(),
            lr:             self.learner.param_group().lr,
            checkpoint:     None,
        }))
    }

    /// Train epochs `start..end`, saving checkpoint `e + 1` after each
    /// epoch `e` before epoch `e + 1` begins.
    pub fn run(&mut self, source: &dyn BatchSource<L::Batch>, start: usize, end: usize) -> TrainResult<RunReport> {
        let mut report = RunReport { epochs: Vec::new(), resume_from: start, stopped: false };
        if start >= end {
            tracing::info!("Nothing to train: start epoch {} is not below end epoch {}", start, end);
            return Ok(report);
        }

        for epoch in start..end {
            if self.stop.is_stop_requested() {
                report.stopped = true;
                break;
            }

            match self.run_epoch(source, epoch)? {
                EpochOutcome::Interrupted { steps, .. } => {
                    tracing::warn!(
                        "Stopped during epoch {} after {} steps; that epoch will be redone",
                        epoch + 1,
                        steps
                    );
                    report.stopped = true;
                    break;
                }
                EpochOutcome::Completed(mut summary) => {
                    let handle = self.checkpoints.save(epoch, &self.learner)?;
                    summary.checkpoint = Some(handle.path);

                    if let Some(log) = &self.metrics_log {
                        log.log(&summary)?;
                    }
                    if let Some(reporter) = self.reporter.as_mut() {
                        reporter.epoch_finished(&summary);
                    }
                    report.resume_from = epoch + 1;
                    report.epochs.push(summary);
                }
            }
        }

        Ok(report)
    }
}
