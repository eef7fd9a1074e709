// ============================================================
// Layer 2: TrainUseCase
// ============================================================
// Orchestrates a training run in order:
//
//   Step 1: Validate the configuration        (fail before any work)
//   Step 2: Index the image folder            (Layer 4 - data)
//   Step 3: Build the batch source            (Layer 4 - data)
//   Step 4: Build model + Adam                (Layer 5 - ml)
//   Step 5: Resolve the start epoch           (Layer 6 - infra)
//   Step 6: Save the run config               (Layer 6 - infra)
//   Step 7: Attach the schedule               (Layer 5 - ml)
//   Step 8: Run the training loop             (Layer 5 - ml)
//
// Reference: Rust Book §13 (Iterators and Closures)
//            Burn Book §5 (Training)

use std::path::PathBuf;

use anyhow::{Context, Result};
use burn::optim::AdamConfig;
use serde::{Deserialize, Serialize};

use crate::data::{
    loader::ImageFolder,
    preprocessor::Preprocessor,
    source::{FolderSource, LoaderOptions},
};
use crate::domain::error::{TrainError, TrainResult};
use crate::domain::traits::{BatchSource, Persistable, Schedule};
use crate::infra::{
    checkpoint::{CheckpointManager, MAX_CHECKPOINT_EPOCH},
    metrics::MetricsLogger,
    progress::BarReporter,
    sample_writer::PngGridWriter,
};
use crate::ml::{
    default_device,
    learner::VqVaeLearner,
    model::{VqVae, VqVaeConfig},
    schedule::{CycleScheduler, SchedulePolicy},
    trainer::{RunReport, StopFlag, TrainingLoop},
    TrainBackend,
};

// ─── Training Configuration ──────────────────────────────────────────────────
// Everything a run needs. Saved to {save_path}/checkpoint/run_config.json
// so `reconstruct` can rebuild the same architecture later.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    /// Image folder, one subdirectory per class
    pub path:        PathBuf,
    pub save_path:   PathBuf,
    pub size:        u32,
    /// Exclusive upper bound of the epoch range
    pub epoch:       usize,
    pub lr:          f64,
    pub sched:       Option<String>,
    pub start:       usize,
    pub resume:      bool,
    pub batch_size:  usize,
    pub num_workers: usize,
    pub seed:        u64,
    pub model:       VqVaeConfig,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            path:        PathBuf::from("data"),
            save_path:   PathBuf::from("."),
            size:        256,
            epoch:       560,
            lr:          3e-4,
            sched:       None,
            start:       0,
            resume:      false,
            batch_size:  128,
            num_workers: 4,
            seed:        42,
            model:       VqVaeConfig::new(),
        }
    }
}

impl TrainConfig {
    /// Check everything that can be checked before touching the data.
    /// Returns the parsed schedule policy, if any.
    pub fn validate(&self) -> TrainResult<Option<SchedulePolicy>> {
        let factor = VqVaeConfig::DOWNSAMPLE as u32;
        if self.size == 0 || self.size % factor != 0 {
            return Err(TrainError::Config(format!(
                "--size must be a positive multiple of {factor}, got {}",
                self.size
            )));
        }
        if self.batch_size == 0 {
            return Err(TrainError::Config("--batch-size must be at least 1".into()));
        }
        if self.epoch > MAX_CHECKPOINT_EPOCH {
            return Err(TrainError::Config(format!(
                "--epoch {} exceeds the checkpoint naming ceiling of {MAX_CHECKPOINT_EPOCH}",
                self.epoch
            )));
        }
        if !(self.lr.is_finite() && self.lr > 0.0) {
            return Err(TrainError::Config(format!("--lr must be positive, got {}", self.lr)));
        }
        let m = &self.model;
        if m.channel < 2 || m.channel % 2 != 0 {
            return Err(TrainError::Config(format!(
                "--channel must be an even number of at least 2, got {}",
                m.channel
            )));
        }
        if m.n_embed == 0 || m.embed_dim == 0 || m.n_res_channel == 0 {
            return Err(TrainError::Config(
                "--n-embed, --embed-dim and --n-res-channel must be at least 1".into(),
            ));
        }
        self.sched.as_deref().map(str::parse).transpose()
    }
}

/// Decide where training starts and load the matching weights.
///
///   --resume   → latest checkpoint on disk (error if there is none)
///   --start N  → checkpoint N, must exist
///   otherwise  → epoch 0, fresh weights
pub fn resolve_start_epoch(
    cfg:         &TrainConfig,
    checkpoints: &CheckpointManager,
    weights:     &mut impl Persistable,
) -> TrainResult<usize> {
    if cfg.resume {
        let latest = checkpoints.find_latest()?;
        tracing::info!("Resuming from '{}'", latest.path.display());
        return checkpoints.restore(&latest, weights);
    }
    if cfg.start > 0 {
        let handle = checkpoints.load_explicit(cfg.start, weights)?;
        tracing::info!("Resuming from '{}'", handle.path.display());
        return Ok(handle.start_epoch());
    }
    tracing::info!("Training from the beginning");
    Ok(0)
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self, stop: StopFlag) -> Result<RunReport> {
        let cfg = &self.config;

        // ── Step 1: Validate ──────────────────────────────────────────────────
        let policy = cfg.validate()?;
        tracing::info!("{:?}", cfg);

        // ── Step 2: Index images ──────────────────────────────────────────────
        let folder = ImageFolder::scan(&cfg.path)
            .with_context(|| format!("indexing '{}'", cfg.path.display()))?;

        // ── Step 3: Batch source ──────────────────────────────────────────────
        let device  = default_device();
        let options = LoaderOptions {
            batch_size:  cfg.batch_size,
            num_workers: cfg.num_workers,
            seed:        cfg.seed,
        };
        let source = FolderSource::<TrainBackend>::new(
            &folder,
            Preprocessor::new(cfg.size),
            options,
            device.clone(),
        )?;
        let steps_per_epoch = source.batches_per_epoch();
        tracing::info!(
            "{} images, {} batches per epoch, device {:?}",
            source.num_items(),
            steps_per_epoch,
            device
        );

        // ── Step 4: Model + Adam ──────────────────────────────────────────────
        // m = β1*m + (1-β1)*g        (mean)
        // v = β2*v + (1-β2)*g²       (variance)
        // θ = θ - lr * m / (√v + ε)  (update)
        let model: VqVae<TrainBackend> = cfg.model.init(&device);
        let optim = AdamConfig::new().init::<TrainBackend, VqVae<TrainBackend>>();
        let mut learner = VqVaeLearner::new(model, optim, cfg.lr, device);

        // ── Step 5: Start epoch ───────────────────────────────────────────────
        let checkpoints = CheckpointManager::new(&cfg.save_path)?;
        let start = resolve_start_epoch(cfg, &checkpoints, &mut learner)
            .context("restoring checkpoint")?;

        // ── Step 6: Persist the run config ────────────────────────────────────
        checkpoints.save_config(cfg)?;

        // ── Step 7: Schedule ──────────────────────────────────────────────────
        let schedule: Option<Box<dyn Schedule>> = policy.map(|policy| match policy {
            SchedulePolicy::Cycle => {
                let mut sched = CycleScheduler::new(cfg.lr, steps_per_epoch * cfg.epoch);
                sched.advance(start * steps_per_epoch);
                Box::new(sched) as Box<dyn Schedule>
            }
        });

        // ── Step 8: Train ─────────────────────────────────────────────────────
        let writer  = PngGridWriter::new(cfg.save_path.join("sample"))?;
        let metrics = MetricsLogger::new(&cfg.save_path)?;

        let mut training = TrainingLoop::new(learner, checkpoints)
            .with_writer(Box::new(writer))
            .with_reporter(Box::new(BarReporter::new(cfg.epoch)))
            .with_metrics_log(metrics)
            .with_stop_flag(stop);
        if let Some(schedule) = schedule {
            training = training.with_schedule(schedule);
        }

        let report = training.run(&source, start, cfg.epoch)?;
        Ok(report)
    }
}
