// ============================================================
// Layer 3: Core Traits (Abstractions)
// ============================================================
// The training loop only ever talks to these traits:
//
//   BatchSource      → ordered, restartable supply of batches
//   Learner          → model + optimizer: forward/backward/step
//   Persistable      → weights that can be written and restored
//   Schedule         → rewrites the optimizer's ParamGroup
//   ProgressReporter → receives per-step observations
//   GridWriter       → persists input/reconstruction grids
//
// Production implementations live in data/, ml/ and infra/.
// The loop's tests implement them with small fakes.
//
// Reference: Rust Book §10 (Traits: Defining Shared Behaviour)

use std::path::{Path, PathBuf};

use crate::domain::error::TrainResult;
use crate::domain::image::ImageStack;
use crate::domain::param_group::ParamGroup;
use crate::domain::progress::{EpochSummary, StepProgress};
use crate::domain::sample::SampleArtifact;

// ─── TrainBatch ───────────────────────────────────────────────────────────────
/// A batch of images (and labels) as seen by the loop.
pub trait TrainBatch {
    /// Number of samples in the batch. Only the last batch of an
    /// epoch may be smaller than the configured batch size.
    fn size(&self) -> usize;

    /// The first `n` samples, or the whole batch if it is smaller.
    fn head(&self, n: usize) -> Self;
}

// ─── BatchSource ──────────────────────────────────────────────────────────────
/// A finite sequence of batches that can be replayed once per epoch.
///
/// Pulling the next batch blocks until it is ready; worker threads
/// behind the source may prefetch, but order is preserved.
pub trait BatchSource<T> {
    fn batches(&self) -> Box<dyn Iterator<Item = TrainResult<T>> + '_>;

    /// Number of batches one call to `batches()` yields.
    fn batches_per_epoch(&self) -> usize;
}

// ─── Learner ──────────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Train,
    Eval,
}

/// Scalar losses of one forward pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepLosses {
    /// Mean squared reconstruction error
    pub recon: f64,

    /// Latent loss averaged over the batch
    pub latent: f64,
}

/// Model and optimizer, driven one step at a time by the loop.
pub trait Learner: Persistable {
    type Batch: TrainBatch;

    /// Drop any gradients accumulated by a previous backward pass.
    fn zero_grad(&mut self);

    /// Move the batch to the compute device, run the forward pass,
    /// build the combined loss and backpropagate it. Gradients are
    /// kept until `optimizer_step` or `zero_grad`.
    fn forward_backward(&mut self, batch: &Self::Batch) -> TrainResult<StepLosses>;

    /// Apply the pending gradients using the current ParamGroup.
    fn optimizer_step(&mut self) -> TrainResult<()>;

    fn param_group(&self) -> &ParamGroup;

    fn param_group_mut(&mut self) -> &mut ParamGroup;

    fn mode(&self) -> Mode;

    fn set_mode(&mut self, mode: Mode);

    /// Forward pass without gradient tracking. Only valid in
    /// `Mode::Eval`; returns the inputs and their reconstruction.
    fn reconstruct(&self, batch: &Self::Batch) -> TrainResult<(ImageStack, ImageStack)>;
}

// ─── Persistable ──────────────────────────────────────────────────────────────
/// Any component whose weights can be saved and restored in place.
pub trait Persistable {
    /// Write the current weights to exactly `path`.
    fn save(&self, path: &Path) -> TrainResult<()>;

    /// Overwrite the current weights with the ones stored at `path`.
    fn load(&mut self, path: &Path) -> TrainResult<()>;
}

// ─── Schedule ─────────────────────────────────────────────────────────────────
/// A stateful learning-rate policy. Each call advances its own step
/// counter and rewrites the optimizer's ParamGroup.
pub trait Schedule {
    fn step(&mut self, group: &mut ParamGroup);
}

// ─── ProgressReporter ─────────────────────────────────────────────────────────
pub trait ProgressReporter {
    fn epoch_started(&mut self, _epoch: usize, _total_steps: usize) {}

    fn observe(&mut self, progress: &StepProgress);

    fn epoch_finished(&mut self, _summary: &EpochSummary) {}
}

// ─── GridWriter ───────────────────────────────────────────────────────────────
/// Persists sample artifacts. Write-only: nothing reads them back.
pub trait GridWriter {
    fn write(&self, artifact: &SampleArtifact) -> TrainResult<PathBuf>;
}
