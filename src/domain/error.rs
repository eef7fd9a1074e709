// ============================================================
// Layer 3: Error Taxonomy
// ============================================================
// Every failure the core can produce, grouped the way the run
// driver needs to react to them:
//
//   ConfigurationError → Config, NoCheckpoint, CheckpointNotFound,
//                        EpochOutOfRange
//   DataError          → Data
//   NumericError       → NonFiniteLoss
//   PersistenceError   → Persistence, Io
//
// Nothing here is retried. Errors travel up to the use case,
// which converts them into anyhow errors for the CLI.

use std::path::PathBuf;

use thiserror::Error;

pub type TrainResult<T> = Result<T, TrainError>;

#[derive(Debug, Error)]
pub enum TrainError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("no checkpoints found in '{}', cannot resume", .0.display())]
    NoCheckpoint(PathBuf),

    #[error("checkpoint '{}' does not exist", .0.display())]
    CheckpointNotFound(PathBuf),

    #[error("epoch number {number} exceeds the {digits}-digit checkpoint naming ceiling")]
    EpochOutOfRange { number: usize, digits: usize },

    #[error("unreadable batch: {0}")]
    Data(String),

    #[error("non-finite loss at epoch {epoch}, step {step} (mse={recon}, latent={latent})")]
    NonFiniteLoss {
        epoch:  usize,
        step:   usize,
        recon:  f64,
        latent: f64,
    },

    #[error("failed to persist '{}': {reason}", .path.display())]
    Persistence { path: PathBuf, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("model error: {0}")]
    Model(String),
}

impl TrainError {
    /// True for the errors that are raised before any training step runs.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            TrainError::Config(_)
                | TrainError::NoCheckpoint(_)
                | TrainError::CheckpointNotFound(_)
                | TrainError::EpochOutOfRange { .. }
        )
    }
}
