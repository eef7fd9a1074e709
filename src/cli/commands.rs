// ============================================================
// Layer 1: CLI Commands and Arguments
// ============================================================
// Defines the two subcommands: `train` and `reconstruct`
// and all their configurable flags.
//
// clap's derive macros automatically generate:
//   - help text (--help)
//   - error messages for missing args
//   - type conversion (string → usize, f64, etc.)
//
// Reference: Rust Book §12 (Building a CLI Program)

use std::path::PathBuf;

use clap::{Args, Subcommand};

use crate::application::{
    reconstruct_use_case::ReconstructRequest,
    train_use_case::TrainConfig,
};
use crate::ml::model::VqVaeConfig;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train the VQ-VAE on an image folder
    Train(TrainArgs),

    /// Reconstruct images with a saved checkpoint
    Reconstruct(ReconstructArgs),
}

#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Training images, one subdirectory per class
    pub path: PathBuf,

    /// Images are resized and center-cropped to size × size
    #[arg(long, default_value_t = 256)]
    pub size: u32,

    /// Train up to (not including) this epoch index
    #[arg(long, default_value_t = 560)]
    pub epoch: usize,

    /// Initial learning rate
    #[arg(long, default_value_t = 3e-4)]
    pub lr: f64,

    /// Learning-rate schedule ("cycle"); constant lr when omitted
    #[arg(long)]
    pub sched: Option<String>,

    /// Root for checkpoint/, sample/ and metrics.csv
    #[arg(long = "save-path", alias = "save_path", default_value = ".")]
    pub save_path: PathBuf,

    /// Start from checkpoint N (N completed epochs)
    #[arg(long, default_value_t = 0)]
    pub start: usize,

    /// Continue from the latest checkpoint; overrides --start
    #[arg(long)]
    pub resume: bool,

    #[arg(long, default_value_t = 128)]
    pub batch_size: usize,

    /// Threads decoding each batch
    #[arg(long, default_value_t = 4)]
    pub num_workers: usize,

    /// Shuffle seed
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Hidden channels of encoder and decoder
    #[arg(long, default_value_t = 128)]
    pub channel: usize,

    #[arg(long, default_value_t = 2)]
    pub n_res_block: usize,

    #[arg(long, default_value_t = 32)]
    pub n_res_channel: usize,

    /// Size of each codebook vector
    #[arg(long, default_value_t = 64)]
    pub embed_dim: usize,

    /// Number of codebook vectors
    #[arg(long, default_value_t = 512)]
    pub n_embed: usize,
}

/// Convert CLI TrainArgs into the application-layer TrainConfig.
/// The application layer never sees clap types.
impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        TrainConfig {
            path:        a.path,
            save_path:   a.save_path,
            size:        a.size,
            epoch:       a.epoch,
            lr:          a.lr,
            sched:       a.sched,
            start:       a.start,
            resume:      a.resume,
            batch_size:  a.batch_size,
            num_workers: a.num_workers,
            seed:        a.seed,
            model: VqVaeConfig::new()
                .with_channel(a.channel)
                .with_n_res_block(a.n_res_block)
                .with_n_res_channel(a.n_res_channel)
                .with_embed_dim(a.embed_dim)
                .with_n_embed(a.n_embed),
        }
    }
}

#[derive(Args, Debug)]
pub struct ReconstructArgs {
    /// Images to reconstruct, same layout as for training
    pub path: PathBuf,

    /// Save path used during training
    #[arg(long = "save-path", alias = "save_path", default_value = ".")]
    pub save_path: PathBuf,

    /// Checkpoint number to load; latest when omitted
    #[arg(long)]
    pub checkpoint: Option<usize>,

    /// How many images (in folder order) to reconstruct
    #[arg(long, default_value_t = 25)]
    pub count: usize,

    /// Output PNG; defaults to {save_path}/sample/reconstruct_NNN.png
    #[arg(long)]
    pub output: Option<PathBuf>,
}

impl From<ReconstructArgs> for ReconstructRequest {
    fn from(a: ReconstructArgs) -> Self {
        ReconstructRequest {
            checkpoint: a.checkpoint,
            count:      a.count,
            output:     a.output,
            ..ReconstructRequest::new(a.path, a.save_path)
        }
    }
}
