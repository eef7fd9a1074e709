// ============================================================
// Layer 1: CLI / Presentation Layer
// ============================================================
// Parses arguments with clap and hands off to Layer 2.
//
// Two commands are supported:
//   1. `train`: trains the VQ-VAE, checkpointing every epoch
//   2. `reconstruct`: loads a checkpoint and writes a sample grid
//
// Ctrl-C during `train` requests a clean stop: the loop finishes
// the current step, drops the unfinished epoch and exits with the
// last completed checkpoint intact.
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, ReconstructArgs, TrainArgs};

use crate::ml::trainer::StopFlag;

#[derive(Parser, Debug)]
#[command(
    name = "vqvae-train",
    version,
    about = "Train a VQ-VAE on an image folder, with per-epoch checkpoints and resume."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Dispatch to the matching use case. The CLI only routes, never computes.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args)       => run_train(args),
            Commands::Reconstruct(args) => run_reconstruct(args),
        }
    }
}

fn run_train(args: TrainArgs) -> Result<()> {
    use crate::application::train_use_case::TrainUseCase;

    tracing::info!("Training on images in: {}", args.path.display());

    let stop = StopFlag::new();
    let handler_flag = stop.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        tracing::warn!("Stop requested, finishing the current step");
        handler_flag.request_stop();
    }) {
        tracing::warn!("Ctrl-C handler not installed: {e}");
    }

    let use_case = TrainUseCase::new(args.into());
    let report = use_case.execute(stop)?;

    if report.stopped {
        println!(
            "Stopped. {} epoch(s) completed; rerun with --resume to continue at epoch {}.",
            report.epochs.len(),
            report.resume_from + 1
        );
    } else if let Some(last) = report.epochs.last().and_then(|s| s.checkpoint.as_ref()) {
        println!("Training complete. Last checkpoint: {}", last.display());
    } else {
        println!("Nothing to train.");
    }
    Ok(())
}

fn run_reconstruct(args: ReconstructArgs) -> Result<()> {
    use crate::application::reconstruct_use_case::ReconstructUseCase;

    let path = ReconstructUseCase::new(args.into()).execute()?;
    println!("Reconstruction written to {}", path.display());
    Ok(())
}
