// ============================================================
// Layer 6: Infrastructure Layer
// ============================================================
// Everything that touches the filesystem or the terminal:
//
//   checkpoint.rs: Epoch-indexed weight snapshots under
//                      {save_path}/checkpoint, discovery of the
//                      latest one, and the run_config.json that
//                      lets later commands rebuild the model.
//
//   metrics.rs: The exact running-mean aggregator used
//                      by the loop, and the per-epoch CSV log.
//
//   sample_writer.rs: PNG grids pairing sampled inputs with
//                      their reconstructions.
//
//   progress.rs: Terminal progress bar + tracing output.
//
// Reference: Rust Book §7 (Modules)
//            Rust Book §9 (Error Handling)

/// Model checkpoint saving, discovery and restoring
pub mod checkpoint;

/// Running reconstruction error and per-epoch CSV log
pub mod metrics;

/// Input/reconstruction PNG grids
pub mod sample_writer;

/// Progress bar reporter
pub mod progress;
