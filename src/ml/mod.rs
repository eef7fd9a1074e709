// ============================================================
// Layer 5: ML / Model Layer (Burn)
// ============================================================
// Everything that needs a Burn backend lives here, together
// with the training loop that drives it through the domain
// traits.
//
// What's in this layer:
//
//   model.rs: The VQ-VAE autoencoder
//                  • Encoder: two stride-2 convs, 3×3 conv, residual blocks
//                  • 1×1 projection into the codebook space
//                  • Vector quantizer (quantize.rs)
//                  • Decoder: 3×3 conv, residual blocks, two transposed convs
//
//   quantize.rs: Nearest-neighbour codebook lookup with a
//                  straight-through gradient and a per-sample
//                  latent loss
//
//   learner.rs: Model + Adam behind the `Learner` trait;
//                  owns the ParamGroup the schedule rewrites
//
//   schedule.rs: One-cycle learning-rate schedule
//
//   sampler.rs: Periodic reconstruction snapshots with a
//                  scoped eval-mode guard
//
//   trainer.rs: The training loop: steps, epochs, checkpoints
//
// Reference: Burn Book §3 (Building Blocks)
//            Burn Book §5 (Training)
//            van den Oord et al. (2017) Neural Discrete Representation Learning

/// VQ-VAE encoder / decoder architecture
pub mod model;

/// Vector quantizer with learnable codebook
pub mod quantize;

/// Model + optimizer implementing the Learner trait
pub mod learner;

/// Learning-rate schedules
pub mod schedule;

/// Periodic sample snapshots
pub mod sampler;

/// Epoch / step orchestration and checkpointing
pub mod trainer;

#[cfg(test)]
pub mod fakes;

use burn::prelude::Backend;

#[cfg(not(feature = "wgpu"))]
pub type InferBackend = burn::backend::NdArray;

#[cfg(feature = "wgpu")]
pub type InferBackend = burn::backend::Wgpu;

/// Backend used for training (autodiff on top of the inference backend).
pub type TrainBackend = burn::backend::Autodiff<InferBackend>;

pub fn default_device() -> <TrainBackend as Backend>::Device {
    Default::default()
}
