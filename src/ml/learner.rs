// ============================================================
// Layer 5: VQ-VAE Learner
// ============================================================
// Binds the Burn model and optimizer to the `Learner` trait
// the training loop drives.
//
//   forward_backward:
//     recon      = model(images)
//     mse        = mean((recon − images)²)
//     latent     = mean(latent_loss over the batch)
//     total      = mse + 0.25 · latent
//     gradients  = ∂total / ∂θ          (kept until the step)
//
//   optimizer_step:
//     θ = Adam(θ, gradients, lr = param_group.lr)
//
// The learning rate is read from the ParamGroup at step time,
// so whatever the schedule wrote just before is what Adam uses.
//
// Reference: Burn Book §5, Kingma & Ba (2015) Adam

use std::path::Path;

use burn::{
    module::AutodiffModule,
    nn::loss::{MseLoss, Reduction},
    optim::{GradientsParams, Optimizer},
    prelude::*,
    record::{FullPrecisionSettings, NamedMpkFileRecorder},
    tensor::backend::AutodiffBackend,
};

use crate::data::batcher::ImageBatch;
use crate::domain::error::{TrainError, TrainResult};
use crate::domain::image::ImageStack;
use crate::domain::param_group::ParamGroup;
use crate::domain::traits::{Learner, Mode, Persistable, StepLosses};
use crate::ml::model::VqVae;

/// Weight of the latent loss in the combined objective.
pub const LATENT_LOSS_WEIGHT: f64 = 0.25;

pub struct VqVaeLearner<B: AutodiffBackend, O> {
    model:  VqVae<B>,
    optim:  O,
    group:  ParamGroup,
    grads:  Option<GradientsParams>,
    mode:   Mode,
    device: B::Device,
}

impl<B, O> VqVaeLearner<B, O>
where
    B: AutodiffBackend,
    O: Optimizer<VqVae<B>, B>,
{
    pub fn new(model: VqVae<B>, optim: O, lr: f64, device: B::Device) -> Self {
        Self {
            model,
            optim,
            group: ParamGroup::new(lr),
            grads: None,
            mode: Mode::Train,
            device,
        }
    }

    pub fn model(&self) -> &VqVae<B> {
        &self.model
    }

    /// True while a backward pass has produced gradients that no
    /// optimizer step or zero_grad has consumed yet.
    #[cfg(test)]
    pub fn has_pending_grads(&self) -> bool {
        self.grads.is_some()
    }
}

impl<B, O> Learner for VqVaeLearner<B, O>
where
    B: AutodiffBackend,
    O: Optimizer<VqVae<B>, B>,
{
    type Batch = ImageBatch<B>;

    fn zero_grad(&mut self) {
        self.grads = None;
    }

    fn forward_backward(&mut self, batch: &ImageBatch<B>) -> TrainResult<StepLosses> {
        if self.mode != Mode::Train {
            return Err(TrainError::Model("backward pass requested in eval mode".into()));
        }

        let images = batch.images.clone().to_device(&self.device);
        let (recon, latent) = self.model.forward(images.clone());

        let recon_loss  = MseLoss::new().forward(recon, images, Reduction::Mean);
        let latent_loss = latent.mean();
        let total = recon_loss.clone() + latent_loss.clone().mul_scalar(LATENT_LOSS_WEIGHT);

        let grads = total.backward();
        self.grads = Some(GradientsParams::from_grads(grads, &self.model));

        Ok(StepLosses {
            recon:  recon_loss.into_scalar().elem::<f64>(),
            latent: latent_loss.into_scalar().elem::<f64>(),
        })
    }

    fn optimizer_step(&mut self) -> TrainResult<()> {
        let grads = self
            .grads
            .take()
            .ok_or_else(|| TrainError::Model("optimizer step without gradients".into()))?;
        self.model = self.optim.step(self.group.lr, self.model.clone(), grads);
        Ok(())
    }

    fn param_group(&self) -> &ParamGroup {
        &self.group
    }

    fn param_group_mut(&mut self) -> &mut ParamGroup {
        &mut self.group
    }

    fn mode(&self) -> Mode {
        self.mode
    }

    fn set_mode(&mut self, mode: Mode) {
        self.mode = mode;
    }

    fn reconstruct(&self, batch: &ImageBatch<B>) -> TrainResult<(ImageStack, ImageStack)> {
        if self.mode != Mode::Eval {
            return Err(TrainError::Model("reconstruction requires eval mode".into()));
        }

        // valid() strips autodiff: no graph is recorded for this pass.
        let model  = self.model.valid();
        let images = batch.images.clone().to_device(&self.device).inner();
        let (recon, _) = model.forward(images.clone());

        Ok((to_stack(images)?, to_stack(recon)?))
    }
}

impl<B, O> Persistable for VqVaeLearner<B, O>
where
    B: AutodiffBackend,
    O: Optimizer<VqVae<B>, B>,
{
    fn save(&self, path: &Path) -> TrainResult<()> {
        let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
        self.model
            .clone()
            .save_file(path.to_path_buf(), &recorder)
            .map_err(|e| TrainError::Persistence {
                path:   path.to_path_buf(),
                reason: format!("{e:?}"),
            })
    }

    fn load(&mut self, path: &Path) -> TrainResult<()> {
        let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
        // Load into a copy so a failed read leaves the current weights intact.
        self.model = self
            .model
            .clone()
            .load_file(path.to_path_buf(), &recorder, &self.device)
            .map_err(|e| TrainError::Model(format!("cannot load '{}': {e:?}", path.display())))?;
        Ok(())
    }
}

/// Copy a [N, C, H, W] tensor back to host memory.
pub fn to_stack<B: Backend>(t: Tensor<B, 4>) -> TrainResult<ImageStack> {
    let shape = t.dims();
    let data = t
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|e| TrainError::Model(format!("tensor readback failed: {e:?}")))?;
    ImageStack::new(shape, data)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::batcher::ImageBatcher;
    use crate::data::dataset::ImageItem;
    use crate::data::preprocessor::Preprocessor;
    use crate::ml::model::VqVaeConfig;
    use burn::backend::{Autodiff, NdArray};
    use burn::optim::AdamConfig;
    use std::path::PathBuf;
    use tempfile::TempDir;

    type B = Autodiff<NdArray>;

    fn tiny_model() -> VqVae<B> {
        VqVaeConfig::new()
            .with_channel(8)
            .with_n_res_block(1)
            .with_n_res_channel(4)
            .with_embed_dim(4)
            .with_n_embed(8)
            .init(&Default::default())
    }

    fn batch(n: usize) -> ImageBatch<B> {
        let items = (0..n)
            .map(|i| ImageItem {
                path:   PathBuf::from(format!("{i}.png")),
                label:  0,
                pixels: Ok((0..48).map(|p| ((p + i) % 7) as f32 / 7.0 - 0.5).collect()),
            })
            .collect();
        ImageBatcher::<B>::new(Default::default(), Preprocessor::new(4))
            .try_batch(items)
            .unwrap()
    }

    fn learner() -> VqVaeLearner<B, impl Optimizer<VqVae<B>, B>> {
        let optim = AdamConfig::new().init::<B, VqVae<B>>();
        VqVaeLearner::new(tiny_model(), optim, 1e-2, Default::default())
    }

    #[test]
    fn test_step_consumes_gradients() {
        let mut l = learner();
        let losses = l.forward_backward(&batch(2)).unwrap();
        assert!(losses.recon.is_finite() && losses.latent.is_finite());
        assert!(l.has_pending_grads());

        l.optimizer_step().unwrap();
        assert!(!l.has_pending_grads());
        assert!(l.optimizer_step().is_err());
    }

    #[test]
    fn test_zero_grad_discards_pending_gradients() {
        let mut l = learner();
        l.forward_backward(&batch(1)).unwrap();
        l.zero_grad();
        assert!(!l.has_pending_grads());
    }

    #[test]
    fn test_reconstruct_only_in_eval_mode() {
        let mut l = learner();
        let b = batch(3);
        assert!(l.reconstruct(&b).is_err());

        l.set_mode(Mode::Eval);
        let (inputs, outputs) = l.reconstruct(&b).unwrap();
        assert_eq!(inputs.shape(), [3, 3, 4, 4]);
        assert_eq!(outputs.shape(), [3, 3, 4, 4]);
        assert!(l.forward_backward(&b).is_err());
    }

    #[test]
    fn test_save_load_round_trip_is_exact() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("weights.mpk");

        let mut trained = learner();
        trained.forward_backward(&batch(2)).unwrap();
        trained.optimizer_step().unwrap();
        trained.save(&path).unwrap();

        let mut fresh = learner();
        fresh.load(&path).unwrap();

        let a = trained.model().enc_conv1.weight.val().into_data().to_vec::<f32>().unwrap();
        let b = fresh.model().enc_conv1.weight.val().into_data().to_vec::<f32>().unwrap();
        assert_eq!(a, b);
        let a = trained.model().quantizer.codebook.weight.val().into_data().to_vec::<f32>().unwrap();
        let b = fresh.model().quantizer.codebook.weight.val().into_data().to_vec::<f32>().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_failed_load_keeps_weights() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("garbage.mpk");
        std::fs::write(&path, b"not a record").unwrap();

        let mut l = learner();
        let before = l.model().dec_conv.weight.val().into_data().to_vec::<f32>().unwrap();
        assert!(l.load(&path).is_err());
        let after = l.model().dec_conv.weight.val().into_data().to_vec::<f32>().unwrap();
        assert_eq!(before, after);
    }
}
