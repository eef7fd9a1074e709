// ============================================================
// Layer 2: ReconstructUseCase
// ============================================================
// Loads a trained checkpoint and writes an input/reconstruction
// grid for the first few images of a folder:
//
//   Step 1: Load run_config.json              (Layer 6 - infra)
//   Step 2: Rebuild the model, load weights   (Layer 5 + 6)
//   Step 3: Take the first `count` images     (Layer 4 - data)
//   Step 4: Forward pass in eval mode         (Layer 5 - ml)
//   Step 5: Write the PNG grid                (Layer 6 - infra)

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use burn::optim::AdamConfig;

use crate::application::train_use_case::TrainConfig;
use crate::data::{
    batcher::ImageBatcher,
    loader::ImageFolder,
    preprocessor::Preprocessor,
};
use crate::domain::error::TrainError;
use crate::domain::sample::SampleArtifact;
use crate::domain::traits::Learner;
use crate::infra::{checkpoint::CheckpointManager, sample_writer::PngGridWriter};
use crate::ml::{
    default_device,
    learner::VqVaeLearner,
    model::VqVae,
    sampler::{EvalGuard, SAMPLE_SIZE},
    TrainBackend,
};

#[derive(Debug, Clone)]
pub struct ReconstructRequest {
    pub path:       PathBuf,
    pub save_path:  PathBuf,
    /// Checkpoint number; the latest one when None
    pub checkpoint: Option<usize>,
    pub count:      usize,
    pub output:     Option<PathBuf>,
}

impl ReconstructRequest {
    pub fn new(path: impl Into<PathBuf>, save_path: impl Into<PathBuf>) -> Self {
        Self {
            path:       path.into(),
            save_path:  save_path.into(),
            checkpoint: None,
            count:      SAMPLE_SIZE,
            output:     None,
        }
    }
}

pub struct ReconstructUseCase {
    request: ReconstructRequest,
}

impl ReconstructUseCase {
    pub fn new(request: ReconstructRequest) -> Self {
        Self { request }
    }

    /// Returns the path of the written grid.
    pub fn execute(&self) -> Result<PathBuf> {
        let req = &self.request;
        if req.count == 0 {
            bail!("--count must be at least 1");
        }

        // ── Step 1: Run config ────────────────────────────────────────────────
        let checkpoints = CheckpointManager::new(&req.save_path)?;
        let cfg: TrainConfig = checkpoints.load_config()?;

        // ── Step 2: Model + weights ───────────────────────────────────────────
        let device = default_device();
        let model: VqVae<TrainBackend> = cfg.model.init(&device);
        let optim = AdamConfig::new().init::<TrainBackend, VqVae<TrainBackend>>();
        let mut learner = VqVaeLearner::new(model, optim, cfg.lr, device.clone());

        let handle = match req.checkpoint {
            Some(number) => checkpoints.load_explicit(number, &mut learner)?,
            None => {
                let latest = checkpoints.find_latest()?;
                checkpoints.restore(&latest, &mut learner)?;
                latest
            }
        };
        tracing::info!("Loaded checkpoint '{}'", handle.path.display());

        // ── Step 3: Images ────────────────────────────────────────────────────
        let mut folder = ImageFolder::scan(&req.path)
            .with_context(|| format!("indexing '{}'", req.path.display()))?;
        folder.truncate(req.count);
        if folder.is_empty() {
            bail!("no images found under '{}'", req.path.display());
        }

        let batcher = ImageBatcher::<TrainBackend>::new(device, Preprocessor::new(cfg.size));
        let batch = batcher
            .try_batch(batcher.decode(folder.entries()))
            .map_err(TrainError::from)?;

        // ── Step 4: Forward pass ──────────────────────────────────────────────
        let (inputs, outputs) = {
            let guard = EvalGuard::new(&mut learner);
            guard.reconstruct(&batch)?
        };

        // ── Step 5: Write ─────────────────────────────────────────────────────
        let output = req.output.clone().unwrap_or_else(|| {
            req.save_path
                .join("sample")
                .join(format!("reconstruct_{:03}.png", handle.number))
        });
        let dir = output
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        let writer = PngGridWriter::new(dir)?;

        let artifact = SampleArtifact::new(handle.number.saturating_sub(1), 0, inputs, outputs);
        writer.write_to(&artifact, &output)?;
        Ok(output)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::train_use_case::TrainUseCase;
    use crate::ml::{model::VqVaeConfig, trainer::StopFlag};
    use image::{GenericImageView, Rgb, RgbImage};
    use tempfile::TempDir;

    fn trained(data: &TempDir, out: &TempDir) {
        let dir = data.path().join("only");
        std::fs::create_dir_all(&dir).unwrap();
        for i in 0..4u8 {
            RgbImage::from_pixel(8, 8, Rgb([i * 60, 100, 200]))
                .save(dir.join(format!("{i}.png")))
                .unwrap();
        }
        let cfg = TrainConfig {
            path:        data.path().to_path_buf(),
            save_path:   out.path().to_path_buf(),
            size:        8,
            epoch:       1,
            batch_size:  4,
            num_workers: 1,
            model: VqVaeConfig::new()
                .with_channel(4)
                .with_n_res_block(1)
                .with_n_res_channel(2)
                .with_embed_dim(2)
                .with_n_embed(4),
            ..Default::default()
        };
        TrainUseCase::new(cfg).execute(StopFlag::new()).unwrap();
    }

    #[test]
    fn test_writes_grid_for_latest_checkpoint() {
        let data = TempDir::new().unwrap();
        let out  = TempDir::new().unwrap();
        trained(&data, &out);

        let mut request = ReconstructRequest::new(data.path(), out.path());
        request.count = 3;
        let path = ReconstructUseCase::new(request).execute().unwrap();

        assert!(path.ends_with("sample/reconstruct_001.png"));
        let grid = image::open(&path).unwrap();
        // 3 tiles of 8 px plus 2 px padding around each
        assert_eq!(grid.dimensions(), (3 * 10 + 2, 2 * 10 + 2));
    }

    #[test]
    fn test_missing_checkpoint_number_fails() {
        let data = TempDir::new().unwrap();
        let out  = TempDir::new().unwrap();
        trained(&data, &out);

        let mut request = ReconstructRequest::new(data.path(), out.path());
        request.checkpoint = Some(9);
        let err = ReconstructUseCase::new(request).execute().unwrap_err();
        assert!(err.to_string().contains("vqvae_009.mpk"));
    }

    #[test]
    fn test_requires_run_config() {
        let out = TempDir::new().unwrap();
        let request = ReconstructRequest::new(out.path(), out.path());
        assert!(ReconstructUseCase::new(request).execute().is_err());
    }
}
