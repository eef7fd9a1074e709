// ============================================================
// Layer 6: Sample Grid Writer
// ============================================================
// Turns a SampleArtifact into a PNG under {save_path}/sample/.
//
// Layout (n = number of sampled images):
//   row 0:  input_0  input_1  ... input_{n-1}
//   row 1:  recon_0  recon_1  ... recon_{n-1}
//
// Every tile is surrounded by a 2-pixel black border. Pixel
// values are expected in [-1, 1] (the normalised range of the
// training data) and are clamped before being mapped to 0..=255.

use std::{
    fs,
    path::{Path, PathBuf},
};

use image::{Rgb, RgbImage};

use crate::domain::error::{TrainError, TrainResult};
use crate::domain::image::ImageStack;
use crate::domain::sample::SampleArtifact;
use crate::domain::traits::GridWriter;

const PADDING: usize = 2;

pub struct PngGridWriter {
    dir: PathBuf,
}

impl PngGridWriter {
    pub fn new(dir: impl Into<PathBuf>) -> TrainResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Render the two-row grid for `artifact` without touching disk.
    pub fn render(artifact: &SampleArtifact) -> TrainResult<RgbImage> {
        let (inputs, outputs) = (&artifact.inputs, &artifact.outputs);
        if inputs.len() != outputs.len()
            || inputs.channels() != outputs.channels()
            || inputs.height() != outputs.height()
            || inputs.width() != outputs.width()
        {
            return Err(TrainError::Model(format!(
                "inputs {}x{}x{}x{} and reconstructions {}x{}x{}x{} differ in shape",
                inputs.len(), inputs.channels(), inputs.height(), inputs.width(),
                outputs.len(), outputs.channels(), outputs.height(), outputs.width(),
            )));
        }
        if !matches!(inputs.channels(), 1 | 3) {
            return Err(TrainError::Model(format!(
                "cannot render images with {} channels",
                inputs.channels()
            )));
        }

        let cols   = inputs.len().max(1);
        let (h, w) = (inputs.height(), inputs.width());
        let grid_w = cols * (w + PADDING) + PADDING;
        let grid_h = 2 * (h + PADDING) + PADDING;

        let mut grid = RgbImage::new(grid_w as u32, grid_h as u32);
        for (row, stack) in [inputs, outputs].into_iter().enumerate() {
            for index in 0..stack.len() {
                let x0 = PADDING + index * (w + PADDING);
                let y0 = PADDING + row * (h + PADDING);
                for y in 0..h {
                    for x in 0..w {
                        grid.put_pixel((x0 + x) as u32, (y0 + y) as u32, pixel(stack, index, y, x));
                    }
                }
            }
        }
        Ok(grid)
    }

    /// Render and save to an explicit path.
    pub fn write_to(&self, artifact: &SampleArtifact, path: &Path) -> TrainResult<()> {
        let grid = Self::render(artifact)?;
        grid.save(path).map_err(|e| TrainError::Persistence {
            path:   path.to_path_buf(),
            reason: e.to_string(),
        })
    }
}

impl GridWriter for PngGridWriter {
    fn write(&self, artifact: &SampleArtifact) -> TrainResult<PathBuf> {
        let path = self.dir.join(artifact.file_name());
        self.write_to(artifact, &path)?;
        Ok(path)
    }
}

fn pixel(stack: &ImageStack, index: usize, y: usize, x: usize) -> Rgb<u8> {
    if stack.channels() == 1 {
        let v = to_byte(stack.at(index, 0, y, x));
        Rgb([v, v, v])
    } else {
        Rgb([
            to_byte(stack.at(index, 0, y, x)),
            to_byte(stack.at(index, 1, y, x)),
            to_byte(stack.at(index, 2, y, x)),
        ])
    }
}

/// [-1, 1] → 0..=255
fn to_byte(v: f32) -> u8 {
    let unit = (v.clamp(-1.0, 1.0) + 1.0) / 2.0;
    (unit * 255.0).round() as u8
}
