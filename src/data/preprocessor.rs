// ============================================================
// Layer 4: Image Preprocessor
// ============================================================
// Turns a decoded image into the flat CHW float vector the
// model consumes. Steps, applied in order:
//
//   1. Resize so the SHORTER side equals `size` (aspect kept)
//   2. Center-crop to size × size
//   3. Convert to RGB and scale bytes to [0, 1]
//   4. Normalise with mean 0.5 / std 0.5 → [-1, 1]
//
// The output layout is channel-major: all R values, then all G,
// then all B, each row by row.
//
// Reference: image crate documentation

use std::path::Path;

use image::{imageops::FilterType, DynamicImage, GenericImageView};

use crate::domain::error::{TrainError, TrainResult};

pub const CHANNELS: usize = 3;

#[derive(Debug, Clone, Copy)]
pub struct Preprocessor {
    size: u32,
}

impl Preprocessor {
    pub fn new(size: u32) -> Self {
        Self { size }
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    /// Number of floats one processed image occupies.
    pub fn pixels_per_image(&self) -> usize {
        CHANNELS * self.size as usize * self.size as usize
    }

    /// Decode `path` and preprocess it.
    pub fn load(&self, path: &Path) -> TrainResult<Vec<f32>> {
        let img = image::open(path)
            .map_err(|e| TrainError::Data(format!("cannot decode '{}': {e}", path.display())))?;
        Ok(self.prepare(&img))
    }

    pub fn prepare(&self, img: &DynamicImage) -> Vec<f32> {
        let size = self.size;
        let (w, h) = img.dimensions();

        // ── Step 1: shorter side → size ───────────────────────────────────────
        let (rw, rh) = if w <= h {
            (size, scaled(h, size, w))
        } else {
            (scaled(w, size, h), size)
        };
        let resized = img.resize_exact(rw, rh, FilterType::Triangle);

        // ── Step 2: center crop ───────────────────────────────────────────────
        let left = ((rw - size) as f64 / 2.0).round() as u32;
        let top  = ((rh - size) as f64 / 2.0).round() as u32;
        let rgb  = resized.crop_imm(left, top, size, size).to_rgb8();

        // ── Steps 3+4: scale and normalise, HWC → CHW ────────────────────────
        let plane = (size * size) as usize;
        let mut out = vec![0.0f32; CHANNELS * plane];
        for (i, p) in rgb.pixels().enumerate() {
            for c in 0..CHANNELS {
                out[c * plane + i] = p.0[c] as f32 / 127.5 - 1.0;
            }
        }
        out
    }
}

/// `long * size / short`, rounded, never below `size`.
fn scaled(long: u32, size: u32, short: u32) -> u32 {
    let v = (long as f64 * size as f64 / short.max(1) as f64).round() as u32;
    v.max(size)
}
