// ============================================================
// Layer 3: ImageStack
// ============================================================
// A stack of N images in NCHW order, copied off the compute
// device. This is the hand-off format between the model layer
// and the image-grid writer, so the writer never touches Burn.

use crate::domain::error::{TrainError, TrainResult};

#[derive(Debug, Clone, PartialEq)]
pub struct ImageStack {
    /// [count, channels, height, width]
    shape: [usize; 4],
    data:  Vec<f32>,
}

impl ImageStack {
    pub fn new(shape: [usize; 4], data: Vec<f32>) -> TrainResult<Self> {
        let expected: usize = shape.iter().product();
        if data.len() != expected {
            return Err(TrainError::Model(format!(
                "image stack of shape {shape:?} needs {expected} values, got {}",
                data.len()
            )));
        }
        Ok(Self { shape, data })
    }

    pub fn shape(&self) -> [usize; 4] {
        self.shape
    }

    pub fn len(&self) -> usize {
        self.shape[0]
    }

    pub fn is_empty(&self) -> bool {
        self.shape[0] == 0
    }

    pub fn channels(&self) -> usize {
        self.shape[1]
    }

    pub fn height(&self) -> usize {
        self.shape[2]
    }

    pub fn width(&self) -> usize {
        self.shape[3]
    }

    /// Value of image `index`, channel `c`, row `y`, column `x`.
    pub fn at(&self, index: usize, c: usize, y: usize, x: usize) -> f32 {
        let [_, channels, height, width] = self.shape;
        self.data[((index * channels + c) * height + y) * width + x]
    }
}
