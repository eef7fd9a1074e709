// ============================================================
// Layer 4: Image Batcher
// ============================================================
// Implements Burn's Batcher trait to turn a Vec<ImageEntry>
// into device tensors:
//
//   Input:  N entries (path + class) picked by the data loader
//   Decode: each image → flat CHW vector of 3·S·S floats, in
//           parallel on a rayon pool when more than one decode
//           thread is configured
//   Output: images [N, 3, S, S] and labels [N]
//
// N is whatever the data loader hands us; the final batch of
// an epoch is usually short and is batched exactly the same
// way (no padding). If any item failed to decode, the whole
// batch becomes a BatchFailure naming the offending file.
//
// Reference: Burn Book §4 (Batcher)

use std::{path::PathBuf, sync::Arc};

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
    tensor::TensorData,
};
use rayon::prelude::*;

use crate::data::dataset::ImageItem;
use crate::data::loader::ImageEntry;
use crate::data::preprocessor::{Preprocessor, CHANNELS};
use crate::domain::error::{TrainError, TrainResult};
use crate::domain::traits::TrainBatch;

/// A batch of images ready for the forward pass.
#[derive(Debug, Clone)]
pub struct ImageBatch<B: Backend> {
    /// [batch_size, 3, size, size], values in [-1, 1]
    pub images: Tensor<B, 4>,

    /// Class index per image, [batch_size]
    pub labels: Tensor<B, 1, Int>,
}

impl<B: Backend> TrainBatch for ImageBatch<B> {
    fn size(&self) -> usize {
        self.images.dims()[0]
    }

    fn head(&self, n: usize) -> Self {
        let n = n.min(self.size());
        Self {
            images: self.images.clone().narrow(0, 0, n),
            labels: self.labels.clone().narrow(0, 0, n),
        }
    }
}

/// Why a batch could not be built.
#[derive(Debug, Clone)]
pub struct BatchFailure {
    pub path:   PathBuf,
    pub reason: String,
}

impl From<BatchFailure> for TrainError {
    fn from(f: BatchFailure) -> Self {
        TrainError::Data(format!("'{}': {}", f.path.display(), f.reason))
    }
}

pub type LoadedBatch<B> = Result<ImageBatch<B>, BatchFailure>;

#[derive(Clone, Debug)]
pub struct ImageBatcher<B: Backend> {
    device:       B::Device,
    preprocessor: Preprocessor,

    /// Decode pool; None decodes on the loader's thread
    pool: Option<Arc<rayon::ThreadPool>>,
}

impl<B: Backend> ImageBatcher<B> {
    pub fn new(device: B::Device, preprocessor: Preprocessor) -> Self {
        Self { device, preprocessor, pool: None }
    }

    /// Decode each batch on `threads` threads. 0 or 1 keeps decoding sequential.
    pub fn with_decode_threads(mut self, threads: usize) -> TrainResult<Self> {
        self.pool = if threads > 1 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .thread_name(|i| format!("decode-{i}"))
                .build()
                .map_err(|e| TrainError::Config(format!("decode thread pool: {e}")))?;
            Some(Arc::new(pool))
        } else {
            None
        };
        Ok(self)
    }

    /// Decode `entries`, keeping their order.
    pub fn decode(&self, entries: &[ImageEntry]) -> Vec<ImageItem> {
        let pre = &self.preprocessor;
        match &self.pool {
            Some(pool) if entries.len() > 1 => pool.install(|| {
                entries.par_iter().map(|e| ImageItem::decode(e, pre)).collect()
            }),
            _ => entries.iter().map(|e| ImageItem::decode(e, pre)).collect(),
        }
    }

    /// Stack decoded items into one batch.
    pub fn try_batch(&self, items: Vec<ImageItem>) -> LoadedBatch<B> {
        let n = items.len();
        let size = self.preprocessor.size() as usize;
        let per_image = self.preprocessor.pixels_per_image();
        if n == 0 {
            return Err(BatchFailure { path: PathBuf::new(), reason: "empty batch".into() });
        }

        let mut flat   = Vec::with_capacity(n * per_image);
        let mut labels = Vec::with_capacity(n);
        for item in items {
            let pixels = item.pixels.map_err(|reason| BatchFailure {
                path: item.path.clone(),
                reason,
            })?;
            if pixels.len() != per_image {
                return Err(BatchFailure {
                    path:   item.path,
                    reason: format!("expected {per_image} values, got {}", pixels.len()),
                });
            }
            flat.extend(pixels);
            labels.push(item.label as i32);
        }

        let images = Tensor::<B, 4>::from_data(
            TensorData::new(flat, [n, CHANNELS, size, size]),
            &self.device,
        );
        let labels = Tensor::<B, 1, Int>::from_ints(labels.as_slice(), &self.device);

        Ok(ImageBatch { images, labels })
    }
}

impl<B: Backend> Batcher<ImageEntry, LoadedBatch<B>> for ImageBatcher<B> {
    fn batch(&self, entries: Vec<ImageEntry>) -> LoadedBatch<B> {
        self.try_batch(self.decode(&entries))
    }
}
