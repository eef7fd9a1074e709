// ============================================================
// Layer 4: Folder Batch Source
// ============================================================
// Wires ImageFolder → ImageDataset → ImageBatcher into Burn's
// DataLoader and exposes it to the training loop as a
// BatchSource. Every call to `batches()` is a fresh epoch:
// the loader reshuffles the whole folder (seeded) and cuts it
// into full batches plus at most one short tail.
//
// The loader itself runs on one thread. Burn's multi-worker
// loader splits the dataset into per-worker slices before
// shuffling, which yields a short batch per worker and never
// mixes slices; `num_workers` sizes the batcher's decode pool
// instead.

use std::sync::Arc;

use burn::{
    data::{dataloader::{DataLoader, DataLoaderBuilder}, dataset::Dataset},
    prelude::*,
};

use crate::data::batcher::{ImageBatch, ImageBatcher, LoadedBatch};
use crate::data::dataset::ImageDataset;
use crate::data::loader::ImageFolder;
use crate::data::preprocessor::Preprocessor;
use crate::domain::error::{TrainError, TrainResult};
use crate::domain::traits::BatchSource;

/// DataLoader settings for one run.
#[derive(Debug, Clone, Copy)]
pub struct LoaderOptions {
    pub batch_size:  usize,
    /// Threads decoding each batch
    pub num_workers: usize,
    pub seed:        u64,
}

pub struct FolderSource<B: Backend> {
    loader:     Arc<dyn DataLoader<LoadedBatch<B>>>,
    items:      usize,
    batch_size: usize,
}

impl<B: Backend> FolderSource<B> {
    pub fn new(
        folder:       &ImageFolder,
        preprocessor: Preprocessor,
        options:      LoaderOptions,
        device:       B::Device,
    ) -> TrainResult<Self> {
        let dataset = ImageDataset::new(folder);
        let items   = dataset.len();
        let batcher = ImageBatcher::<B>::new(device, preprocessor)
            .with_decode_threads(options.num_workers)?;

        let loader = DataLoaderBuilder::new(batcher)
            .batch_size(options.batch_size)
            .shuffle(options.seed)
            .build(dataset);

        tracing::debug!(
            "Data loader ready: {} images, batch_size={}, decode threads={}",
            items,
            options.batch_size,
            options.num_workers
        );

        Ok(Self { loader, items, batch_size: options.batch_size })
    }

    pub fn num_items(&self) -> usize {
        self.items
    }
}

impl<B: Backend> BatchSource<ImageBatch<B>> for FolderSource<B> {
    fn batches(&self) -> Box<dyn Iterator<Item = TrainResult<ImageBatch<B>>> + '_> {
        Box::new(self.loader.iter().map(|b| b.map_err(TrainError::from)))
    }

    /// Exact: the loader yields `n / b` full batches plus one tail when `n % b != 0`.
    fn batches_per_epoch(&self) -> usize {
        self.items.div_ceil(self.batch_size.max(1))
    }
}
