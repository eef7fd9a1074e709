use std::path::PathBuf;

use burn::data::dataset::Dataset;

use crate::data::loader::{ImageEntry, ImageFolder};
use crate::data::preprocessor::Preprocessor;

/// One decoded (or failed-to-decode) training image.
///
/// A decode failure travels inside the item so the batcher can name
/// the offending file instead of dropping it from the epoch.
#[derive(Debug, Clone)]
pub struct ImageItem {
    pub path:   PathBuf,
    pub label:  usize,
    pub pixels: Result<Vec<f32>, String>,
}

impl ImageItem {
    pub fn decode(entry: &ImageEntry, preprocessor: &Preprocessor) -> Self {
        let pixels = preprocessor.load(&entry.path).map_err(|e| e.to_string());
        Self { path: entry.path.clone(), label: entry.label, pixels }
    }
}

/// The indexed folder as a Burn dataset.
///
/// Items are entries, not pixels: the loader shuffles and groups
/// cheap paths, and the batcher decodes each batch.
pub struct ImageDataset {
    entries: Vec<ImageEntry>,
}

impl ImageDataset {
    pub fn new(folder: &ImageFolder) -> Self {
        Self { entries: folder.entries().to_vec() }
    }
}

impl Dataset<ImageEntry> for ImageDataset {
    fn get(&self, index: usize) -> Option<ImageEntry> {
        self.entries.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}
