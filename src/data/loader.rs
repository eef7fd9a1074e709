// ============================================================
// Layer 4: Image Folder Loader
// ============================================================
// Indexes a training directory laid out as one subdirectory
// per class:
//
//   path/
//     cats/  001.png  002.jpg ...
//     dogs/  a.png    b.png   ...
//
// Classes are sorted by name and numbered from 0; files inside
// a class are sorted too, so the index (and therefore every
// deterministic prefix taken from it) is stable across runs.
// Only the paths are collected here; decoding happens lazily
// in the dataset so worker threads share the cost.
//
// Reference: Rust Book §8 (Collections)
//            Rust Book §9 (Error Handling)

use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::domain::error::{TrainError, TrainResult};

const IMAGE_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "bmp", "gif"];

/// One image on disk and the index of its class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageEntry {
    pub path:  PathBuf,
    pub label: usize,
}

#[derive(Debug, Clone)]
pub struct ImageFolder {
    root:    PathBuf,
    classes: Vec<String>,
    entries: Vec<ImageEntry>,
}

impl ImageFolder {
    /// Walk `root` and index every image in its class subdirectories.
    pub fn scan(root: impl AsRef<Path>) -> TrainResult<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_dir() {
            return Err(TrainError::Config(format!(
                "training image directory '{}' does not exist",
                root.display()
            )));
        }

        let mut class_dirs: Vec<(String, PathBuf)> = Vec::new();
        for entry in fs::read_dir(&root)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                let name = entry.file_name().to_string_lossy().into_owned();
                class_dirs.push((name, entry.path()));
            }
        }
        class_dirs.sort();

        let mut entries = Vec::new();
        for (label, (_, dir)) in class_dirs.iter().enumerate() {
            let mut files: Vec<PathBuf> = fs::read_dir(dir)?
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| p.is_file() && is_image(p))
                .collect();
            files.sort();
            entries.extend(files.into_iter().map(|path| ImageEntry { path, label }));
        }

        if entries.is_empty() {
            tracing::warn!("No images found under '{}'", root.display());
        }
        tracing::info!(
            "Indexed {} images in {} classes under '{}'",
            entries.len(),
            class_dirs.len(),
            root.display()
        );

        let classes = class_dirs.into_iter().map(|(name, _)| name).collect();
        Ok(Self { root, classes, entries })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn entries(&self) -> &[ImageEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keep only the first `n` entries (in index order).
    pub fn truncate(&mut self, n: usize) {
        self.entries.truncate(n);
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}
