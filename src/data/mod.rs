// ============================================================
// Layer 4: Data Pipeline
// ============================================================
// This layer handles everything from an image directory on
// disk all the way to device-resident tensor batches.
//
// The pipeline flows in this order:
//
//   image folder (one subdirectory per class)
//       │
//       ▼
//   ImageFolder       → indexes class dirs and image paths
//       │
//       ▼
//   ImageDataset      → implements Burn's Dataset trait over entries
//       │
//       ▼
//   ImageBatcher      → decodes each batch through the Preprocessor
//                       (resize, center crop, [-1, 1]) and stacks it
//       │
//       ▼
//   FolderSource      → shuffled DataLoader, one pass per epoch
//
// Each module is responsible for exactly one step.
//
// Reference: Burn Book §4 (Datasets and Dataloaders)
//            Rust Book §13 (Iterators and Closures)

/// Indexes an image directory into (path, class) entries
pub mod loader;

/// Decodes and normalises a single image
pub mod preprocessor;

/// Implements Burn's Dataset trait for image entries
pub mod dataset;

/// Implements Burn's Batcher trait to create tensor batches
pub mod batcher;

/// Globally shuffled batch source for the training loop
pub mod source;
