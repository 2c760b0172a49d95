// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// This layer handles everything from image files on disk all
// the way to device-ready tensor batches.
//
// The pipeline flows in this order:
//
//   CIFAR-10 .bin / image folders
//       │
//       ▼
//   Loader            → reads raw CHW bytes + labels
//       │
//       ▼
//   ChannelStats      → per-channel mean/std of the raw train pool
//       │
//       ▼
//   Splitter          → random train / validation partition
//       │
//       ▼
//   ImageDataset      → implements Burn's Dataset trait,
//                       normalises lazily on get()
//       │
//       ▼
//   ImageBatcher      → stacks items into [N, C, H, W] tensors
//       │
//       ▼
//   DataLoader        → feeds batches to the training loop
//
// DataPreparer (preparer.rs) wires the steps together.
//
// Reference: Burn Book §4 (Datasets and Dataloaders)
//            Rust Book §13 (Iterators and Closures)

/// CIFAR-10 binary and image-folder sources
pub mod loader;

/// Per-channel statistics and the normalising transform
pub mod normalizer;

/// Shuffles and splits data into train/validation sets
pub mod splitter;

/// Implements Burn's Dataset trait for labelled images
pub mod dataset;

/// Implements Burn's Batcher trait to create tensor batches
pub mod batcher;

/// Builds the three partitions and their DataLoaders
pub mod preparer;
