// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The application layer loads images through ImageSource and
// never learns which on-disk format they came from:
//
//   Cifar10BinarySource → data_batch_*.bin / test_batch.bin
//   ImageFolderSource   → train/<class>/*.png, test/<class>/*.png
//
// Reference: Rust Book §10 (Traits: Defining Shared Behaviour)

use anyhow::Result;

use crate::domain::image::ImageSet;

/// Which half of a labelled corpus to load
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Split {
    /// The pool that is later divided into training and validation
    Train,
    /// Held-out examples, only touched by the evaluator
    Test,
}

/// Any component that can load a labelled image split.
pub trait ImageSource {
    /// Load one split. Missing or malformed data is an error,
    /// never an empty set.
    fn load(&self, split: Split) -> Result<ImageSet>;
}
