// ============================================================
// Layer 3 — Image Domain Types
// ============================================================
// Plain data types for labelled images as they come off disk,
// before any normalisation or tensor conversion.
//
// Pixels are stored as raw bytes in CHW order:
//   [R R R ... R | G G G ... G | B B B ... B]
//    └ h*w ┘       └ h*w ┘       └ h*w ┘
// which is the layout both the CIFAR-10 binary format and
// Burn's [batch, channels, height, width] tensors use.

use serde::{Deserialize, Serialize};

/// Dimensions shared by every image of a set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageShape {
    pub channels: usize,
    pub height:   usize,
    pub width:    usize,
}

impl ImageShape {
    pub const fn new(channels: usize, height: usize, width: usize) -> Self {
        Self { channels, height, width }
    }

    /// Number of pixels in one channel plane
    pub fn plane_len(&self) -> usize {
        self.height * self.width
    }

    /// Number of values in one image (all channels)
    pub fn len(&self) -> usize {
        self.channels * self.plane_len()
    }
}

/// One labelled image with un-normalised pixel bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawImage {
    /// CHW bytes, length = `ImageShape::len()`
    pub pixels: Vec<u8>,
    /// Index into the owning set's class names
    pub label: usize,
}

impl RawImage {
    pub fn new(pixels: Vec<u8>, label: usize) -> Self {
        Self { pixels, label }
    }
}

/// A full split (train pool or test) as loaded from a source.
#[derive(Debug, Clone)]
pub struct ImageSet {
    pub shape:       ImageShape,
    pub images:      Vec<RawImage>,
    pub class_names: Vec<String>,
}

impl ImageSet {
    pub fn new(shape: ImageShape, images: Vec<RawImage>, class_names: Vec<String>) -> Self {
        Self { shape, images, class_names }
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn num_classes(&self) -> usize {
        self.class_names.len()
    }
}
