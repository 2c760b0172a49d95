use burn::data::dataset::Dataset;
use std::sync::Arc;

use crate::data::normalizer::Normalizer;
use crate::domain::image::{ImageShape, RawImage};

/// One normalised example as handed to the batcher.
#[derive(Debug, Clone)]
pub struct ImageItem {
    /// CHW floats, already normalised
    pub pixels: Vec<f32>,
    pub label:  usize,
}

/// A partition of raw images; the transform runs lazily in `get`.
///
/// Cloning is cheap: the images are shared behind an `Arc`, so the
/// same partition can feed a DataLoader and still be read back by
/// index for visualisation.
#[derive(Debug, Clone)]
pub struct ImageDataset {
    images:     Arc<Vec<RawImage>>,
    normalizer: Normalizer,
    shape:      ImageShape,
}

impl ImageDataset {
    pub fn new(images: Vec<RawImage>, shape: ImageShape, normalizer: Normalizer) -> Self {
        Self { images: Arc::new(images), normalizer, shape }
    }

    pub fn shape(&self) -> ImageShape {
        self.shape
    }

    /// The un-normalised image at `index`
    pub fn raw(&self, index: usize) -> Option<&RawImage> {
        self.images.get(index)
    }

    pub fn labels(&self) -> Vec<usize> {
        self.images.iter().map(|img| img.label).collect()
    }
}

impl Dataset<ImageItem> for ImageDataset {
    fn get(&self, index: usize) -> Option<ImageItem> {
        self.images.get(index).map(|img| ImageItem {
            pixels: self.normalizer.apply(&img.pixels),
            label:  img.label,
        })
    }

    fn len(&self) -> usize {
        self.images.len()
    }
}
