// ============================================================
// Layer 4 — Data Preparer
// ============================================================
// Turns an ImageSource into the three partitions the rest of
// the pipeline consumes:
//
//   load train pool ──► ChannelStats::compute (raw bytes)
//          │                     │
//          ▼                     ▼
//   split_train_val ──► Normalizer (shared) ◄── load test split
//          │                     │
//          ▼                     ▼
//     train / valid            test
//
// and wraps each partition in a Burn DataLoader:
//   - train: shuffled with a fresh permutation on every iter()
//   - valid/test: fixed partition order, on the inner
//     (non-autodiff) backend since they never need gradients
//
// DataLoaders are built without worker threads so batch order
// is exactly the partition order.

use anyhow::{ensure, Result};
use burn::{
    data::dataloader::{DataLoader, DataLoaderBuilder},
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use rand::{rngs::StdRng, SeedableRng};
use std::sync::Arc;

use crate::data::{
    batcher::{ImageBatch, ImageBatcher},
    dataset::ImageDataset,
    normalizer::{ChannelStats, Normalizer},
    splitter::split_train_val,
};
use crate::domain::image::ImageShape;
use crate::domain::traits::{ImageSource, Split};

pub type BatchLoader<B> = Arc<dyn DataLoader<ImageBatch<B>>>;

/// The three data loaders of a run.
pub struct Loaders<B: AutodiffBackend> {
    pub train: BatchLoader<B>,
    pub valid: BatchLoader<B::InnerBackend>,
    pub test:  BatchLoader<B::InnerBackend>,
}

/// Output of DataPreparer::prepare
pub struct PreparedData {
    pub train:       ImageDataset,
    pub valid:       ImageDataset,
    pub test:        ImageDataset,
    pub class_names: Vec<String>,
    pub stats:       ChannelStats,
    pub shape:       ImageShape,
}

impl PreparedData {
    pub fn num_classes(&self) -> usize {
        self.class_names.len()
    }

    /// Wrap every partition in a DataLoader of `batch_size`.
    pub fn loaders<B: AutodiffBackend>(
        &self,
        batch_size:   usize,
        shuffle_seed: u64,
        device:       &B::Device,
    ) -> Loaders<B> {
        Loaders {
            train: train_loader::<B>(self.train.clone(), batch_size, shuffle_seed, device),
            valid: eval_loader::<B::InnerBackend>(self.valid.clone(), batch_size, device),
            test:  eval_loader::<B::InnerBackend>(self.test.clone(), batch_size, device),
        }
    }
}

pub struct DataPreparer<'a> {
    source:      &'a dyn ImageSource,
    split_ratio: f64,
    seed:        u64,
}

impl<'a> DataPreparer<'a> {
    /// `split_ratio` is the training fraction of the pool, in (0, 1).
    pub fn new(source: &'a dyn ImageSource, split_ratio: f64, seed: u64) -> Self {
        Self { source, split_ratio, seed }
    }

    pub fn prepare(&self) -> Result<PreparedData> {
        ensure!(
            self.split_ratio > 0.0 && self.split_ratio < 1.0,
            "split ratio must be in (0, 1), got {}",
            self.split_ratio
        );

        // ── Raw training pool and its statistics ─────────────────────────────
        let pool  = self.source.load(Split::Train)?;
        let stats = ChannelStats::compute(&pool.images, pool.shape)?;
        tracing::info!("Calculated means: {:?}", stats.mean);
        tracing::info!("Calculated stds: {:?}", stats.std);

        let normalizer = Normalizer::new(stats.clone(), pool.shape);

        // ── Test split, normalised with the training statistics ──────────────
        let test_set = self.source.load(Split::Test)?;
        ensure!(
            test_set.shape == pool.shape,
            "test images are {:?} but training images are {:?}",
            test_set.shape,
            pool.shape
        );

        // ── Random train/validation split ────────────────────────────────────
        let mut rng = StdRng::seed_from_u64(self.seed);
        let (train_images, valid_images) = split_train_val(pool.images, self.split_ratio, &mut rng);
        ensure!(!train_images.is_empty(), "training partition is empty");
        ensure!(!valid_images.is_empty(), "validation partition is empty");

        tracing::info!("Number of training examples: {}", train_images.len());
        tracing::info!("Number of validation examples: {}", valid_images.len());
        tracing::info!("Number of testing examples: {}", test_set.len());

        Ok(PreparedData {
            train:       ImageDataset::new(train_images, pool.shape, normalizer.clone()),
            valid:       ImageDataset::new(valid_images, pool.shape, normalizer.clone()),
            test:        ImageDataset::new(test_set.images, pool.shape, normalizer),
            class_names: pool.class_names,
            stats,
            shape:       pool.shape,
        })
    }
}

/// Load only the test split, normalised with previously saved statistics.
pub fn prepare_test(source: &dyn ImageSource, stats: ChannelStats) -> Result<(ImageDataset, Vec<String>)> {
    let test_set = source.load(Split::Test)?;
    ensure!(
        stats.mean.len() == test_set.shape.channels,
        "saved statistics cover {} channels, images have {}",
        stats.mean.len(),
        test_set.shape.channels
    );
    let normalizer = Normalizer::new(stats, test_set.shape);
    Ok((
        ImageDataset::new(test_set.images, test_set.shape, normalizer),
        test_set.class_names,
    ))
}

/// Shuffling loader: a new permutation is drawn on every traversal.
pub fn train_loader<B: Backend>(
    dataset:    ImageDataset,
    batch_size: usize,
    seed:       u64,
    device:     &B::Device,
) -> BatchLoader<B> {
    let batcher = ImageBatcher::<B>::new(device.clone(), dataset.shape());
    DataLoaderBuilder::new(batcher)
        .batch_size(batch_size)
        .shuffle(seed)
        .build(dataset)
}

/// Fixed-order loader for validation and test.
pub fn eval_loader<B: Backend>(
    dataset:    ImageDataset,
    batch_size: usize,
    device:     &B::Device,
) -> BatchLoader<B> {
    let batcher = ImageBatcher::<B>::new(device.clone(), dataset.shape());
    DataLoaderBuilder::new(batcher)
        .batch_size(batch_size)
        .build(dataset)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::image::{ImageSet, RawImage};
    use burn::backend::{Autodiff, NdArray};

    type TestBackend = Autodiff<NdArray>;

    const SHAPE: ImageShape = ImageShape::new(3, 2, 2);

    /// In-memory source: every image gets a unique label so order
    /// and membership can be read back from the targets tensor.
    struct MemorySource {
        train: usize,
        test:  usize,
    }

    impl MemorySource {
        fn set(&self, offset: usize, n: usize) -> ImageSet {
            let images = (0..n)
                .map(|i| RawImage::new(vec![((offset + i) * 13 % 256) as u8; SHAPE.len()], offset + i))
                .collect();
            let classes = (0..self.train + self.test).map(|i| format!("c{i}")).collect();
            ImageSet::new(SHAPE, images, classes)
        }
    }

    impl ImageSource for MemorySource {
        fn load(&self, split: Split) -> Result<ImageSet> {
            Ok(match split {
                Split::Train => self.set(0, self.train),
                Split::Test  => self.set(self.train, self.test),
            })
        }
    }

    fn labels_in_order<B: Backend>(loader: &BatchLoader<B>) -> Vec<i64> {
        loader
            .iter()
            .flat_map(|batch| batch.targets.into_data().iter::<i64>().collect::<Vec<_>>())
            .collect()
    }

    #[test]
    fn test_partition_sizes() {
        let source   = MemorySource { train: 50, test: 7 };
        let prepared = DataPreparer::new(&source, 0.8, 1).prepare().unwrap();

        use burn::data::dataset::Dataset;
        assert_eq!(prepared.train.len(), 40);
        assert_eq!(prepared.valid.len(), 10);
        assert_eq!(prepared.test.len(), 7);
        assert_eq!(prepared.num_classes(), 57);
    }

    #[test]
    fn test_partitions_are_disjoint_and_cover_pool() {
        let source   = MemorySource { train: 30, test: 5 };
        let prepared = DataPreparer::new(&source, 0.6, 9).prepare().unwrap();

        let mut all: Vec<usize> = prepared.train.labels();
        all.extend(prepared.valid.labels());
        all.sort();
        assert_eq!(all, (0..30).collect::<Vec<_>>());
    }

    #[test]
    fn test_invalid_ratio_is_rejected() {
        let source = MemorySource { train: 10, test: 2 };
        assert!(DataPreparer::new(&source, 0.0, 1).prepare().is_err());
        assert!(DataPreparer::new(&source, 1.0, 1).prepare().is_err());
    }

    #[test]
    fn test_eval_loaders_are_restartable_in_fixed_order() {
        let source   = MemorySource { train: 23, test: 9 };
        let prepared = DataPreparer::new(&source, 0.7, 3).prepare().unwrap();
        let device   = Default::default();
        let loaders  = prepared.loaders::<TestBackend>(4, 11, &device);

        let first  = labels_in_order(&loaders.valid);
        let second = labels_in_order(&loaders.valid);
        assert_eq!(first, second);
        let expected: Vec<i64> = prepared.valid.labels().iter().map(|&l| l as i64).collect();
        assert_eq!(first, expected);

        let test_labels = labels_in_order(&loaders.test);
        assert_eq!(test_labels, (23..32).collect::<Vec<i64>>());
        assert_eq!(test_labels, labels_in_order(&loaders.test));
    }

    #[test]
    fn test_train_loader_keeps_membership_across_traversals() {
        let source   = MemorySource { train: 40, test: 2 };
        let prepared = DataPreparer::new(&source, 0.75, 5).prepare().unwrap();
        let device   = Default::default();
        let loaders  = prepared.loaders::<TestBackend>(8, 17, &device);

        let mut first  = labels_in_order(&loaders.train);
        let mut second = labels_in_order(&loaders.train);
        assert_eq!(first.len(), 30);
        first.sort();
        second.sort();
        assert_eq!(first, second);

        let mut expected: Vec<i64> = prepared.train.labels().iter().map(|&l| l as i64).collect();
        expected.sort();
        assert_eq!(first, expected);
    }

    #[test]
    fn test_prepare_test_uses_given_stats() {
        let source = MemorySource { train: 4, test: 3 };
        let stats  = ChannelStats { mean: vec![0.0; 3], std: vec![1.0; 3] };
        let (test, classes) = prepare_test(&source, stats).unwrap();

        use burn::data::dataset::Dataset;
        assert_eq!(test.len(), 3);
        assert_eq!(classes.len(), 7);
        let item = test.get(0).unwrap();
        assert!((item.pixels[0] - (52.0 / 255.0)).abs() < 1e-6);
    }
}
