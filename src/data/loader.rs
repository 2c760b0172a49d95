// ============================================================
// Layer 4 — Image Loaders
// ============================================================
// Two ImageSource implementations:
//
//   Cifar10BinarySource — the "binary version" of CIFAR-10:
//
//     cifar-10-batches-bin/
//       batches.meta.txt       ← one class name per line
//       data_batch_1.bin       ┐
//       ...                    ├ training pool (50 000 images)
//       data_batch_5.bin       ┘
//       test_batch.bin         ← test split (10 000 images)
//
//     Every record is 3073 bytes: 1 label byte followed by
//     1024 red, 1024 green and 1024 blue bytes (row-major 32x32).
//     That is already CHW order, so records are copied as-is.
//
//   ImageFolderSource — one directory per class:
//
//     root/train/<class>/*.png|jpg|jpeg|bmp
//     root/test/<class>/*.png|jpg|jpeg|bmp
//
//     Class indices come from the sorted train directory names
//     and are shared with the test split. Every image is resized
//     to image_size x image_size RGB.
//
// A missing directory, unreadable file or malformed record is a
// hard error: the run aborts before any training happens.
//
// Reference: https://www.cs.toronto.edu/~kriz/cifar.html

use anyhow::{bail, ensure, Context, Result};
use image::imageops::FilterType;
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::domain::image::{ImageSet, ImageShape, RawImage};
use crate::domain::traits::{ImageSource, Split};

/// CIFAR-10 class names, used when batches.meta.txt is absent
pub const CIFAR10_CLASSES: [&str; 10] = [
    "airplane",
    "automobile",
    "bird",
    "cat",
    "deer",
    "dog",
    "frog",
    "horse",
    "ship",
    "truck",
];

pub const CIFAR10_SHAPE: ImageShape = ImageShape::new(3, 32, 32);

const CIFAR10_TRAIN_FILES: [&str; 5] = [
    "data_batch_1.bin",
    "data_batch_2.bin",
    "data_batch_3.bin",
    "data_batch_4.bin",
    "data_batch_5.bin",
];
const CIFAR10_TEST_FILE: &str = "test_batch.bin";
const CIFAR10_META_FILE: &str = "batches.meta.txt";
const CIFAR10_SUBDIR: &str = "cifar-10-batches-bin";

const IMAGE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

// ─── CIFAR-10 Binary ──────────────────────────────────────────────────────────
pub struct Cifar10BinarySource {
    root: PathBuf,
}

impl Cifar10BinarySource {
    /// `root` may point at the extracted `cifar-10-batches-bin`
    /// directory or at its parent.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn batches_dir(&self) -> Result<PathBuf> {
        let nested = self.root.join(CIFAR10_SUBDIR);
        let dir = if nested.is_dir() { nested } else { self.root.clone() };
        ensure!(
            dir.is_dir(),
            "CIFAR-10 directory '{}' does not exist. \
             Download the binary version and extract it there.",
            dir.display()
        );
        Ok(dir)
    }

    fn class_names(dir: &Path) -> Result<Vec<String>> {
        let meta = dir.join(CIFAR10_META_FILE);
        if !meta.exists() {
            return Ok(CIFAR10_CLASSES.iter().map(|s| s.to_string()).collect());
        }
        let text = fs::read_to_string(&meta)
            .with_context(|| format!("Cannot read '{}'", meta.display()))?;
        let names: Vec<String> = text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect();
        ensure!(!names.is_empty(), "'{}' lists no classes", meta.display());
        Ok(names)
    }
}

impl ImageSource for Cifar10BinarySource {
    fn load(&self, split: Split) -> Result<ImageSet> {
        let dir         = self.batches_dir()?;
        let class_names = Self::class_names(&dir)?;

        let files: Vec<&str> = match split {
            Split::Train => CIFAR10_TRAIN_FILES.to_vec(),
            Split::Test  => vec![CIFAR10_TEST_FILE],
        };

        let mut images = Vec::new();
        for name in files {
            let path  = dir.join(name);
            let bytes = fs::read(&path)
                .with_context(|| format!("Cannot read CIFAR-10 batch '{}'", path.display()))?;
            let batch = parse_cifar_records(&bytes, class_names.len())
                .with_context(|| format!("Corrupt CIFAR-10 batch '{}'", path.display()))?;
            tracing::debug!("Loaded {} images from {}", batch.len(), path.display());
            images.extend(batch);
        }

        tracing::info!("Loaded {} CIFAR-10 images ({:?} split)", images.len(), split);
        Ok(ImageSet::new(CIFAR10_SHAPE, images, class_names))
    }
}

/// Decode a CIFAR-10 binary batch: `[label][3072 CHW bytes]` records.
pub fn parse_cifar_records(bytes: &[u8], num_classes: usize) -> Result<Vec<RawImage>> {
    let record_len = 1 + CIFAR10_SHAPE.len();
    ensure!(!bytes.is_empty(), "batch file is empty");
    ensure!(
        bytes.len() % record_len == 0,
        "length {} is not a multiple of the {}-byte record size",
        bytes.len(),
        record_len
    );

    bytes
        .chunks_exact(record_len)
        .enumerate()
        .map(|(i, record)| {
            let label = record[0] as usize;
            ensure!(
                label < num_classes,
                "record {} has label {} but only {} classes exist",
                i,
                label,
                num_classes
            );
            Ok(RawImage::new(record[1..].to_vec(), label))
        })
        .collect()
}

// ─── Image Folder ─────────────────────────────────────────────────────────────
pub struct ImageFolderSource {
    root:       PathBuf,
    image_size: usize,
}

impl ImageFolderSource {
    pub fn new(root: impl Into<PathBuf>, image_size: usize) -> Self {
        Self { root: root.into(), image_size }
    }

    fn split_dir(&self, split: Split) -> PathBuf {
        match split {
            Split::Train => self.root.join("train"),
            Split::Test  => self.root.join("test"),
        }
    }

    /// Sorted class directory names of the train split
    fn class_names(&self) -> Result<Vec<String>> {
        let train_dir = self.split_dir(Split::Train);
        let mut names = Vec::new();
        for entry in fs::read_dir(&train_dir)
            .with_context(|| format!("Cannot read directory '{}'", train_dir.display()))?
        {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                names.push(entry.file_name().to_string_lossy().to_string());
            }
        }
        names.sort();
        ensure!(
            !names.is_empty(),
            "'{}' contains no class directories",
            train_dir.display()
        );
        Ok(names)
    }

    fn load_image(&self, path: &Path, label: usize) -> Result<RawImage> {
        let size = self.image_size as u32;
        let img = image::open(path)
            .with_context(|| format!("Cannot decode image '{}'", path.display()))?
            .resize_exact(size, size, FilterType::Triangle)
            .to_rgb8();

        let plane      = self.image_size * self.image_size;
        let mut pixels = vec![0u8; 3 * plane];
        for (x, y, px) in img.enumerate_pixels() {
            let offset = y as usize * self.image_size + x as usize;
            pixels[offset]             = px[0];
            pixels[plane + offset]     = px[1];
            pixels[2 * plane + offset] = px[2];
        }
        Ok(RawImage::new(pixels, label))
    }
}

impl ImageSource for ImageFolderSource {
    fn load(&self, split: Split) -> Result<ImageSet> {
        let class_names = self.class_names()?;
        let split_dir   = self.split_dir(split);
        if !split_dir.is_dir() {
            bail!("Image folder '{}' does not exist", split_dir.display());
        }

        let mut images = Vec::new();
        for entry in fs::read_dir(&split_dir)
            .with_context(|| format!("Cannot read directory '{}'", split_dir.display()))?
        {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let class = entry.file_name().to_string_lossy().to_string();
            let label = class_names
                .iter()
                .position(|c| *c == class)
                .with_context(|| {
                    format!("Class '{}' in {:?} split is not present in the train split", class, split)
                })?;

            let mut files: Vec<PathBuf> = fs::read_dir(entry.path())?
                .filter_map(|e| e.ok().map(|e| e.path()))
                .filter(|p| has_image_extension(p))
                .collect();
            // read_dir order is platform dependent
            files.sort();

            for path in files {
                images.push(self.load_image(&path, label)?);
            }
        }

        ensure!(!images.is_empty(), "No images found under '{}'", split_dir.display());
        // Keep a deterministic order independent of directory iteration
        images.sort_by_key(|img| img.label);

        tracing::info!(
            "Loaded {} images in {} classes from {}",
            images.len(),
            class_names.len(),
            split_dir.display()
        );
        Ok(ImageSet::new(
            ImageShape::new(3, self.image_size, self.image_size),
            images,
            class_names,
        ))
    }
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn cifar_record(label: u8, fill: u8) -> Vec<u8> {
        let mut r = vec![label];
        r.extend(std::iter::repeat(fill).take(CIFAR10_SHAPE.len()));
        r
    }

    fn write_cifar_dir(dir: &Path, per_file: usize) {
        for (i, name) in CIFAR10_TRAIN_FILES.iter().enumerate() {
            let bytes: Vec<u8> = (0..per_file)
                .flat_map(|j| cifar_record(((i + j) % 10) as u8, i as u8))
                .collect();
            fs::write(dir.join(name), bytes).unwrap();
        }
        fs::write(dir.join(CIFAR10_TEST_FILE), cifar_record(3, 200)).unwrap();
    }

    #[test]
    fn test_parse_records() {
        let mut bytes = cifar_record(7, 1);
        bytes.extend(cifar_record(2, 9));
        let images = parse_cifar_records(&bytes, 10).unwrap();
        assert_eq!(images.len(), 2);
        assert_eq!(images[0].label, 7);
        assert_eq!(images[1].label, 2);
        assert_eq!(images[1].pixels.len(), 3072);
        assert!(images[1].pixels.iter().all(|&p| p == 9));
    }

    #[test]
    fn test_truncated_batch_is_rejected() {
        let mut bytes = cifar_record(1, 0);
        bytes.pop();
        assert!(parse_cifar_records(&bytes, 10).is_err());
    }

    #[test]
    fn test_out_of_range_label_is_rejected() {
        assert!(parse_cifar_records(&cifar_record(10, 0), 10).is_err());
    }

    #[test]
    fn test_load_cifar_splits() {
        let tmp = tempfile::tempdir().unwrap();
        write_cifar_dir(tmp.path(), 2);

        let source = Cifar10BinarySource::new(tmp.path());
        let train  = source.load(Split::Train).unwrap();
        let test   = source.load(Split::Test).unwrap();

        assert_eq!(train.len(), 10);
        assert_eq!(test.len(), 1);
        assert_eq!(test.images[0].label, 3);
        assert_eq!(train.class_names[0], "airplane");
        assert_eq!(train.shape, CIFAR10_SHAPE);
    }

    #[test]
    fn test_load_cifar_from_parent_with_meta() {
        let tmp    = tempfile::tempdir().unwrap();
        let nested = tmp.path().join(CIFAR10_SUBDIR);
        fs::create_dir_all(&nested).unwrap();
        write_cifar_dir(&nested, 1);
        let names: String = (0..10).map(|i| format!("class{i}\n")).collect();
        fs::write(nested.join(CIFAR10_META_FILE), names + "\n").unwrap();

        let set = Cifar10BinarySource::new(tmp.path()).load(Split::Test).unwrap();
        assert_eq!(set.num_classes(), 10);
        assert_eq!(set.class_names[3], "class3");
    }

    #[test]
    fn test_missing_cifar_dir_fails() {
        let tmp    = tempfile::tempdir().unwrap();
        let source = Cifar10BinarySource::new(tmp.path().join("nowhere"));
        assert!(source.load(Split::Train).is_err());
    }

    #[test]
    fn test_missing_batch_file_fails() {
        let tmp = tempfile::tempdir().unwrap();
        write_cifar_dir(tmp.path(), 1);
        fs::remove_file(tmp.path().join("data_batch_3.bin")).unwrap();
        assert!(Cifar10BinarySource::new(tmp.path()).load(Split::Train).is_err());
    }

    fn write_png(path: &Path, rgb: [u8; 3]) {
        let img = image::RgbImage::from_pixel(4, 4, image::Rgb(rgb));
        img.save(path).unwrap();
    }

    #[test]
    fn test_image_folder_loads_sorted_classes_in_chw() {
        let tmp = tempfile::tempdir().unwrap();
        for split in ["train", "test"] {
            for class in ["dog", "cat"] {
                fs::create_dir_all(tmp.path().join(split).join(class)).unwrap();
            }
        }
        write_png(&tmp.path().join("train/cat/a.png"), [10, 20, 30]);
        write_png(&tmp.path().join("train/dog/b.png"), [40, 50, 60]);
        write_png(&tmp.path().join("train/dog/c.png"), [40, 50, 60]);
        write_png(&tmp.path().join("test/dog/d.png"), [1, 2, 3]);
        fs::write(tmp.path().join("train/cat/notes.txt"), "ignored").unwrap();

        let source = ImageFolderSource::new(tmp.path(), 4);
        let train  = source.load(Split::Train).unwrap();
        assert_eq!(train.class_names, vec!["cat", "dog"]);
        assert_eq!(train.len(), 3);
        assert_eq!(train.shape, ImageShape::new(3, 4, 4));

        let cat = &train.images[0];
        assert_eq!(cat.label, 0);
        assert_eq!(cat.pixels[0], 10);
        assert_eq!(cat.pixels[16], 20);
        assert_eq!(cat.pixels[32], 30);

        let test = source.load(Split::Test).unwrap();
        assert_eq!(test.len(), 1);
        assert_eq!(test.images[0].label, 1);
    }

    #[test]
    fn test_image_folder_unknown_test_class_fails() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("train/cat")).unwrap();
        fs::create_dir_all(tmp.path().join("test/bird")).unwrap();
        write_png(&tmp.path().join("train/cat/a.png"), [0, 0, 0]);
        write_png(&tmp.path().join("test/bird/a.png"), [0, 0, 0]);

        let source = ImageFolderSource::new(tmp.path(), 4);
        assert!(source.load(Split::Test).is_err());
    }
}
