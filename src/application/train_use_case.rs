// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates the full training pipeline in order:
//
//   Step 1: Validate config, resolve seed + device
//   Step 2: Load, normalise and split the images   (Layer 4 - data)
//   Step 3: Save config + statistics               (Layer 6 - infra)
//   Step 4: Run the training loop                  (Layer 5 - ml)
//   Step 5: Reload the best checkpoint, test it    (Layer 5 - ml)
//   Step 6: Error analysis + report artefacts      (Layer 2 / 6)
//
// Steps 2-6 run inside a BackendTask so the same code serves
// both the GPU and the CPU backend.
//
// Reference: Rust Book §13 (Iterators and Closures)
//            Burn Book §5 (Training)

use anyhow::{ensure, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::application::analysis::{write_reports, ErrorAnalyzer};
use crate::data::{
    loader::{Cifar10BinarySource, ImageFolderSource},
    preparer::DataPreparer,
};
use crate::domain::image::ImageShape;
use crate::domain::traits::ImageSource;
use crate::infra::{
    checkpoint::CheckpointManager,
    metrics::{MetricsLogger, PhaseStats},
};
use crate::ml::{
    device::{BackendTask, DeviceKind, ExecutionContext},
    evaluator::Evaluator,
    model::AlexNetConfig,
    trainer::{OptimizerKind, TrainingLoop},
};

// ─── Source Format ────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceFormat {
    /// data_batch_*.bin / test_batch.bin
    #[default]
    Cifar10Binary,
    /// train/<class>/*, test/<class>/*
    ImageFolder,
}

// ─── Training Configuration ──────────────────────────────────────────────────
// All parameters of a run. Serialisable so `evaluate` can rebuild
// the same model and data pipeline later.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    pub source_path:     String,
    pub source_format:   SourceFormat,
    pub batch_size:      usize,
    /// Fraction of the training pool used for training, in (0, 1)
    pub split_ratio:     f64,
    pub epoch_count:     usize,
    /// Checkpoint location; the recorder chooses the extension
    pub checkpoint_path: String,
    pub learning_rate:   f64,
    /// SGD only
    pub momentum:        f64,
    pub optimizer:       OptimizerKind,
    /// None → drawn at random and logged
    pub seed:            Option<u64>,
    /// How many misclassified images to plot
    pub preview_count:   usize,
    /// Side length for image-folder sources (CIFAR-10 is always 32)
    pub image_size:      usize,
    pub dropout:         f64,
    pub output_dir:      String,
    pub device:          DeviceKind,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            source_path:     "data".to_string(),
            source_format:   SourceFormat::Cifar10Binary,
            batch_size:      128,
            split_ratio:     0.8,
            epoch_count:     10,
            checkpoint_path: "save_trained_model/AlexNet".to_string(),
            learning_rate:   OptimizerKind::Sgd.default_learning_rate(),
            momentum:        0.5,
            optimizer:       OptimizerKind::Sgd,
            seed:            None,
            preview_count:   25,
            image_size:      32,
            dropout:         0.5,
            output_dir:      "plots".to_string(),
            device:          DeviceKind::Auto,
        }
    }
}

impl TrainConfig {
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.split_ratio > 0.0 && self.split_ratio < 1.0,
            "split_ratio must be in (0, 1), got {}",
            self.split_ratio
        );
        ensure!(self.batch_size > 0, "batch_size must be positive");
        ensure!(self.epoch_count > 0, "epoch_count must be positive");
        ensure!(
            self.image_size > 0 && self.image_size % 16 == 0,
            "image_size must be a positive multiple of 16, got {}",
            self.image_size
        );
        ensure!(
            self.learning_rate.is_finite() && self.learning_rate > 0.0,
            "learning_rate must be positive, got {}",
            self.learning_rate
        );
        ensure!(
            (0.0..1.0).contains(&self.momentum),
            "momentum must be in [0, 1), got {}",
            self.momentum
        );
        ensure!(
            (0.0..1.0).contains(&self.dropout),
            "dropout must be in [0, 1), got {}",
            self.dropout
        );
        Ok(())
    }

    /// The image source this config points at
    pub fn source(&self) -> Box<dyn ImageSource> {
        match self.source_format {
            SourceFormat::Cifar10Binary => Box::new(Cifar10BinarySource::new(&self.source_path)),
            SourceFormat::ImageFolder   => {
                Box::new(ImageFolderSource::new(&self.source_path, self.image_size))
            }
        }
    }
}

/// AlexNet sized for `shape` images and `num_classes` outputs.
pub fn model_config(cfg: &TrainConfig, num_classes: usize, shape: ImageShape) -> Result<AlexNetConfig> {
    ensure!(
        shape.height == shape.width && shape.height % 16 == 0,
        "AlexNet needs square images with a side divisible by 16, got {}x{}",
        shape.height,
        shape.width
    );
    ensure!(num_classes > 1, "need at least two classes, got {num_classes}");

    Ok(AlexNetConfig::new(num_classes)
        .with_image_size(shape.height)
        .with_in_channels(shape.channels)
        .with_dropout(cfg.dropout))
}

/// What a finished run reports back to the CLI
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub best_epoch: usize,
    pub test:       PhaseStats,
    pub incorrect:  usize,
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    /// Execute the full training pipeline end to end
    pub fn execute(&self) -> Result<RunSummary> {
        // ── Step 1: Config, seed, device ─────────────────────────────────────
        self.config.validate()?;

        let seed = match self.config.seed {
            Some(seed) => seed,
            None => {
                let seed = rand::thread_rng().gen::<u64>();
                tracing::info!("No seed given, using {}", seed);
                seed
            }
        };
        // Record the seed actually used so the run can be repeated
        let config = TrainConfig { seed: Some(seed), ..self.config.clone() };

        let ctx = ExecutionContext::resolve(config.device)?;
        ctx.run(TrainPipeline { config, seed })
    }
}

struct TrainPipeline {
    config: TrainConfig,
    seed:   u64,
}

impl BackendTask for TrainPipeline {
    type Output = RunSummary;

    fn run<B: burn::tensor::backend::AutodiffBackend>(self, device: B::Device) -> Result<RunSummary> {
        let cfg = &self.config;

        // ── Step 2: Data ─────────────────────────────────────────────────────
        tracing::info!("Loading images from '{}' ({:?})", cfg.source_path, cfg.source_format);
        let source   = cfg.source();
        let prepared = DataPreparer::new(source.as_ref(), cfg.split_ratio, self.seed).prepare()?;
        let loaders  = prepared.loaders::<B>(cfg.batch_size, self.seed, &device);

        // ── Step 3: Persist what `evaluate` needs ────────────────────────────
        let checkpoints = CheckpointManager::new(&cfg.checkpoint_path)?;
        checkpoints.save_config(cfg)?;
        checkpoints.save_stats(&prepared.stats)?;

        // ── Step 4: Train ────────────────────────────────────────────────────
        let model_cfg = model_config(cfg, prepared.num_classes(), prepared.shape)?;
        let model     = model_cfg.init::<B>(&device);
        tracing::info!(
            "Model ready: AlexNet, {} classes, {}x{} input",
            model_cfg.num_classes, model_cfg.image_size, model_cfg.image_size
        );

        let (_, report) = TrainingLoop::new(cfg.epoch_count, cfg.learning_rate, &checkpoints)
            .with_optimizer(cfg.optimizer, cfg.momentum)
            .with_metrics(MetricsLogger::new(checkpoints.dir())?)
            .run(model, &loaders)?;

        let best_epoch = report.best_epoch.ok_or_else(|| {
            anyhow::anyhow!("no epoch produced a finite validation loss; nothing was checkpointed")
        })?;
        tracing::info!("Best epoch: {} (valid loss {:.4})", best_epoch, report.best_valid_loss);

        // ── Step 5: Test the best checkpoint, not the last model ─────────────
        let evaluator = Evaluator::<B::InnerBackend>::from_checkpoint(&model_cfg, &checkpoints, &device)?;
        let result    = evaluator.run(&loaders.test);

        // ── Step 6: Error analysis + reports ─────────────────────────────────
        let analysis = ErrorAnalyzer::new(cfg.preview_count).analyze(&result.records, prepared.num_classes());
        write_reports(&analysis, &prepared.test, &prepared.class_names, &cfg.output_dir)?;

        Ok(RunSummary {
            best_epoch,
            test:      result.stats,
            incorrect: analysis.incorrect,
        })
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let cfg = TrainConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.batch_size, 128);
        assert_eq!(cfg.epoch_count, 10);
        assert_eq!(cfg.preview_count, 25);
        assert_eq!(cfg.optimizer, OptimizerKind::Sgd);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let bad = [
            TrainConfig { split_ratio: 1.0, ..TrainConfig::default() },
            TrainConfig { split_ratio: 0.0, ..TrainConfig::default() },
            TrainConfig { batch_size: 0, ..TrainConfig::default() },
            TrainConfig { epoch_count: 0, ..TrainConfig::default() },
            TrainConfig { image_size: 40, ..TrainConfig::default() },
            TrainConfig { learning_rate: 0.0, ..TrainConfig::default() },
            TrainConfig { momentum: 1.0, ..TrainConfig::default() },
        ];
        for cfg in bad {
            assert!(cfg.validate().is_err(), "{cfg:?}");
        }
        assert!(TrainConfig { preview_count: 0, ..TrainConfig::default() }.validate().is_ok());
    }

    #[test]
    fn test_model_config_follows_image_shape() {
        let cfg   = TrainConfig { dropout: 0.25, ..TrainConfig::default() };
        let model = model_config(&cfg, 10, ImageShape::new(1, 64, 64)).unwrap();
        assert_eq!(model.image_size, 64);
        assert_eq!(model.in_channels, 1);
        assert_eq!(model.dropout, 0.25);

        assert!(model_config(&cfg, 10, ImageShape::new(3, 32, 48)).is_err());
        assert!(model_config(&cfg, 1, ImageShape::new(3, 32, 32)).is_err());
    }

    #[test]
    fn test_config_json_uses_lowercase_enums() {
        let json = serde_json::to_string(&TrainConfig::default()).unwrap();
        assert!(json.contains("\"source_format\":\"cifar10_binary\""));
        assert!(json.contains("\"optimizer\":\"sgd\""));
        assert!(json.contains("\"device\":\"auto\""));
    }
}
