// ============================================================
// Layer 2 — EvaluateUseCase
// ============================================================
// Re-runs the test stage of an earlier training run:
//
//   Step 1: Load train_config.json + normalization.json
//           from the checkpoint directory           (Layer 6)
//   Step 2: Load the test split, normalised with the
//           saved statistics                         (Layer 4)
//   Step 3: Rebuild AlexNet, load the best weights,
//           evaluate                                 (Layer 5)
//   Step 4: Error analysis + reports                 (Layer 2 / 6)
//
// Nothing is trained and the checkpoint is only read.

use anyhow::Result;
use burn::tensor::backend::AutodiffBackend;

use crate::application::analysis::{write_reports, ErrorAnalyzer};
use crate::application::train_use_case::{model_config, RunSummary, TrainConfig};
use crate::data::preparer::{eval_loader, prepare_test};
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::{
    device::{BackendTask, DeviceKind, ExecutionContext},
    evaluator::Evaluator,
};

/// Overrides applied on top of the saved training configuration
#[derive(Debug, Clone, Default)]
pub struct EvaluateOptions {
    pub checkpoint_path: String,
    /// Read the test split from somewhere else than during training
    pub source_path:     Option<String>,
    pub batch_size:      Option<usize>,
    pub preview_count:   Option<usize>,
    pub output_dir:      Option<String>,
    pub device:          Option<DeviceKind>,
}

pub struct EvaluateUseCase {
    options: EvaluateOptions,
}

impl EvaluateUseCase {
    pub fn new(options: EvaluateOptions) -> Self {
        Self { options }
    }

    pub fn execute(&self) -> Result<RunSummary> {
        // ── Step 1: Saved run ────────────────────────────────────────────────
        let checkpoints = CheckpointManager::open(&self.options.checkpoint_path)?;
        let saved       = checkpoints.load_config()?;
        let best        = checkpoints.load_best()?;
        tracing::info!(
            "Evaluating checkpoint from epoch {} (valid loss {:.4})",
            best.epoch, best.valid_loss
        );

        let o = &self.options;
        let config = TrainConfig {
            checkpoint_path: o.checkpoint_path.clone(),
            source_path:     o.source_path.clone().unwrap_or(saved.source_path.clone()),
            batch_size:      o.batch_size.unwrap_or(saved.batch_size),
            preview_count:   o.preview_count.unwrap_or(saved.preview_count),
            output_dir:      o.output_dir.clone().unwrap_or(saved.output_dir.clone()),
            device:          o.device.unwrap_or(saved.device),
            ..saved
        };
        anyhow::ensure!(config.batch_size > 0, "batch_size must be positive");

        let ctx = ExecutionContext::resolve(config.device)?;
        ctx.run(EvaluatePipeline { config, checkpoints, best_epoch: best.epoch })
    }
}

struct EvaluatePipeline {
    config:      TrainConfig,
    checkpoints: CheckpointManager,
    best_epoch:  usize,
}

impl BackendTask for EvaluatePipeline {
    type Output = RunSummary;

    fn run<B: AutodiffBackend>(self, device: B::Device) -> Result<RunSummary> {
        let cfg = &self.config;

        // ── Step 2: Test split with the training statistics ──────────────────
        let stats = self.checkpoints.load_stats()?;
        let source = cfg.source();
        let (test, class_names) = prepare_test(source.as_ref(), stats)?;
        tracing::info!("Number of testing examples: {}", test.labels().len());

        // ── Step 3: Best weights → test metrics ──────────────────────────────
        let model_cfg = model_config(cfg, class_names.len(), test.shape())?;
        let evaluator = Evaluator::<B::InnerBackend>::from_checkpoint(&model_cfg, &self.checkpoints, &device)?;
        let loader    = eval_loader::<B::InnerBackend>(test.clone(), cfg.batch_size, &device);
        let result    = evaluator.run(&loader);

        // ── Step 4: Error analysis + reports ─────────────────────────────────
        let analysis = ErrorAnalyzer::new(cfg.preview_count).analyze(&result.records, class_names.len());
        write_reports(&analysis, &test, &class_names, &cfg.output_dir)?;

        Ok(RunSummary {
            best_epoch: self.best_epoch,
            test:       result.stats,
            incorrect:  analysis.incorrect,
        })
    }
}
