// ============================================================
// Layer 5 — Evaluator
// ============================================================
// Reloads the best checkpoint into a freshly initialised model
// and makes one pass over the test loader, collecting:
//
//   - average loss / accuracy (same arithmetic as validation)
//   - a PredictionRecord per example: true label, arg-max class,
//     softmax probabilities
//
// Records are indexed by position in the test partition, which
// the fixed-order test loader preserves, so the raw image can be
// looked up again for visualisation.
use anyhow::Result;
use burn::{nn::loss::CrossEntropyLossConfig, prelude::*, tensor::activation::softmax};

use crate::data::preparer::BatchLoader;
use crate::domain::prediction::PredictionRecord;
use crate::infra::{checkpoint::CheckpointManager, metrics::{PhaseStats, RunningStats}};
use crate::ml::model::{AlexNet, AlexNetConfig};
use crate::ml::trainer::count_correct;

/// Result of one pass over the test split
#[derive(Debug, Clone)]
pub struct TestResult {
    pub stats:   PhaseStats,
    pub records: Vec<PredictionRecord>,
}

pub struct Evaluator<B: Backend> {
    model: AlexNet<B>,
}

impl<B: Backend> Evaluator<B> {
    /// Build a model from `config` and overwrite its parameters with the
    /// best checkpoint.
    pub fn from_checkpoint(
        config:      &AlexNetConfig,
        checkpoints: &CheckpointManager,
        device:      &B::Device,
    ) -> Result<Self> {
        let model = config.init::<B>(device);
        let model = checkpoints.load_model(model, device)?;
        tracing::info!("Model loaded from checkpoint '{}'", checkpoints.model_file().display());
        Ok(Self { model })
    }

    pub fn new(model: AlexNet<B>) -> Self {
        Self { model }
    }

    pub fn run(&self, loader: &BatchLoader<B>) -> TestResult {
        let mut stats   = RunningStats::new();
        let mut records = Vec::new();

        for batch in loader.iter() {
            let [batch_size, _, _, _] = batch.images.dims();
            let logits = self.model.forward(batch.images);
            let loss   = CrossEntropyLossConfig::new()
                .init(&logits.device())
                .forward(logits.clone(), batch.targets.clone());

            let correct = count_correct(logits.clone(), batch.targets.clone());
            stats.push(loss.into_scalar().elem::<f64>(), correct, batch_size);

            let [_, num_classes] = logits.dims();
            let probabilities: Vec<f32> = softmax(logits, 1).into_data().iter::<f32>().collect();
            let labels: Vec<i64>        = batch.targets.into_data().iter::<i64>().collect();

            for (row, label) in probabilities.chunks(num_classes).zip(labels) {
                let index = records.len();
                records.push(PredictionRecord::from_probabilities(index, label as usize, row.to_vec()));
            }
        }

        TestResult { stats: stats.finish(), records }
    }
}
