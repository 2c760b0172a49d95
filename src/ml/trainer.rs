// ============================================================
// Layer 5 — Training Loop
// ============================================================
// Runs `epochs` rounds of train + validate, driven by the
// EpochCycle state machine:
//
//   Training   — forward, cross-entropy, backward, optimizer step
//                for every batch of the shuffled train loader
//   Validating — forward + loss only, on model.valid() (inner
//                backend: no autograph, dropout disabled)
//   decision   — strictly lower validation loss → save checkpoint
//
// Key Burn insight:
//   - Training runs on B (an AutodiffBackend) for gradients
//   - model.valid() returns the model on B::InnerBackend
//   - Validation/test loaders are therefore built on the inner backend
//   - argmax(1) returns [batch, 1] so we flatten before .equal()
//
// Reference: Burn Book §5, Krizhevsky et al. (2012) AlexNet

use anyhow::Result;
use burn::{
    module::AutodiffModule,
    nn::loss::CrossEntropyLossConfig,
    optim::{momentum::MomentumConfig, AdamConfig, GradientsParams, Optimizer, SgdConfig},
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use crate::data::preparer::{BatchLoader, Loaders};
use crate::domain::cycle::{CheckpointDecision, EpochCycle};
use crate::infra::{
    checkpoint::{BestCheckpoint, CheckpointManager},
    metrics::{epoch_time, EpochMetrics, MetricsLogger, PhaseStats, RunningStats},
};
use crate::ml::model::AlexNet;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptimizerKind {
    /// SGD with classical momentum (no dampening)
    #[default]
    Sgd,
    Adam,
}

impl OptimizerKind {
    /// Learning rate used when none is given: 0.01 for SGD, 1e-3 for Adam
    pub fn default_learning_rate(self) -> f64 {
        match self {
            Self::Sgd  => 0.01,
            Self::Adam => 1e-3,
        }
    }
}

/// What `fit` hands back besides the final model.
#[derive(Debug, Clone)]
pub struct TrainingReport {
    pub history:         Vec<EpochMetrics>,
    /// None only when no epoch produced a finite validation loss
    pub best_epoch:      Option<usize>,
    pub best_valid_loss: f64,
}

pub struct TrainingLoop<'a> {
    epochs:        usize,
    learning_rate: f64,
    momentum:      f64,
    optimizer:     OptimizerKind,
    checkpoints:   &'a CheckpointManager,
    metrics:       Option<MetricsLogger>,
}

impl<'a> TrainingLoop<'a> {
    pub fn new(epochs: usize, learning_rate: f64, checkpoints: &'a CheckpointManager) -> Self {
        Self {
            epochs,
            learning_rate,
            momentum: 0.0,
            optimizer: OptimizerKind::Sgd,
            checkpoints,
            metrics: None,
        }
    }

    pub fn with_optimizer(mut self, optimizer: OptimizerKind, momentum: f64) -> Self {
        self.optimizer = optimizer;
        self.momentum  = momentum;
        self
    }

    /// Append every epoch to a metrics CSV as well as stdout.
    pub fn with_metrics(mut self, logger: MetricsLogger) -> Self {
        self.metrics = Some(logger);
        self
    }

    /// Build the configured optimizer and run the loop.
    pub fn run<B: AutodiffBackend>(
        &self,
        model:   AlexNet<B>,
        loaders: &Loaders<B>,
    ) -> Result<(AlexNet<B>, TrainingReport)> {
        match self.optimizer {
            OptimizerKind::Sgd => {
                // v = μ·v + g ;  θ = θ - lr·v
                let momentum = MomentumConfig::new()
                    .with_momentum(self.momentum)
                    .with_dampening(0.0);
                let optim = SgdConfig::new()
                    .with_momentum(Some(momentum))
                    .init::<B, AlexNet<B>>();
                tracing::info!("Optimizer: SGD (lr={}, momentum={})", self.learning_rate, self.momentum);
                self.fit(model, optim, loaders)
            }
            OptimizerKind::Adam => {
                let optim = AdamConfig::new()
                    .with_epsilon(1e-8)
                    .init::<B, AlexNet<B>>();
                tracing::info!("Optimizer: Adam (lr={})", self.learning_rate);
                self.fit(model, optim, loaders)
            }
        }
    }

    /// Train for the configured number of epochs with `optim`.
    ///
    /// Returns the model as it stands after the LAST epoch; the best
    /// one lives in the checkpoint.
    pub fn fit<B, O>(
        &self,
        mut model: AlexNet<B>,
        mut optim: O,
        loaders:   &Loaders<B>,
    ) -> Result<(AlexNet<B>, TrainingReport)>
    where
        B: AutodiffBackend,
        O: Optimizer<AlexNet<B>, B>,
    {
        let mut cycle   = EpochCycle::new(self.epochs);
        let mut history = Vec::with_capacity(self.epochs);

        while !cycle.is_finished() {
            let epoch = cycle.epoch();
            let start = Instant::now();

            // ── Training phase ────────────────────────────────────────────────
            let (trained, train) = train_epoch(model, &mut optim, &loaders.train, self.learning_rate);
            model = trained;
            cycle.end_training()?;

            // ── Validation phase ──────────────────────────────────────────────
            let valid   = evaluate(&model.valid(), &loaders.valid);
            let elapsed = start.elapsed();

            // ── Checkpoint decision ───────────────────────────────────────────
            let checkpointed = cycle.end_validation(valid.loss)? == CheckpointDecision::Save;
            if checkpointed {
                self.checkpoints.save_model(
                    &model,
                    &BestCheckpoint { epoch, valid_loss: valid.loss, valid_accuracy: valid.accuracy },
                )?;
                tracing::info!("Validation loss improved to {:.4}, checkpoint saved", valid.loss);
            }

            let metrics = EpochMetrics {
                epoch,
                seconds: elapsed.as_secs_f64(),
                train,
                valid,
                checkpointed,
            };
            print_epoch(&metrics, elapsed);
            if let Some(logger) = &self.metrics {
                logger.log(&metrics)?;
            }
            history.push(metrics);
        }

        tracing::info!("Training complete!");
        let report = TrainingReport {
            history,
            best_epoch:      cycle.best_epoch(),
            best_valid_loss: cycle.best_valid_loss(),
        };
        Ok((model, report))
    }
}

fn train_epoch<B, O>(
    mut model:     AlexNet<B>,
    optim:         &mut O,
    loader:        &BatchLoader<B>,
    learning_rate: f64,
) -> (AlexNet<B>, PhaseStats)
where
    B: AutodiffBackend,
    O: Optimizer<AlexNet<B>, B>,
{
    let mut stats = RunningStats::new();

    for batch in loader.iter() {
        let batch_size = batch.targets.dims()[0];
        let logits     = model.forward(batch.images);
        let loss       = CrossEntropyLossConfig::new()
            .init(&logits.device())
            .forward(logits.clone(), batch.targets.clone());

        let correct = count_correct(logits.detach(), batch.targets);
        stats.push(loss.clone().into_scalar().elem::<f64>(), correct, batch_size);

        // Backward pass + optimizer update
        let grads = GradientsParams::from_grads(loss.backward(), &model);
        model = optim.step(learning_rate, model, grads);
    }

    (model, stats.finish())
}

/// Average loss and accuracy of `model` over one traversal of `loader`.
///
/// Shared by the validation phase and the evaluator so both report
/// the exact same quantities.
pub fn evaluate<B: Backend>(model: &AlexNet<B>, loader: &BatchLoader<B>) -> PhaseStats {
    let mut stats = RunningStats::new();

    for batch in loader.iter() {
        let batch_size = batch.targets.dims()[0];
        let logits     = model.forward(batch.images);
        let loss       = CrossEntropyLossConfig::new()
            .init(&logits.device())
            .forward(logits.clone(), batch.targets.clone());

        let correct = count_correct(logits, batch.targets);
        stats.push(loss.into_scalar().elem::<f64>(), correct, batch_size);
    }

    stats.finish()
}

/// Number of rows whose arg-max equals the target.
pub fn count_correct<B: Backend>(logits: Tensor<B, 2>, targets: Tensor<B, 1, Int>) -> usize {
    // argmax(1) is [batch, 1]; flatten to [batch] to match targets
    let correct: i64 = logits
        .argmax(1)
        .flatten::<1>(0, 1)
        .equal(targets)
        .int()
        .sum()
        .into_scalar()
        .elem::<i64>();
    correct as usize
}

fn print_epoch(m: &EpochMetrics, elapsed: Duration) {
    let (mins, secs) = epoch_time(elapsed);
    println!("Epoch: {:02} | Epoch Time: {}m {}s", m.epoch, mins, secs);
    println!("\tTrain Loss: {:.3} | Train Acc: {:.2}%", m.train.loss, m.train.accuracy * 100.0);
    println!("\t Val. Loss: {:.3} |  Val. Acc: {:.2}%", m.valid.loss, m.valid.accuracy * 100.0);
}
