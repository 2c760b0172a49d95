// ============================================================
// Layer 3 — Epoch Cycle State Machine
// ============================================================
// Every epoch is exactly one Training phase followed by exactly
// one Validating phase:
//
//   Training(1) → Validating(1) → Training(2) → ... → Finished
//                      │
//                      └─ checkpoint decision taken here
//
// The checkpoint decision is the guarded transition out of
// Validating: parameters are persisted only when the epoch's
// validation loss is strictly lower than every earlier one.
// Ties, regressions and NaN losses leave the checkpoint alone.

use anyhow::{ensure, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Training,
    Validating,
    Finished,
}

/// Outcome of leaving the Validating state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckpointDecision {
    Save,
    Keep,
}

#[derive(Debug, Clone)]
pub struct EpochCycle {
    epochs:          usize,
    epoch:           usize,
    phase:           Phase,
    best_valid_loss: f64,
    best_epoch:      Option<usize>,
}

impl EpochCycle {
    pub fn new(epochs: usize) -> Self {
        Self {
            epochs,
            epoch: 1,
            phase: if epochs == 0 { Phase::Finished } else { Phase::Training },
            best_valid_loss: f64::INFINITY,
            best_epoch: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Current epoch, 1-based
    pub fn epoch(&self) -> usize {
        self.epoch
    }

    pub fn best_valid_loss(&self) -> f64 {
        self.best_valid_loss
    }

    /// Epoch whose parameters were last persisted
    pub fn best_epoch(&self) -> Option<usize> {
        self.best_epoch
    }

    pub fn is_finished(&self) -> bool {
        self.phase == Phase::Finished
    }

    /// Training → Validating
    pub fn end_training(&mut self) -> Result<()> {
        ensure!(
            self.phase == Phase::Training,
            "cannot end training in phase {:?}",
            self.phase
        );
        self.phase = Phase::Validating;
        Ok(())
    }

    /// Validating → Training (next epoch) or Finished.
    /// Returns whether the parameters of this epoch must be persisted.
    pub fn end_validation(&mut self, valid_loss: f64) -> Result<CheckpointDecision> {
        ensure!(
            self.phase == Phase::Validating,
            "cannot end validation in phase {:?}",
            self.phase
        );

        let decision = if valid_loss < self.best_valid_loss {
            self.best_valid_loss = valid_loss;
            self.best_epoch      = Some(self.epoch);
            CheckpointDecision::Save
        } else {
            CheckpointDecision::Keep
        };

        self.epoch += 1;
        self.phase = if self.epoch > self.epochs {
            Phase::Finished
        } else {
            Phase::Training
        };
        Ok(decision)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    /// Drive a full cycle with the given validation losses and
    /// return the 1-based epochs at which a checkpoint was written.
    fn saved_epochs(losses: &[f64]) -> Vec<usize> {
        let mut cycle = EpochCycle::new(losses.len());
        let mut saved = Vec::new();
        for &loss in losses {
            let epoch = cycle.epoch();
            cycle.end_training().unwrap();
            if cycle.end_validation(loss).unwrap() == CheckpointDecision::Save {
                saved.push(epoch);
            }
        }
        assert!(cycle.is_finished());
        saved
    }

    #[test]
    fn test_saves_only_on_strict_improvement() {
        assert_eq!(saved_epochs(&[0.9, 0.5, 0.7, 0.3]), vec![1, 2, 4]);
    }

    #[test]
    fn test_ties_do_not_overwrite() {
        assert_eq!(saved_epochs(&[0.5, 0.5, 0.5]), vec![1]);
    }

    #[test]
    fn test_nan_loss_never_saves() {
        assert_eq!(saved_epochs(&[f64::NAN, 0.4, f64::NAN]), vec![2]);
    }

    #[test]
    fn test_best_tracking() {
        let mut cycle = EpochCycle::new(3);
        for loss in [0.8, 0.6, 0.9] {
            cycle.end_training().unwrap();
            cycle.end_validation(loss).unwrap();
        }
        assert_eq!(cycle.best_epoch(), Some(2));
        assert!((cycle.best_valid_loss() - 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_phases_alternate() {
        let mut cycle = EpochCycle::new(2);
        assert_eq!(cycle.phase(), Phase::Training);
        cycle.end_training().unwrap();
        assert_eq!(cycle.phase(), Phase::Validating);
        cycle.end_validation(1.0).unwrap();
        assert_eq!(cycle.phase(), Phase::Training);
        assert_eq!(cycle.epoch(), 2);
    }

    #[test]
    fn test_out_of_order_transitions_are_rejected() {
        let mut cycle = EpochCycle::new(1);
        assert!(cycle.end_validation(1.0).is_err());
        cycle.end_training().unwrap();
        assert!(cycle.end_training().is_err());
    }

    #[test]
    fn test_zero_epochs_starts_finished() {
        let cycle = EpochCycle::new(0);
        assert!(cycle.is_finished());
        assert_eq!(cycle.best_epoch(), None);
    }
}
