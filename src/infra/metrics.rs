// ============================================================
// Layer 6 — Metrics
// ============================================================
// Per-epoch bookkeeping for the training loop and the CSV log
// written next to the checkpoint.
//
// Epoch averages are weighted by sample count:
//
//   loss     = Σ (batch_mean_loss · batch_size) / N
//   accuracy = Σ correct / N
//
// so a short final batch counts exactly as much as its samples.
//
// Output file: <checkpoint dir>/metrics.csv
//
//   epoch,seconds,train_loss,train_acc,valid_loss,valid_acc,checkpoint
//   1,41.203,1.873210,0.312400,1.602145,0.418200,true
//   2,40.877,1.512003,0.447650,1.498320,0.461800,true
//   ...

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
    time::Duration,
};

/// Averaged loss and accuracy of one pass over a partition.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhaseStats {
    pub loss:     f64,
    /// Fraction in [0, 1]
    pub accuracy: f64,
}

/// Accumulates batch results into a sample-weighted PhaseStats.
#[derive(Debug, Default, Clone)]
pub struct RunningStats {
    loss_sum: f64,
    correct:  usize,
    count:    usize,
}

impl RunningStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// `batch_loss` is the mean loss over the `batch_size` samples.
    pub fn push(&mut self, batch_loss: f64, correct: usize, batch_size: usize) {
        self.loss_sum += batch_loss * batch_size as f64;
        self.correct  += correct;
        self.count    += batch_size;
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// An empty pass yields NaN loss and zero accuracy.
    pub fn finish(&self) -> PhaseStats {
        if self.count == 0 {
            return PhaseStats { loss: f64::NAN, accuracy: 0.0 };
        }
        PhaseStats {
            loss:     self.loss_sum / self.count as f64,
            accuracy: self.correct as f64 / self.count as f64,
        }
    }
}

/// One row of metrics for a single training epoch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpochMetrics {
    /// Starts at 1
    pub epoch:        usize,
    /// Wall-clock time of train + validation
    pub seconds:      f64,
    pub train:        PhaseStats,
    pub valid:        PhaseStats,
    /// Whether this epoch replaced the best checkpoint
    pub checkpointed: bool,
}

/// Split a duration into whole minutes and remaining whole seconds.
pub fn epoch_time(elapsed: Duration) -> (u64, u64) {
    let secs = elapsed.as_secs();
    (secs / 60, secs % 60)
}

/// Appends epoch metrics to a CSV file.
pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Starts a fresh `metrics.csv` in `dir`, replacing any previous run's log.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        let csv_path = dir.join("metrics.csv");
        let mut f = fs::File::create(&csv_path)?;
        writeln!(f, "epoch,seconds,train_loss,train_acc,valid_loss,valid_acc,checkpoint")?;
        tracing::debug!("Created metrics CSV: '{}'", csv_path.display());

        Ok(Self { csv_path })
    }

    pub fn log(&self, m: &EpochMetrics) -> Result<()> {
        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)?;

        writeln!(
            f,
            "{},{:.3},{:.6},{:.6},{:.6},{:.6},{}",
            m.epoch,
            m.seconds,
            m.train.loss,
            m.train.accuracy,
            m.valid.loss,
            m.valid.accuracy,
            m.checkpointed,
        )?;

        tracing::debug!(
            "Logged epoch {} metrics: train_loss={:.4}, valid_loss={:.4}",
            m.epoch,
            m.train.loss,
            m.valid.loss,
        );
        Ok(())
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_stats_weights_by_sample_count() {
        let mut stats = RunningStats::new();
        stats.push(1.0, 4, 4); // full batch, all correct
        stats.push(4.0, 0, 1); // short final batch
        let out = stats.finish();

        // (1.0*4 + 4.0*1) / 5 = 1.6, not the batch-mean 2.5
        assert!((out.loss - 1.6).abs() < 1e-12);
        assert!((out.accuracy - 0.8).abs() < 1e-12);
        assert_eq!(stats.count(), 5);
    }

    #[test]
    fn test_empty_running_stats() {
        let out = RunningStats::new().finish();
        assert!(out.loss.is_nan());
        assert_eq!(out.accuracy, 0.0);
    }

    #[test]
    fn test_epoch_time() {
        assert_eq!(epoch_time(Duration::from_millis(59_999)), (0, 59));
        assert_eq!(epoch_time(Duration::from_secs(125)), (2, 5));
    }

    #[test]
    fn test_logger_writes_header_and_rows() {
        let tmp    = tempfile::tempdir().unwrap();
        let logger = MetricsLogger::new(tmp.path()).unwrap();
        let stats  = PhaseStats { loss: 0.5, accuracy: 0.75 };
        logger
            .log(&EpochMetrics { epoch: 1, seconds: 2.0, train: stats, valid: stats, checkpointed: true })
            .unwrap();

        let text = fs::read_to_string(logger.csv_path()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("epoch,"));
        assert_eq!(lines[1], "1,2.000,0.500000,0.750000,0.500000,0.750000,true");
    }
}
