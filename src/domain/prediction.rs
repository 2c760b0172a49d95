// ============================================================
// Layer 3 — Predictions and Error Analysis
// ============================================================
// A PredictionRecord is what the evaluator produces for every
// test example: the true label, the arg-max prediction, and the
// full softmax probability vector.
//
// Two analyses run on top of the records:
//
//   most_confident_errors — keeps only the wrong predictions and
//                           orders them by the probability the
//                           model gave its (wrong) answer, highest
//                           first
//
//   ConfusionMatrix       — counts[true][predicted] over all
//                           records
//
// Ranking uses a stable sort, so records with equal confidence
// keep their test-set order. Nothing downstream relies on that
// tie order.

use serde::{Deserialize, Serialize};

/// The model's verdict on a single test example.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    /// Position of the example in the (fixed-order) test partition
    pub index: usize,
    /// Ground-truth class
    pub label: usize,
    /// Arg-max of `probabilities`
    pub predicted: usize,
    /// Softmax output, one entry per class
    pub probabilities: Vec<f32>,
}

impl PredictionRecord {
    /// Build a record, deriving the predicted class as the arg-max.
    /// On equal probabilities the lowest class index wins.
    pub fn from_probabilities(index: usize, label: usize, probabilities: Vec<f32>) -> Self {
        let predicted = argmax(&probabilities);
        Self { index, label, predicted, probabilities }
    }

    pub fn is_correct(&self) -> bool {
        self.predicted == self.label
    }

    /// Probability assigned to the predicted class
    pub fn confidence(&self) -> f32 {
        self.probabilities
            .get(self.predicted)
            .copied()
            .unwrap_or(0.0)
    }
}

fn argmax(values: &[f32]) -> usize {
    let mut best = 0usize;
    for (i, v) in values.iter().enumerate() {
        if *v > values[best] {
            best = i;
        }
    }
    best
}

/// Incorrect predictions, most confident first, at most `limit` of them.
pub fn most_confident_errors(records: &[PredictionRecord], limit: usize) -> Vec<&PredictionRecord> {
    let mut wrong: Vec<&PredictionRecord> = records
        .iter()
        .filter(|r| !r.is_correct())
        .collect();

    // sort_by is stable: ties keep test order
    wrong.sort_by(|a, b| b.confidence().total_cmp(&a.confidence()));
    wrong.truncate(limit);
    wrong
}

// ─── Confusion Matrix ─────────────────────────────────────────────────────────
/// Square matrix of prediction counts, rows = true class,
/// columns = predicted class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    counts: Vec<Vec<usize>>,
}

impl ConfusionMatrix {
    pub fn from_records(records: &[PredictionRecord], num_classes: usize) -> Self {
        let mut counts = vec![vec![0usize; num_classes]; num_classes];
        for r in records {
            if let Some(cell) = counts
                .get_mut(r.label)
                .and_then(|row| row.get_mut(r.predicted))
            {
                *cell += 1;
            }
        }
        Self { counts }
    }

    pub fn num_classes(&self) -> usize {
        self.counts.len()
    }

    pub fn count(&self, label: usize, predicted: usize) -> usize {
        self.counts[label][predicted]
    }

    pub fn rows(&self) -> &[Vec<usize>] {
        &self.counts
    }

    pub fn total(&self) -> usize {
        self.counts.iter().flatten().sum()
    }

    pub fn correct(&self) -> usize {
        (0..self.num_classes()).map(|i| self.counts[i][i]).sum()
    }

    /// Largest single cell, used to scale heat-map colours
    pub fn max_count(&self) -> usize {
        self.counts.iter().flatten().copied().max().unwrap_or(0)
    }

    /// Recall per true class; `None` for classes absent from the test set
    pub fn per_class_accuracy(&self) -> Vec<Option<f64>> {
        self.counts
            .iter()
            .enumerate()
            .map(|(i, row)| {
                let support: usize = row.iter().sum();
                (support > 0).then(|| row[i] as f64 / support as f64)
            })
            .collect()
    }
}
