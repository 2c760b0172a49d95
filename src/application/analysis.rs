// ============================================================
// Layer 2 — Error Analysis
// ============================================================
// Runs after every evaluation, for `train` and `evaluate` alike:
//
//   PredictionRecords ──► ErrorAnalyzer ──► ErrorAnalysis
//                                             │
//                              write_reports ◄┘
//                                │
//                                ├─ confusion_matrix.svg
//                                └─ most_incorrect.png / .json
//
// Only the `preview_count` most confident mistakes are kept for
// plotting; the confusion matrix covers every test example.

use anyhow::{Context, Result};
use std::{fs, path::Path};

use crate::data::dataset::ImageDataset;
use crate::domain::prediction::{most_confident_errors, ConfusionMatrix, PredictionRecord};
use crate::infra::plots::{write_confusion_matrix_svg, write_error_grid};

#[derive(Debug, Clone)]
pub struct ErrorAnalysis {
    pub confusion:  ConfusionMatrix,
    /// Total number of misclassified test examples
    pub incorrect:  usize,
    /// Most confident mistakes first, at most `preview_count`
    pub top_errors: Vec<PredictionRecord>,
}

pub struct ErrorAnalyzer {
    preview_count: usize,
}

impl ErrorAnalyzer {
    pub fn new(preview_count: usize) -> Self {
        Self { preview_count }
    }

    pub fn analyze(&self, records: &[PredictionRecord], num_classes: usize) -> ErrorAnalysis {
        let confusion  = ConfusionMatrix::from_records(records, num_classes);
        let incorrect  = records.iter().filter(|r| !r.is_correct()).count();
        let top_errors = most_confident_errors(records, self.preview_count)
            .into_iter()
            .cloned()
            .collect();

        tracing::info!("{} of {} test examples misclassified", incorrect, records.len());
        ErrorAnalysis { confusion, incorrect, top_errors }
    }
}

/// Write the confusion matrix and error grid under `output_dir`.
pub fn write_reports(
    analysis:    &ErrorAnalysis,
    test:        &ImageDataset,
    class_names: &[String],
    output_dir:  impl AsRef<Path>,
) -> Result<()> {
    let dir = output_dir.as_ref();
    fs::create_dir_all(dir)
        .with_context(|| format!("Cannot create output directory '{}'", dir.display()))?;

    for (class, accuracy) in analysis.confusion.per_class_accuracy().iter().enumerate() {
        let name = class_names.get(class).map(String::as_str).unwrap_or("?");
        match accuracy {
            Some(acc) => tracing::info!("  {:<12} {:>6.2}%", name, acc * 100.0),
            None      => tracing::info!("  {:<12}    n/a", name),
        }
    }

    write_confusion_matrix_svg(&analysis.confusion, class_names, &dir.join("confusion_matrix.svg"))?;

    if analysis.top_errors.is_empty() {
        tracing::info!("No misclassified images to plot");
        return Ok(());
    }
    let refs: Vec<&PredictionRecord> = analysis.top_errors.iter().collect();
    write_error_grid(
        &refs,
        |index| test.raw(index),
        test.shape(),
        class_names,
        &dir.join("most_incorrect"),
    )?;
    Ok(())
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::normalizer::{ChannelStats, Normalizer};
    use crate::domain::image::{ImageShape, RawImage};

    fn record(index: usize, label: usize, probabilities: Vec<f32>) -> PredictionRecord {
        PredictionRecord::from_probabilities(index, label, probabilities)
    }

    fn records() -> Vec<PredictionRecord> {
        vec![
            record(0, 0, vec![0.9, 0.1]),  // correct
            record(1, 0, vec![0.3, 0.7]),  // wrong, 0.7
            record(2, 1, vec![0.95, 0.05]), // wrong, 0.95
            record(3, 1, vec![0.4, 0.6]),  // correct
            record(4, 1, vec![0.7, 0.3]),  // wrong, 0.7
        ]
    }

    #[test]
    fn test_analyze_ranks_and_limits() {
        let analysis = ErrorAnalyzer::new(2).analyze(&records(), 2);
        assert_eq!(analysis.incorrect, 3);
        let order: Vec<usize> = analysis.top_errors.iter().map(|r| r.index).collect();
        assert_eq!(order, vec![2, 1]);
        assert_eq!(analysis.confusion.count(1, 0), 2);
        assert_eq!(analysis.confusion.correct(), 2);
    }

    #[test]
    fn test_preview_larger_than_errors_returns_all() {
        let analysis = ErrorAnalyzer::new(25).analyze(&records(), 2);
        assert_eq!(analysis.top_errors.len(), 3);
        assert!(analysis.top_errors.iter().all(|r| !r.is_correct()));
    }

    #[test]
    fn test_write_reports_creates_files() {
        let tmp   = tempfile::tempdir().unwrap();
        let shape = ImageShape::new(3, 2, 2);
        let stats = ChannelStats { mean: vec![0.0; 3], std: vec![1.0; 3] };
        let test  = ImageDataset::new(
            (0..5).map(|i| RawImage::new(vec![i as u8 * 40; 12], i % 2)).collect(),
            shape,
            Normalizer::new(stats, shape),
        );
        let names    = vec!["a".to_string(), "b".to_string()];
        let analysis = ErrorAnalyzer::new(25).analyze(&records(), 2);

        write_reports(&analysis, &test, &names, tmp.path().join("plots")).unwrap();

        let out = tmp.path().join("plots");
        assert!(out.join("confusion_matrix.svg").exists());
        assert!(out.join("most_incorrect.png").exists());
        assert!(out.join("most_incorrect.json").exists());
    }

    #[test]
    fn test_no_errors_skips_grid() {
        let tmp   = tempfile::tempdir().unwrap();
        let shape = ImageShape::new(3, 2, 2);
        let stats = ChannelStats { mean: vec![0.0; 3], std: vec![1.0; 3] };
        let test  = ImageDataset::new(vec![RawImage::new(vec![0; 12], 0)], shape, Normalizer::new(stats, shape));
        let names = vec!["a".to_string(), "b".to_string()];
        let analysis = ErrorAnalyzer::new(5).analyze(&[record(0, 0, vec![0.8, 0.2])], 2);

        write_reports(&analysis, &test, &names, tmp.path()).unwrap();
        assert!(tmp.path().join("confusion_matrix.svg").exists());
        assert!(!tmp.path().join("most_incorrect.png").exists());
    }
}
