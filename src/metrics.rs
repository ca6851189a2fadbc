use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};
use ndarray::Array2;
use serde::Serialize;

use crate::error::PipelineError;

fn check_lengths(truth: &[u32], predicted: &[u32]) -> Result<(), PipelineError> {
    if truth.len() != predicted.len() {
        return Err(PipelineError::ShapeMismatch {
            what: "truth and prediction counts must match",
            expected: vec![truth.len()],
            actual: vec![predicted.len()],
        });
    }
    Ok(())
}

/// Fraction of positions where `predicted` equals `truth`; `0.0` when empty.
pub fn accuracy(truth: &[u32], predicted: &[u32]) -> f64 {
    if truth.is_empty() {
        return 0.0;
    }
    let correct = truth.iter().zip(predicted).filter(|(t, p)| t == p).count();
    correct as f64 / truth.len() as f64
}

// ---------------------------------------------------------------------------
// Confusion matrix
// ---------------------------------------------------------------------------

/// Counts indexed `[true class, predicted class]` over an ordered label list.
#[derive(Debug, Clone)]
pub struct ConfusionMatrix {
    labels: Vec<u32>,
    counts: Array2<u64>,
    /// Pairs where either side is not in `labels`.
    outside: u64,
}

impl ConfusionMatrix {
    pub fn new(truth: &[u32], predicted: &[u32], labels: &[u32]) -> Result<Self, PipelineError> {
        check_lengths(truth, predicted)?;
        let position = |label: u32| labels.iter().position(|&l| l == label);

        let mut counts = Array2::zeros((labels.len(), labels.len()));
        let mut outside = 0;
        for (&t, &p) in truth.iter().zip(predicted) {
            match (position(t), position(p)) {
                (Some(r), Some(c)) => counts[[r, c]] += 1,
                _ => outside += 1,
            }
        }
        Ok(ConfusionMatrix {
            labels: labels.to_vec(),
            counts,
            outside,
        })
    }

    pub fn labels(&self) -> &[u32] {
        &self.labels
    }

    pub fn counts(&self) -> &Array2<u64> {
        &self.counts
    }

    pub fn outside(&self) -> u64 {
        self.outside
    }

    /// Write as CSV with a header row and a leading row-name column.
    pub fn write_csv(&self, names: &[String], path: &Path) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)
            .with_context(|| format!("creating {}", path.display()))?;

        let mut header = vec!["true \\ predicted".to_string()];
        header.extend(names.iter().cloned());
        writer.write_record(&header)?;

        for (name, row) in names.iter().zip(self.counts.rows()) {
            let mut record = vec![name.clone()];
            record.extend(row.iter().map(|c| c.to_string()));
            writer.write_record(&record)?;
        }
        writer.flush().context("flushing confusion matrix CSV")?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Classification report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct ClassMetrics {
    pub label: u32,
    pub name: String,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub support: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct AverageMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub support: usize,
}

/// Per-class precision / recall / F1 with accuracy, macro and weighted averages.
///
/// Undefined ratios (no predictions or no support for a class) count as `0.0`.
#[derive(Debug, Clone, Serialize)]
pub struct ClassificationReport {
    pub classes: Vec<ClassMetrics>,
    pub accuracy: f64,
    pub macro_avg: AverageMetrics,
    pub weighted_avg: AverageMetrics,
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 { 0.0 } else { num as f64 / den as f64 }
}

impl ClassificationReport {
    /// `labels[i]` is reported under `names[i]`.
    pub fn new(
        truth: &[u32],
        predicted: &[u32],
        labels: &[u32],
        names: &[String],
    ) -> Result<Self, PipelineError> {
        check_lengths(truth, predicted)?;
        if labels.len() != names.len() {
            return Err(PipelineError::ShapeMismatch {
                what: "one name per reported class",
                expected: vec![labels.len()],
                actual: vec![names.len()],
            });
        }

        let classes: Vec<ClassMetrics> = labels
            .iter()
            .zip(names)
            .map(|(&label, name)| {
                let tp = truth
                    .iter()
                    .zip(predicted)
                    .filter(|&(&t, &p)| t == label && p == label)
                    .count();
                let predicted_n = predicted.iter().filter(|&&p| p == label).count();
                let support = truth.iter().filter(|&&t| t == label).count();

                let precision = ratio(tp, predicted_n);
                let recall = ratio(tp, support);
                let f1_score = if precision + recall > 0.0 {
                    2.0 * precision * recall / (precision + recall)
                } else {
                    0.0
                };
                ClassMetrics {
                    label,
                    name: name.clone(),
                    precision,
                    recall,
                    f1_score,
                    support,
                }
            })
            .collect();

        let total: usize = classes.iter().map(|c| c.support).sum();
        let n = classes.len().max(1) as f64;
        let macro_avg = AverageMetrics {
            precision: classes.iter().map(|c| c.precision).sum::<f64>() / n,
            recall: classes.iter().map(|c| c.recall).sum::<f64>() / n,
            f1_score: classes.iter().map(|c| c.f1_score).sum::<f64>() / n,
            support: total,
        };
        let weight = |f: fn(&ClassMetrics) -> f64| {
            if total == 0 {
                0.0
            } else {
                classes.iter().map(|c| f(c) * c.support as f64).sum::<f64>() / total as f64
            }
        };
        let weighted_avg = AverageMetrics {
            precision: weight(|c| c.precision),
            recall: weight(|c| c.recall),
            f1_score: weight(|c| c.f1_score),
            support: total,
        };

        Ok(ClassificationReport {
            accuracy: accuracy(truth, predicted),
            classes,
            macro_avg,
            weighted_avg,
        })
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        let text = serde_json::to_string_pretty(self).context("serializing report")?;
        std::fs::write(path, text).with_context(|| format!("writing {}", path.display()))
    }
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .classes
            .iter()
            .map(|c| c.name.len())
            .chain(std::iter::once("weighted avg".len()))
            .max()
            .unwrap_or(0);

        writeln!(
            f,
            "{:>width$} {:>9} {:>9} {:>9} {:>9}",
            "", "precision", "recall", "f1-score", "support"
        )?;
        writeln!(f)?;
        for c in &self.classes {
            writeln!(
                f,
                "{:>width$} {:>9.2} {:>9.2} {:>9.2} {:>9}",
                c.name, c.precision, c.recall, c.f1_score, c.support
            )?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "{:>width$} {:>9} {:>9} {:>9.2} {:>9}",
            "accuracy", "", "", self.accuracy, self.macro_avg.support
        )?;
        for (name, avg) in [("macro avg", &self.macro_avg), ("weighted avg", &self.weighted_avg)] {
            writeln!(
                f,
                "{:>width$} {:>9.2} {:>9.2} {:>9.2} {:>9}",
                name, avg.precision, avg.recall, avg.f1_score, avg.support
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn names(labels: &[u32]) -> Vec<String> {
        labels.iter().map(|l| format!("c{l}")).collect()
    }

    #[test]
    fn confusion_rows_are_truth_columns_are_predictions() {
        let truth = [1, 1, 2, 2, 2, 3];
        let pred = [1, 2, 2, 2, 3, 3];
        let cm = ConfusionMatrix::new(&truth, &pred, &[1, 2, 3]).unwrap();
        assert_eq!(*cm.counts(), array![[1, 1, 0], [0, 2, 1], [0, 0, 1]]);
        assert_eq!(cm.counts().sum(), 6);
        assert_eq!(cm.outside(), 0);
    }

    #[test]
    fn predictions_outside_labels_are_tallied_separately() {
        let cm = ConfusionMatrix::new(&[1, 2], &[0, 2], &[1, 2]).unwrap();
        assert_eq!(cm.counts().sum(), 1);
        assert_eq!(cm.outside(), 1);
    }

    #[test]
    fn length_mismatch_is_rejected() {
        assert!(ConfusionMatrix::new(&[1, 2], &[1], &[1, 2]).is_err());
        assert!(ClassificationReport::new(&[1], &[1, 1], &[1], &names(&[1])).is_err());
    }

    #[test]
    fn report_matches_hand_computed_values() {
        let truth = [1, 1, 2, 2, 2, 3];
        let pred = [1, 2, 2, 2, 3, 3];
        let labels = [1, 2, 3];
        let report = ClassificationReport::new(&truth, &pred, &labels, &names(&labels)).unwrap();

        let c2 = &report.classes[1];
        assert!((c2.precision - 2.0 / 3.0).abs() < 1e-12);
        assert!((c2.recall - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(c2.support, 3);

        let c3 = &report.classes[2];
        assert!((c3.precision - 0.5).abs() < 1e-12);
        assert!((c3.recall - 1.0).abs() < 1e-12);
        assert!((c3.f1_score - 2.0 / 3.0).abs() < 1e-12);

        assert!((report.accuracy - 4.0 / 6.0).abs() < 1e-12);
        assert_eq!(report.macro_avg.support, 6);
        let expected_macro_recall = (0.5 + 2.0 / 3.0 + 1.0) / 3.0;
        assert!((report.macro_avg.recall - expected_macro_recall).abs() < 1e-12);
        // weighted recall equals accuracy
        assert!((report.weighted_avg.recall - report.accuracy).abs() < 1e-12);
    }

    #[test]
    fn class_without_predictions_scores_zero() {
        let report = ClassificationReport::new(&[1, 2], &[1, 1], &[1, 2], &names(&[1, 2])).unwrap();
        assert_eq!(report.classes[1].precision, 0.0);
        assert_eq!(report.classes[1].f1_score, 0.0);
    }

    #[test]
    fn text_report_lists_every_class_and_summary_rows() {
        let labels = [1, 2];
        let report = ClassificationReport::new(&[1, 2], &[1, 2], &labels, &names(&labels)).unwrap();
        let text = report.to_string();
        assert!(text.contains("precision"));
        assert!(text.contains("c1"));
        assert!(text.contains("weighted avg"));
        assert!(text.contains("accuracy"));
        assert!(text.contains("1.00"));
    }

    #[test]
    fn csv_and_json_outputs_are_written() {
        let dir = tempfile::tempdir().unwrap();
        let labels = [1, 2];
        let cm = ConfusionMatrix::new(&[1, 2, 2], &[1, 2, 1], &labels).unwrap();
        let csv_path = dir.path().join("cm.csv");
        cm.write_csv(&names(&labels), &csv_path).unwrap();
        let text = std::fs::read_to_string(&csv_path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "true \\ predicted,c1,c2");
        assert_eq!(lines[2], "c2,1,1");

        let report = ClassificationReport::new(&[1, 2, 2], &[1, 2, 1], &labels, &names(&labels)).unwrap();
        let json_path = dir.path().join("report.json");
        report.write_json(&json_path).unwrap();
        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&json_path).unwrap()).unwrap();
        assert_eq!(value["classes"][1]["support"], 2);
    }
}
