use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

/// Square grid counting how often each true class (row) was predicted as
/// each class (column).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfusionMatrix {
    size: usize,
    counts: Vec<u64>,
}

/// Precision, recall and F1 of a single class.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

/// Accuracy plus macro-averaged precision, recall and F1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Metrics {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

impl ConfusionMatrix {
    pub fn new(size: usize) -> Self {
        Self { size, counts: vec![0; size * size] }
    }

    /// Builds a matrix from parallel label slices. Pairs outside the grid are dropped.
    pub fn from_labels(y_true: &[usize], y_pred: &[usize], size: usize) -> Self {
        let mut matrix = Self::new(size);
        for (&t, &p) in y_true.iter().zip(y_pred) {
            matrix.record(t, p);
        }
        matrix
    }

    /// Counts one `(true, predicted)` pair. Returns false when either index
    /// is outside the grid.
    pub fn record(&mut self, true_class: usize, predicted: usize) -> bool {
        if true_class >= self.size || predicted >= self.size {
            return false;
        }
        self.counts[true_class * self.size + predicted] += 1;
        true
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn get(&self, true_class: usize, predicted: usize) -> u64 {
        self.counts[true_class * self.size + predicted]
    }

    pub fn row(&self, true_class: usize) -> &[u64] {
        let start = true_class * self.size;
        &self.counts[start..start + self.size]
    }

    pub fn rows(&self) -> impl Iterator<Item = &[u64]> {
        (0..self.size).map(move |i| self.row(i))
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    pub fn trace(&self) -> u64 {
        (0..self.size).map(|i| self.get(i, i)).sum()
    }

    /// Number of samples whose true class is `class`.
    pub fn row_sum(&self, class: usize) -> u64 {
        self.row(class).iter().sum()
    }

    /// Number of samples predicted as `class`.
    pub fn column_sum(&self, class: usize) -> u64 {
        (0..self.size).map(|i| self.get(i, class)).sum()
    }

    /// Per-class metrics; every undefined ratio is 0.
    pub fn class_metrics(&self, class: usize) -> ClassMetrics {
        let tp = self.get(class, class) as f64;
        let predicted = self.column_sum(class);
        let support = self.row_sum(class);
        let precision = if predicted > 0 { tp / predicted as f64 } else { 0.0 };
        let recall = if support > 0 { tp / support as f64 } else { 0.0 };
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };
        ClassMetrics { precision, recall, f1 }
    }

    pub fn metrics(&self) -> Metrics {
        let total = self.total();
        let accuracy = if total > 0 { self.trace() as f64 / total as f64 } else { 0.0 };

        if self.size == 0 {
            return Metrics { accuracy, precision: 0.0, recall: 0.0, f1: 0.0 };
        }

        let per_class: Vec<ClassMetrics> = (0..self.size).map(|c| self.class_metrics(c)).collect();
        let n = self.size as f64;
        Metrics {
            accuracy,
            precision: per_class.iter().map(|m| m.precision).sum::<f64>() / n,
            recall: per_class.iter().map(|m| m.recall).sum::<f64>() / n,
            f1: per_class.iter().map(|m| m.f1).sum::<f64>() / n,
        }
    }
}

static SUMMARY_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\s*(Accuracy|Precision|Recall|F1)\s*:\s*([0-9.eE+-]+)\s*$")
        .expect("summary pattern is valid")
});

impl Metrics {
    /// Compact multi-line form stored in the evaluation history.
    pub fn summary(&self) -> String {
        format!(
            "Accuracy:{:.4}\nPrecision:{:.4}\nRecall:{:.4}\nF1:{:.4}",
            self.accuracy, self.precision, self.recall, self.f1
        )
    }

    /// Parses text produced by [`Metrics::summary`]. Missing lines read as 0;
    /// text without any recognised line yields `None`.
    pub fn parse_summary(text: &str) -> Option<Self> {
        let mut metrics = Metrics { accuracy: 0.0, precision: 0.0, recall: 0.0, f1: 0.0 };
        let mut found = false;
        for caps in SUMMARY_LINE.captures_iter(text) {
            let Ok(value) = caps[2].parse::<f64>() else { continue };
            match &caps[1] {
                "Accuracy" => metrics.accuracy = value,
                "Precision" => metrics.precision = value,
                "Recall" => metrics.recall = value,
                _ => metrics.f1 = value,
            }
            found = true;
        }
        found.then_some(metrics)
    }
}

/// Outcome of evaluating a model over a dataset.
#[derive(Debug, Clone, Serialize)]
pub struct EvaluationResult {
    pub class_names: Vec<String>,
    pub matrix: ConfusionMatrix,
    pub metrics: Metrics,
    /// Samples that failed to decode and were left out of the matrix
    pub skipped: usize,
}

impl EvaluationResult {
    pub fn new(class_names: Vec<String>, matrix: ConfusionMatrix, skipped: usize) -> Self {
        let metrics = matrix.metrics();
        Self { class_names, matrix, metrics, skipped }
    }
}

impl fmt::Display for EvaluationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Evaluation Metrics:")?;
        writeln!(f, "accuracy: {:.4}", self.metrics.accuracy)?;
        writeln!(f, "precision: {:.4}", self.metrics.precision)?;
        writeln!(f, "recall: {:.4}", self.metrics.recall)?;
        writeln!(f, "f1: {:.4}", self.metrics.f1)?;
        writeln!(f)?;
        write!(f, "Confusion Matrix:")?;
        for row in self.matrix.rows() {
            let cells: Vec<String> = row.iter().map(|c| c.to_string()).collect();
            write!(f, "\n{}", cells.join(" "))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn two_class_scenario() {
        let matrix = ConfusionMatrix::from_labels(&[0, 0, 1, 1], &[0, 1, 1, 1], 2);
        assert_eq!(matrix.row(0), &[1, 1]);
        assert_eq!(matrix.row(1), &[0, 2]);

        let a = matrix.class_metrics(0);
        let b = matrix.class_metrics(1);
        assert!(close(a.precision, 1.0));
        assert!(close(a.recall, 0.5));
        assert!(close(b.precision, 2.0 / 3.0));
        assert!(close(b.recall, 1.0));

        let metrics = matrix.metrics();
        assert!(close(metrics.accuracy, 0.75));
        assert!(close(metrics.precision, (1.0 + 2.0 / 3.0) / 2.0));
        assert!(close(metrics.recall, 0.75));
    }

    #[test]
    fn absent_class_has_zero_row_and_recall() {
        let matrix = ConfusionMatrix::from_labels(&[0, 0, 2], &[0, 1, 2], 3);
        assert_eq!(matrix.row(1), &[0, 0, 0]);
        let absent = matrix.class_metrics(1);
        assert_eq!(absent.recall, 0.0);
        assert_eq!(absent.precision, 0.0);
        assert_eq!(absent.f1, 0.0);
    }

    #[test]
    fn totals_match_sample_count() {
        let y_true = [0, 1, 2, 2, 1, 0, 0, 2, 1, 1];
        let y_pred = [0, 2, 2, 1, 1, 0, 1, 2, 0, 1];
        let matrix = ConfusionMatrix::from_labels(&y_true, &y_pred, 3);
        let metrics = matrix.metrics();
        assert_eq!(matrix.total(), y_true.len() as u64);
        assert!(close(metrics.accuracy * y_true.len() as f64, matrix.trace() as f64));
    }

    #[test]
    fn empty_matrix_has_zero_metrics() {
        let metrics = ConfusionMatrix::new(4).metrics();
        assert_eq!(metrics, Metrics { accuracy: 0.0, precision: 0.0, recall: 0.0, f1: 0.0 });
    }

    #[test]
    fn out_of_range_pairs_are_rejected() {
        let mut matrix = ConfusionMatrix::new(2);
        assert!(!matrix.record(0, 5));
        assert!(!matrix.record(3, 0));
        assert_eq!(matrix.total(), 0);
    }

    #[test]
    fn summary_round_trips() {
        let metrics = Metrics { accuracy: 0.75, precision: 0.8333, recall: 0.75, f1: 0.7333 };
        let text = metrics.summary();
        assert_eq!(text, "Accuracy:0.7500\nPrecision:0.8333\nRecall:0.7500\nF1:0.7333");
        assert_eq!(Metrics::parse_summary(&text), Some(metrics));
        assert_eq!(Metrics::parse_summary("Unknown"), None);
    }

    #[test]
    fn report_lists_metrics_then_matrix() {
        let matrix = ConfusionMatrix::from_labels(&[0, 0, 1, 1], &[0, 1, 1, 1], 2);
        let result = EvaluationResult::new(vec!["A".into(), "B".into()], matrix, 0);
        let report = result.to_string();
        assert!(report.starts_with("Evaluation Metrics:\naccuracy: 0.7500\n"));
        assert!(report.ends_with("Confusion Matrix:\n1 1\n0 2"));
    }
}
