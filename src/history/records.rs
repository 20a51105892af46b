use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::evaluation::Metrics;
use crate::history::artifact::StoredArtifact;

/// Placeholder for columns missing from rows written by older versions.
pub const UNKNOWN: &str = "Unknown";

/// Timestamp format used in every history log.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A row schema stored in an [`ArtifactStore`](crate::history::ArtifactStore).
pub trait HistoryRecord: Sized {
    /// Caller-supplied metadata for a new record
    type Entry;

    /// Column header, written as the first line of the log.
    const HEADER: &'static [&'static str];

    fn from_entry(entry: Self::Entry, artifact: StoredArtifact) -> Self;

    /// Builds a record from a row already padded to `HEADER.len()` columns.
    fn from_row(row: Vec<String>) -> Self;

    fn to_row(&self) -> Vec<String>;

    fn artifact_path(&self) -> &Path;
}

/// Metadata of one classification.
#[derive(Debug, Clone)]
pub struct ClassificationEntry {
    pub model: String,
    /// Winning class label
    pub result: String,
    /// One `name: pp.pp%` line per class
    pub probabilities: String,
}

impl ClassificationEntry {
    /// Formats the probability breakdown stored with a classification.
    pub fn format_probabilities(class_names: &[String], probabilities: &[f32]) -> String {
        class_names
            .iter()
            .zip(probabilities)
            .map(|(name, p)| format!("{}: {:.2}%", name, p * 100.0))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// One row of the classification history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationRecord {
    pub image_name: String,
    pub model: String,
    pub result: String,
    pub probabilities: String,
    pub timestamp: String,
    pub path: PathBuf,
}

impl HistoryRecord for ClassificationRecord {
    type Entry = ClassificationEntry;

    const HEADER: &'static [&'static str] =
        &["ImageName", "Model", "Result", "Probabilities", "Timestamp", "Path"];

    fn from_entry(entry: ClassificationEntry, artifact: StoredArtifact) -> Self {
        Self {
            image_name: artifact.file_name,
            model: entry.model,
            result: entry.result,
            probabilities: entry.probabilities,
            timestamp: artifact.created_at.format(TIMESTAMP_FORMAT).to_string(),
            path: artifact.path,
        }
    }

    fn from_row(row: Vec<String>) -> Self {
        let mut cols = row.into_iter();
        let mut next = || cols.next().unwrap_or_else(|| UNKNOWN.to_string());
        Self {
            image_name: next(),
            model: next(),
            result: next(),
            probabilities: next(),
            timestamp: next(),
            path: PathBuf::from(next()),
        }
    }

    fn to_row(&self) -> Vec<String> {
        vec![
            self.image_name.clone(),
            self.model.clone(),
            self.result.clone(),
            self.probabilities.clone(),
            self.timestamp.clone(),
            self.path.to_string_lossy().to_string(),
        ]
    }

    fn artifact_path(&self) -> &Path {
        &self.path
    }
}

/// Metadata of one evaluation run.
#[derive(Debug, Clone)]
pub struct EvaluationEntry {
    /// Output of [`Metrics::summary`]
    pub metrics: String,
    pub model: String,
    /// Final component of the dataset path, or `Unknown`
    pub dataset: String,
}

impl EvaluationEntry {
    pub fn new(metrics: &Metrics, model: &str, dataset_path: Option<&Path>) -> Self {
        let dataset = dataset_path
            .and_then(|p| p.file_name())
            .map(|name| name.to_string_lossy().to_string())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| UNKNOWN.to_string());
        Self {
            metrics: metrics.summary(),
            model: model.to_string(),
            dataset,
        }
    }
}

/// One row of the confusion-matrix history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationRecord {
    pub png_name: String,
    pub timestamp: String,
    pub metrics: String,
    pub model: String,
    pub path: PathBuf,
    pub dataset: String,
}

impl EvaluationRecord {
    /// Parsed metrics, when the stored text is well formed.
    pub fn parsed_metrics(&self) -> Option<Metrics> {
        Metrics::parse_summary(&self.metrics)
    }
}

impl HistoryRecord for EvaluationRecord {
    type Entry = EvaluationEntry;

    const HEADER: &'static [&'static str] =
        &["PNGName", "Timestamp", "Metrics", "Model", "Path", "Dataset"];

    fn from_entry(entry: EvaluationEntry, artifact: StoredArtifact) -> Self {
        Self {
            png_name: artifact.file_name,
            timestamp: artifact.created_at.format(TIMESTAMP_FORMAT).to_string(),
            metrics: entry.metrics,
            model: entry.model,
            path: artifact.path,
            dataset: entry.dataset,
        }
    }

    fn from_row(row: Vec<String>) -> Self {
        let mut cols = row.into_iter();
        let mut next = || cols.next().unwrap_or_else(|| UNKNOWN.to_string());
        Self {
            png_name: next(),
            timestamp: next(),
            metrics: next(),
            model: next(),
            path: PathBuf::from(next()),
            dataset: next(),
        }
    }

    fn to_row(&self) -> Vec<String> {
        vec![
            self.png_name.clone(),
            self.timestamp.clone(),
            self.metrics.clone(),
            self.model.clone(),
            self.path.to_string_lossy().to_string(),
            self.dataset.clone(),
        ]
    }

    fn artifact_path(&self) -> &Path {
        &self.path
    }
}
