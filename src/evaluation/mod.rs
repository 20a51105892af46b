//! Batch evaluation of a model over a labeled image dataset.

mod metrics;
mod pipeline;

pub use metrics::{ClassMetrics, ConfusionMatrix, EvaluationResult, Metrics};
pub use pipeline::{count_samples, evaluate, evaluate_with_progress, SampleScored, DEFAULT_BUFFER_CAPACITY};
