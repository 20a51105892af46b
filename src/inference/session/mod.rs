//! Inference sessions and the bounded cache that owns them.

mod cache;

use std::path::Path;

use crate::error::Result;
use crate::preprocess::Tensor;

pub use cache::SessionCache;

/// A memory-resident, ready-to-use handle to a loaded model.
pub trait InferenceSession: Send {
    /// Runs the model on one preprocessed tensor and returns one probability
    /// per class.
    fn infer(&self, input: &Tensor) -> Result<Vec<f32>>;
}

/// Constructs inference sessions from model files.
///
/// Implemented by the runtime binding; the engine never looks inside the
/// model file itself.
pub trait SessionLoader: Send {
    fn load(&self, name: &str, path: &Path) -> Result<Box<dyn InferenceSession>>;
}

/// Numerically stable softmax over raw logits.
pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|&x| (x - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|x| x / sum).collect()
}

/// Index of the largest value, ignoring NaNs. `None` for an empty or all-NaN slice.
///
/// Ties resolve to the lowest index.
pub fn argmax(values: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &v) in values.iter().enumerate() {
        if v.is_nan() {
            continue;
        }
        match best {
            Some((_, b)) if v <= b => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}
