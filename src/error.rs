//! Error taxonomy shared by every cxai component.

use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the registry, the evaluation pipeline and the history stores.
#[derive(Debug, Error)]
pub enum Error {
    /// A file is missing or a model name is not registered
    #[error("not found: {0}")]
    NotFound(String),
    /// The input has an extension the codec does not accept
    #[error("unsupported format '{extension}' for {}; use JPG or PNG", path.display())]
    Format { path: PathBuf, extension: String },
    /// The input file exists but could not be decoded
    #[error("cannot decode {}: {reason}", path.display())]
    Decode { path: PathBuf, reason: String },
    /// An inference session could not be constructed
    #[error("failed to load model {name}: {reason}")]
    Load { name: String, reason: String },
    /// A loaded session failed while running
    #[error("inference failed: {0}")]
    Inference(String),
    /// The chart capability failed to produce an artifact
    #[error("failed to render confusion matrix: {0}")]
    Render(String),
    /// A persisted log or registry could not be encoded or parsed
    #[error("persistence error: {0}")]
    Persist(String),
    /// The coordinator thread is gone and cannot answer
    #[error("coordinator unavailable: {0}")]
    Disconnected(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<csv::Error> for Error {
    fn from(err: csv::Error) -> Self {
        Error::Persist(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Persist(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
