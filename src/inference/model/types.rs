use std::path::PathBuf;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Represents a model entry in the registry file.
///
/// Serialized to/from `model_registry.json`, keyed by `name`. Timestamps are
/// local wall-clock times in ISO-8601 without an offset.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ModelRecord {
    /// Path to the model file
    pub path: PathBuf,
    /// Filename without its extension; unique across the registry
    pub name: String,
    /// SHA-256 of the file bytes, hex encoded, computed once at registration
    pub hash: String,
    /// When the model was registered
    pub registered_at: NaiveDateTime,
    /// When a session for the model was last constructed
    pub last_used: Option<NaiveDateTime>,
    /// Number of sessions constructed for the model
    pub use_count: u64,
}
