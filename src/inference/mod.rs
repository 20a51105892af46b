//! # Model Registry & Session Cache
//!
//! Tracks installed inference models by content hash and keeps a bounded
//! number of inference-ready sessions in memory.
//!
//! ## Key Components
//!
//! - `ModelRegistry`: persistent name → `ModelRecord` map (`model_registry.json`)
//! - `SessionCache`: least-recently-used set of live sessions
//! - `InferenceEngine`: registry + cache + current selection, the entry point
//!   the coordinator drives
//! - `SelectionLog`: append-only record of the last selected model
//!
//! ## Architecture
//!
//! Session construction goes through the `SessionLoader` trait so the engine
//! stays independent of the runtime. The ONNX Runtime binding lives behind
//! the `onnx` feature; without it `UnavailableLoader` reports a load error.

use std::path::Path;

use crate::error::{Error, Result};

pub mod engine;
pub mod model;
pub mod selection;
pub mod session;
#[cfg(feature = "onnx")]
pub mod onnx;

pub use engine::InferenceEngine;
pub use model::{ModelRecord, ModelRegistry};
pub use selection::SelectionLog;
pub use session::{argmax, softmax, InferenceSession, SessionCache, SessionLoader};

/// Loader used when no inference runtime was compiled in.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableLoader;

impl SessionLoader for UnavailableLoader {
    fn load(&self, name: &str, _path: &Path) -> Result<Box<dyn InferenceSession>> {
        Err(Error::Load {
            name: name.to_string(),
            reason: "no inference runtime available; rebuild with `--features onnx`".to_string(),
        })
    }
}

/// The session loader for this build.
pub fn default_loader() -> Box<dyn SessionLoader> {
    #[cfg(feature = "onnx")]
    {
        Box::new(onnx::OnnxSessionLoader)
    }
    #[cfg(not(feature = "onnx"))]
    {
        Box::new(UnavailableLoader)
    }
}
