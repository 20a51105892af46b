//! ONNX Runtime binding for [`SessionLoader`], enabled by the `onnx` feature.

use std::path::Path;
use std::sync::Mutex;

use ort::session::Session;
use ort::value::Tensor as OrtTensor;
use tracing::info;

use crate::error::{Error, Result};
use crate::inference::session::{softmax, InferenceSession, SessionLoader};
use crate::preprocess::Tensor;

/// Builds ONNX Runtime sessions from `.onnx` files.
#[derive(Debug, Default, Clone, Copy)]
pub struct OnnxSessionLoader;

struct OnnxSession {
    session: Mutex<Session>,
}

impl SessionLoader for OnnxSessionLoader {
    fn load(&self, name: &str, path: &Path) -> Result<Box<dyn InferenceSession>> {
        let session = Session::builder()
            .and_then(|builder| builder.commit_from_file(path))
            .map_err(|e| Error::Load { name: name.to_string(), reason: e.to_string() })?;
        info!("ONNX session ready for {}", name);
        Ok(Box::new(OnnxSession { session: Mutex::new(session) }))
    }
}

impl InferenceSession for OnnxSession {
    fn infer(&self, input: &Tensor) -> Result<Vec<f32>> {
        let shape: Vec<i64> = input.shape().iter().map(|&d| d as i64).collect();
        let data: Vec<f32> = input.iter().copied().collect();
        let value = OrtTensor::from_array((shape, data))
            .map_err(|e| Error::Inference(e.to_string()))?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| Error::Inference(e.to_string()))?;
        let outputs = session
            .run(ort::inputs![value])
            .map_err(|e| Error::Inference(e.to_string()))?;
        let (_, logits) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| Error::Inference(e.to_string()))?;

        Ok(softmax(logits))
    }
}
