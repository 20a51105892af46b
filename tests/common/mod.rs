//! Fakes shared by the integration tests.
#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use cxai::config::{
    EvaluationConfig, HistoryConfig, LoggingConfig, ModelConfig, PreprocessingConfig, Settings,
};
use cxai::error::{Error, Result};
use cxai::evaluation::ConfusionMatrix;
use cxai::history::MatrixRenderer;
use cxai::inference::{InferenceSession, SessionLoader};
use cxai::preprocess::{Tensor, TensorCodec};
use ndarray::Array4;

/// Session that predicts the class stored in the tensor's first element.
pub struct EchoSession {
    pub classes: usize,
}

impl InferenceSession for EchoSession {
    fn infer(&self, input: &Tensor) -> Result<Vec<f32>> {
        let class = input[[0, 0, 0, 0]] as usize;
        let mut probabilities = vec![0.0; self.classes];
        if class < self.classes {
            probabilities[class] = 1.0;
        }
        Ok(probabilities)
    }
}

/// Loader that records every construction and can be told to fail.
#[derive(Clone, Default)]
pub struct RecordingLoader {
    pub loads: Arc<Mutex<Vec<String>>>,
    pub fail_with: Option<fn() -> Error>,
    pub classes: usize,
}

impl RecordingLoader {
    pub fn new(classes: usize) -> Self {
        Self { classes, ..Self::default() }
    }

    pub fn loads(&self) -> Vec<String> {
        self.loads.lock().unwrap().clone()
    }
}

impl SessionLoader for RecordingLoader {
    fn load(&self, name: &str, _path: &Path) -> Result<Box<dyn InferenceSession>> {
        if let Some(fail) = self.fail_with {
            return Err(fail());
        }
        self.loads.lock().unwrap().push(name.to_string());
        Ok(Box::new(EchoSession { classes: self.classes }))
    }
}

/// Codec that reads the first byte of the file as the class index.
pub struct ByteCodec;

impl TensorCodec for ByteCodec {
    fn decode(&self, path: &Path) -> Result<Tensor> {
        let bytes = fs::read(path)?;
        let first = *bytes.first().ok_or_else(|| Error::Decode {
            path: path.to_path_buf(),
            reason: "empty file".to_string(),
        })?;
        let mut tensor = Array4::<f32>::zeros((1, 1, 1, 1));
        tensor[[0, 0, 0, 0]] = first as f32;
        Ok(tensor)
    }
}

/// Renderer that writes the matrix counts as text.
pub struct TextRenderer;

impl MatrixRenderer for TextRenderer {
    fn render(&self, matrix: &ConfusionMatrix, _class_names: &[String], dest: &Path) -> Result<()> {
        let rows: Vec<String> = matrix
            .rows()
            .map(|row| row.iter().map(|c| c.to_string()).collect::<Vec<_>>().join(" "))
            .collect();
        fs::write(dest, rows.join("\n"))?;
        Ok(())
    }
}

pub fn write_file(path: &Path, bytes: &[u8]) -> PathBuf {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, bytes).unwrap();
    path.to_path_buf()
}

/// Builds `<root>/<class>/<n>.png` files whose first byte is the predicted class.
pub fn write_dataset(root: &Path, samples: &[(&str, u8)]) {
    for (i, (class, predicted)) in samples.iter().enumerate() {
        write_file(&root.join(class).join(format!("{}.png", i)), &[*predicted]);
    }
}

pub fn settings(root: &Path, class_names: &[&str]) -> Settings {
    Settings {
        models: ModelConfig { directory: root.join("models"), max_loaded: 2 },
        history: HistoryConfig { directory: root.join("history"), max_records: 10 },
        confusion_history: HistoryConfig { directory: root.join("confusion"), max_records: 10 },
        evaluation: EvaluationConfig {
            class_names: class_names.iter().map(|s| s.to_string()).collect(),
            buffer_capacity: 4,
        },
        preprocessing: PreprocessingConfig::default(),
        logging: LoggingConfig { level: "info".to_string(), file: None },
    }
}
