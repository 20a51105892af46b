use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::error::Result;

/// File name of the selection log inside the models directory.
pub const SELECTION_FILE: &str = "selected_model.csv";

/// Append-only log of explicitly selected model names. The last row wins.
#[derive(Debug, Clone)]
pub struct SelectionLog {
    path: PathBuf,
}

impl SelectionLog {
    pub fn new(models_dir: &Path) -> Self {
        Self { path: models_dir.join(SELECTION_FILE) }
    }

    /// Records a selection; failures are logged and ignored.
    pub fn append(&self, name: &str) {
        if let Err(e) = self.try_append(name) {
            warn!("Failed to record model selection {}: {}", name, e);
        }
    }

    fn try_append(&self, name: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        let mut writer = csv::Writer::from_writer(file);
        writer.write_record([name])?;
        writer.flush()?;
        Ok(())
    }

    /// Most recently recorded selection, if any.
    pub fn last(&self) -> Option<String> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(&self.path)
            .ok()?;
        reader
            .records()
            .filter_map(|row| row.ok())
            .filter_map(|row| row.get(0).map(str::to_string))
            .filter(|name| !name.is_empty())
            .last()
    }
}
