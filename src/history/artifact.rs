use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;

use crate::error::{Error, Result};
use crate::evaluation::ConfusionMatrix;
use crate::history::render::MatrixRenderer;

/// Produces the artifact file stored alongside a history record.
pub trait ArtifactSource {
    /// Stem of the generated file name
    fn stem(&self) -> String;
    /// Extension of the generated file, without the dot
    fn extension(&self) -> String;
    fn write_to(&self, dest: &Path) -> Result<()>;
}

/// Artifact written by the store: where it went and when.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredArtifact {
    pub file_name: String,
    pub path: PathBuf,
    pub created_at: NaiveDateTime,
}

/// Whether a record's artifact can still be read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactStatus {
    Available(PathBuf),
    Unavailable,
}

/// Copies an existing file, e.g. the image that was classified.
#[derive(Debug, Clone, Copy)]
pub struct CopiedFile<'a>(pub &'a Path);

impl ArtifactSource for CopiedFile<'_> {
    fn stem(&self) -> String {
        self.0
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "artifact".to_string())
    }

    fn extension(&self) -> String {
        self.0
            .extension()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    fn write_to(&self, dest: &Path) -> Result<()> {
        if !self.0.is_file() {
            return Err(Error::NotFound(format!("source file not found: {}", self.0.display())));
        }
        fs::copy(self.0, dest)?;
        Ok(())
    }
}

/// Renders a confusion matrix chart as the artifact.
pub struct RenderedMatrix<'a> {
    pub renderer: &'a dyn MatrixRenderer,
    pub matrix: &'a ConfusionMatrix,
    pub class_names: &'a [String],
}

impl ArtifactSource for RenderedMatrix<'_> {
    fn stem(&self) -> String {
        "confusion".to_string()
    }

    fn extension(&self) -> String {
        "png".to_string()
    }

    fn write_to(&self, dest: &Path) -> Result<()> {
        self.renderer.render(self.matrix, self.class_names, dest)
    }
}
