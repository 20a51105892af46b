//! Bounded history logs of classifications and evaluations.
//!
//! Each log is an [`ArtifactStore`]: a CSV file of records plus a directory
//! holding one artifact per record. Appending past the retention ceiling
//! drops the oldest record together with its artifact.

mod artifact;
mod records;
mod render;
mod store;

pub use artifact::{ArtifactSource, ArtifactStatus, CopiedFile, RenderedMatrix, StoredArtifact};
pub use records::{
    ClassificationEntry, ClassificationRecord, EvaluationEntry, EvaluationRecord, HistoryRecord, TIMESTAMP_FORMAT,
    UNKNOWN,
};
pub use render::{HeatmapRenderer, MatrixRenderer};
pub use store::{ArtifactStore, IMAGES_DIR, LOG_FILE};

/// Log of classified images.
pub type ClassificationHistory = ArtifactStore<ClassificationRecord>;

/// Log of rendered confusion matrices.
pub type ConfusionHistory = ArtifactStore<EvaluationRecord>;
