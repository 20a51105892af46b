use std::fs;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::Result;
use crate::history::artifact::{ArtifactSource, ArtifactStatus, StoredArtifact};
use crate::history::records::{HistoryRecord, UNKNOWN};

/// Log file name inside a store's root directory.
pub const LOG_FILE: &str = "records.csv";
/// Artifact directory name inside a store's root directory.
pub const IMAGES_DIR: &str = "images";

/// Append-only record log with one artifact file per row and a retention
/// ceiling enforced oldest-first.
///
/// The log is rewritten as a whole on every mutation. The store does no
/// locking; one owner must serialize `append` and `clear`.
pub struct ArtifactStore<R: HistoryRecord> {
    root: PathBuf,
    images_dir: PathBuf,
    log_path: PathBuf,
    max_records: usize,
    _record: PhantomData<R>,
}

impl<R: HistoryRecord> ArtifactStore<R> {
    /// Opens the store at `root`, creating its directories and an empty log
    /// as needed.
    pub fn open(root: impl Into<PathBuf>, max_records: usize) -> Result<Self> {
        let root = root.into();
        let images_dir = root.join(IMAGES_DIR);
        fs::create_dir_all(&images_dir)?;
        let store = Self {
            log_path: root.join(LOG_FILE),
            images_dir,
            root,
            max_records: max_records.max(1),
            _record: PhantomData,
        };
        if !store.log_path.is_file() {
            store.write_rows(&[])?;
        }
        Ok(store)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn images_dir(&self) -> &Path {
        &self.images_dir
    }

    pub fn max_records(&self) -> usize {
        self.max_records
    }

    /// Writes the artifact, appends a row for it and, when the log now holds
    /// more than `max_records` rows, drops the oldest row and its file.
    ///
    /// Returns the path of the new artifact. If the log cannot be updated
    /// the new artifact is removed again and the evicted row keeps its file.
    pub fn append(&mut self, source: &dyn ArtifactSource, entry: R::Entry) -> Result<PathBuf> {
        let artifact = self.write_artifact(source)?;
        let path = artifact.path.clone();

        let result = self.load_all().and_then(|mut records| {
            records.push(R::from_entry(entry, artifact));
            let evicted = if records.len() > self.max_records { Some(records.remove(0)) } else { None };
            self.write_rows(&records)?;
            Ok(evicted)
        });

        match result {
            Ok(Some(evicted)) => remove_artifact(evicted.artifact_path()),
            Ok(None) => {}
            Err(e) => {
                remove_artifact(&path);
                return Err(e);
            }
        }
        debug!("Appended {} to {}", path.display(), self.log_path.display());
        Ok(path)
    }

    /// Every record, oldest first. Rows written before a column existed
    /// read that column as `Unknown`.
    pub fn load_all(&self) -> Result<Vec<R>> {
        if !self.log_path.is_file() {
            return Ok(Vec::new());
        }
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(&self.log_path)?;

        let width = R::HEADER.len();
        let mut records = Vec::new();
        for row in reader.records() {
            let row = row?;
            if row.iter().all(|cell| cell.is_empty()) {
                continue;
            }
            let mut cells: Vec<String> = row.iter().take(width).map(str::to_string).collect();
            cells.resize(width, UNKNOWN.to_string());
            records.push(R::from_row(cells));
        }
        Ok(records)
    }

    /// Every record, newest first.
    pub fn load_newest_first(&self) -> Result<Vec<R>> {
        let mut records = self.load_all()?;
        records.reverse();
        Ok(records)
    }

    /// Deletes every file in the artifact directory and resets the log to
    /// its header.
    pub fn clear(&mut self) -> Result<()> {
        fs::create_dir_all(&self.images_dir)?;
        let mut removed = 0;
        for entry in fs::read_dir(&self.images_dir)? {
            let path = entry?.path();
            if path.is_file() {
                fs::remove_file(&path)?;
                removed += 1;
            }
        }
        self.write_rows(&[])?;
        info!("Cleared {} ({} artifact(s) removed)", self.root.display(), removed);
        Ok(())
    }

    /// Reports whether the record's artifact file is still on disk.
    pub fn artifact_status(&self, record: &R) -> ArtifactStatus {
        let path = record.artifact_path();
        if path.is_file() {
            ArtifactStatus::Available(path.to_path_buf())
        } else {
            ArtifactStatus::Unavailable
        }
    }

    fn write_artifact(&self, source: &dyn ArtifactSource) -> Result<StoredArtifact> {
        fs::create_dir_all(&self.images_dir)?;
        let created_at = Local::now().naive_local();
        let mut file_name = format!(
            "{}_{}_{}",
            source.stem(),
            created_at.format("%Y-%m-%d_%H-%M-%S-%3f"),
            &Uuid::new_v4().simple().to_string()[..8]
        );
        let extension = source.extension();
        if !extension.is_empty() {
            file_name.push('.');
            file_name.push_str(&extension);
        }
        let path = self.images_dir.join(&file_name);
        source.write_to(&path)?;
        Ok(StoredArtifact { file_name, path, created_at })
    }

    /// Rewrites the whole log through a temporary file.
    fn write_rows(&self, records: &[R]) -> Result<()> {
        let tmp_path = self.log_path.with_extension("csv.tmp");
        {
            let mut writer = csv::Writer::from_path(&tmp_path)?;
            writer.write_record(R::HEADER)?;
            for record in records {
                writer.write_record(record.to_row())?;
            }
            writer.flush()?;
        }
        fs::rename(&tmp_path, &self.log_path)?;
        Ok(())
    }
}

fn remove_artifact(path: &Path) {
    if !path.is_file() {
        return;
    }
    match fs::remove_file(path) {
        Ok(()) => debug!("Removed artifact {}", path.display()),
        Err(e) => warn!("Failed to remove artifact {}: {}", path.display(), e),
    }
}
