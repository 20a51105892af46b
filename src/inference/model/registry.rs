use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use chrono::Local;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::inference::model::types::ModelRecord;

/// File name of the registry inside the models directory.
pub const REGISTRY_FILE: &str = "model_registry.json";

/// Tracks the installed models and persists their metadata.
///
/// Persistence is best effort: a failed write is logged and the in-memory
/// registry stays authoritative for the rest of the session.
#[derive(Debug)]
pub struct ModelRegistry {
    /// Directory where imported model files are stored
    pub models_dir: PathBuf,
    records: BTreeMap<String, ModelRecord>,
}

impl ModelRegistry {
    /// Opens the registry in `models_dir`, creating the directory if needed.
    ///
    /// A missing registry file yields an empty registry; so does an unreadable
    /// one, after a warning.
    pub fn open(models_dir: impl Into<PathBuf>) -> Result<Self> {
        let models_dir = models_dir.into();
        if !models_dir.exists() {
            fs::create_dir_all(&models_dir)?;
            info!("Created models directory: {}", models_dir.display());
        }

        let registry_path = models_dir.join(REGISTRY_FILE);
        let records = if registry_path.exists() {
            match fs::read_to_string(&registry_path)
                .map_err(Error::from)
                .and_then(|content| serde_json::from_str(&content).map_err(Error::from))
            {
                Ok(records) => records,
                Err(e) => {
                    warn!("Ignoring unreadable registry {}: {}", registry_path.display(), e);
                    BTreeMap::new()
                }
            }
        } else {
            BTreeMap::new()
        };

        info!("Model registry opened with {} model(s)", records.len());
        Ok(Self { models_dir, records })
    }

    /// Gets the full path to the registry file.
    pub fn registry_path(&self) -> PathBuf {
        self.models_dir.join(REGISTRY_FILE)
    }

    /// Saves the registry to disk, logging instead of failing.
    fn save(&self) {
        if let Err(e) = self.try_save() {
            warn!("Failed to persist model registry: {}", e);
        }
    }

    fn try_save(&self) -> Result<()> {
        let content = serde_json::to_string_pretty(&self.records)?;
        fs::write(self.registry_path(), content)?;
        Ok(())
    }

    /// Registers a model file and returns its name.
    ///
    /// The name is the file stem. Registering a name that already exists
    /// returns it untouched: the stored hash and registration time are kept.
    pub fn register(&mut self, file_path: &Path) -> Result<String> {
        if !file_path.is_file() {
            return Err(Error::NotFound(format!("model file not found: {}", file_path.display())));
        }

        let name = model_name(file_path)?;
        if self.records.contains_key(&name) {
            debug!("Model {} already registered", name);
            return Ok(name);
        }

        let hash = file_sha256(file_path)?;
        let record = ModelRecord {
            path: file_path.to_path_buf(),
            name: name.clone(),
            hash,
            registered_at: Local::now().naive_local(),
            last_used: None,
            use_count: 0,
        };
        info!("Registered model {} ({})", name, record.hash);
        self.records.insert(name.clone(), record);
        self.save();
        Ok(name)
    }

    /// Copies a model file into the models directory and registers the copy.
    pub fn import(&mut self, file_path: &Path) -> Result<String> {
        if !file_path.is_file() {
            return Err(Error::NotFound(format!("model file not found: {}", file_path.display())));
        }

        let file_name = file_path
            .file_name()
            .ok_or_else(|| Error::NotFound(format!("not a file: {}", file_path.display())))?;
        let dest = self.models_dir.join(file_name);

        if !same_file(file_path, &dest) {
            fs::copy(file_path, &dest)?;
            info!("Copied {} into {}", file_path.display(), self.models_dir.display());
        }

        self.register(&dest)
    }

    /// Gets a model record by name.
    pub fn get(&self, name: &str) -> Option<&ModelRecord> {
        self.records.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.records.contains_key(name)
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> Vec<String> {
        self.records.keys().cloned().collect()
    }

    pub fn records(&self) -> impl Iterator<Item = &ModelRecord> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Bumps the usage statistics of a model and persists them.
    pub fn mark_used(&mut self, name: &str) {
        if let Some(record) = self.records.get_mut(name) {
            record.last_used = Some(Local::now().naive_local());
            record.use_count += 1;
            self.save();
        }
    }

    /// Deletes a registry entry; the model file is left on disk.
    pub fn remove(&mut self, name: &str) -> Option<ModelRecord> {
        let removed = self.records.remove(name);
        if removed.is_some() {
            info!("Removed model {} from registry", name);
            self.save();
        }
        removed
    }

    /// Names whose backing file no longer exists.
    pub fn orphans(&self) -> Vec<String> {
        self.records
            .values()
            .filter(|record| !record.path.is_file())
            .map(|record| record.name.clone())
            .collect()
    }
}

/// Derives the registry name of a model file: its filename without extension.
pub fn model_name(file_path: &Path) -> Result<String> {
    file_path
        .file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .filter(|stem| !stem.is_empty())
        .ok_or_else(|| Error::NotFound(format!("cannot derive a model name from {}", file_path.display())))
}

/// Streams a file through SHA-256 and returns the hex digest.
pub fn file_sha256(file_path: &Path) -> Result<String> {
    let mut file = File::open(file_path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(format!("{:x}", hasher.finalize()))
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
