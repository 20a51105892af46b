use std::path::Path;

use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::inference::model::{ModelRecord, ModelRegistry};
use crate::inference::session::{InferenceSession, SessionCache, SessionLoader};

/// The core inference engine: the model registry plus a bounded set of live
/// sessions and the currently selected model.
///
/// Every method takes `&mut self` or `&self`; the engine has a single owner
/// (the coordinator) and does no locking of its own.
pub struct InferenceEngine {
    /// Model registry for managing available models
    registry: ModelRegistry,
    sessions: SessionCache<Box<dyn InferenceSession>>,
    loader: Box<dyn SessionLoader>,
    /// Currently selected model name (if any)
    current_model: Option<String>,
}

impl InferenceEngine {
    /// Creates an engine holding at most `max_loaded` sessions.
    pub fn new(registry: ModelRegistry, loader: Box<dyn SessionLoader>, max_loaded: usize) -> Self {
        Self {
            registry,
            sessions: SessionCache::new(max_loaded),
            loader,
            current_model: None,
        }
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    /// Registers a model file in place.
    pub fn register(&mut self, file_path: &Path) -> Result<String> {
        self.registry.register(file_path)
    }

    /// Copies a model file into the models directory and registers it.
    pub fn import(&mut self, file_path: &Path) -> Result<String> {
        self.registry.import(file_path)
    }

    /// Returns the session for `name`, constructing it on a cache miss.
    ///
    /// A miss on a full cache evicts the least recently used session before
    /// the new one is built. Unknown names and missing files fail with
    /// `NotFound` and leave the cache untouched.
    pub fn load(&mut self, name: &str) -> Result<&dyn InferenceSession> {
        if self.sessions.contains(name) {
            debug!("Session cache hit for {}", name);
            return self.resident(name);
        }

        let record = self
            .registry
            .get(name)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("model not registered: {}", name)))?;
        if !record.path.is_file() {
            return Err(Error::NotFound(format!("model file not found: {}", record.path.display())));
        }

        if self.sessions.is_full() {
            if let Some((evicted, _session)) = self.sessions.evict_lru() {
                info!("Released session for {} to make room for {}", evicted, name);
            }
        }

        info!("Loading model {} from {}", name, record.path.display());
        let session = self.loader.load(name, &record.path).map_err(|e| match e {
            Error::Load { .. } => e,
            other => Error::Load { name: name.to_string(), reason: other.to_string() },
        })?;
        self.sessions.insert(name.to_string(), session);
        self.registry.mark_used(name);

        self.resident(name)
    }

    fn resident(&mut self, name: &str) -> Result<&dyn InferenceSession> {
        self.sessions
            .get(name)
            .map(|session| &**session)
            .ok_or_else(|| Error::NotFound(format!("no resident session for {}", name)))
    }

    /// Loads `name`, reporting failure as `false` after logging it.
    pub fn ensure_loaded(&mut self, name: &str) -> bool {
        match self.load(name) {
            Ok(_) => true,
            Err(e) => {
                warn!("Could not load model {}: {}", name, e);
                false
            }
        }
    }

    /// Marks a registered model as current. Unknown names are ignored.
    pub fn set_current(&mut self, name: &str) -> bool {
        if self.registry.contains(name) {
            self.current_model = Some(name.to_string());
            true
        } else {
            warn!("Cannot select unregistered model {}", name);
            false
        }
    }

    pub fn current_name(&self) -> Option<&str> {
        self.current_model.as_deref()
    }

    /// Session for the current model, loading it if needed.
    pub fn current(&mut self) -> Option<&dyn InferenceSession> {
        let name = self.current_model.clone()?;
        match self.load(&name) {
            Ok(session) => Some(session),
            Err(e) => {
                warn!("Current model {} unavailable: {}", name, e);
                None
            }
        }
    }

    /// Drops any session for `name` and deletes its registry entry.
    /// The model file stays on disk.
    pub fn remove(&mut self, name: &str) {
        if self.sessions.remove(name).is_some() {
            debug!("Dropped session for {}", name);
        }
        self.registry.remove(name);
        if self.current_model.as_deref() == Some(name) {
            self.current_model = None;
        }
    }

    pub fn list_names(&self) -> Vec<String> {
        self.registry.names()
    }

    pub fn info(&self, name: &str) -> Option<ModelRecord> {
        self.registry.get(name).cloned()
    }

    /// Removes every registry entry whose model file has disappeared.
    pub fn prune_orphans(&mut self) -> Vec<String> {
        let orphans = self.registry.orphans();
        for name in &orphans {
            self.remove(name);
        }
        if !orphans.is_empty() {
            info!("Pruned {} orphaned model(s)", orphans.len());
        }
        orphans
    }

    /// Names with a resident session, least recently used first.
    pub fn resident_sessions(&self) -> Vec<String> {
        self.sessions.resident_names()
    }
}
