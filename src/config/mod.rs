// Required external crates for configuration management and serialization
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use config::{Config, ConfigError, Environment, File};

use crate::preprocess::ChannelOrder;

/// Configuration for model storage and the session cache
#[derive(Debug, Deserialize, Clone)]
pub struct ModelConfig {
    /// Directory where imported model files and the registry live
    pub directory: PathBuf,
    /// Maximum number of inference sessions held in memory at once
    #[serde(default = "default_max_loaded")]
    pub max_loaded: usize,
}

/// Configuration for one bounded-retention history store
#[derive(Debug, Deserialize, Clone)]
pub struct HistoryConfig {
    /// Root directory holding `records.csv` and the `images/` folder
    pub directory: PathBuf,
    /// Retention ceiling; the oldest record is dropped beyond it
    #[serde(default = "default_max_records")]
    pub max_records: usize,
}

/// Configuration for dataset evaluation
#[derive(Debug, Deserialize, Clone)]
pub struct EvaluationConfig {
    /// Ordered class names; index order defines matrix rows and columns
    pub class_names: Vec<String>,
    /// Capacity of the buffer between the image loader and inference
    #[serde(default = "default_buffer_capacity")]
    pub buffer_capacity: usize,
}

/// Configuration for image preprocessing
#[derive(Debug, Deserialize, Clone, Default)]
pub struct PreprocessingConfig {
    #[serde(default)]
    pub channel_order: ChannelOrder,
}

/// Configuration for application logging
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Log level (debug, info, warn, error)
    pub level: String,
    /// Optional log directory; logs go to stderr when absent
    pub file: Option<PathBuf>,
}

/// Main settings struct that contains all configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub models: ModelConfig,
    /// Classification history store
    pub history: HistoryConfig,
    /// Confusion-matrix history store
    pub confusion_history: HistoryConfig,
    pub evaluation: EvaluationConfig,
    #[serde(default)]
    pub preprocessing: PreprocessingConfig,
    pub logging: LoggingConfig,
}

fn default_max_loaded() -> usize {
    2
}

fn default_max_records() -> usize {
    10
}

fn default_buffer_capacity() -> usize {
    4
}

/// Implementation for loading and parsing configuration
impl Settings {
    /// Loads settings from `./config`.
    pub fn new() -> Result<Self, ConfigError> {
        let config_dir = std::env::current_dir()
            .map_err(|e| ConfigError::Message(
                format!("Failed to get current directory: {}", e)
            ))?
            .join("config");
        Self::from_dir(&config_dir)
    }

    /// Creates a new Settings instance by loading config from multiple sources
    /// in the following order of precedence (highest to lowest):
    /// 1. Environment variables prefixed with CXAI_ (nested keys joined by `__`)
    /// 2. Local config file (local.toml) if present
    /// 3. Default config file (default.toml)
    pub fn from_dir(config_dir: &Path) -> Result<Self, ConfigError> {
        if !config_dir.exists() {
            return Err(ConfigError::Message(
                format!("Config directory not found at: {}", config_dir.display())
            ));
        }

        let default_config = config_dir.join("default.toml");
        if !default_config.exists() {
            return Err(ConfigError::Message(
                format!("Default configuration file not found at: {}", default_config.display())
            ));
        }

        let local_config = config_dir.join("local.toml");

        // Convert paths to strings and keep them alive
        let default_config_path = default_config.to_string_lossy();
        let local_config_path = local_config.to_string_lossy();

        let settings = Config::builder()
            .add_source(File::with_name(&default_config_path))
            .add_source(File::with_name(&local_config_path).required(false))
            .add_source(Environment::with_prefix("CXAI").prefix_separator("_").separator("__"))
            .build()?
            .try_deserialize::<Settings>()?;

        settings.validate()?;

        Ok(settings)
    }

    /// Validate configuration values and create the managed directories
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.models.max_loaded == 0 {
            return Err(ConfigError::Message(
                "models.max_loaded must be greater than 0".to_string()
            ));
        }

        for (section, store) in [("history", &self.history), ("confusion_history", &self.confusion_history)] {
            if store.max_records == 0 {
                return Err(ConfigError::Message(
                    format!("{}.max_records must be greater than 0", section)
                ));
            }
        }

        if self.evaluation.class_names.is_empty() {
            return Err(ConfigError::Message(
                "evaluation.class_names must list at least one class".to_string()
            ));
        }

        let mut seen = HashSet::new();
        for name in &self.evaluation.class_names {
            if !seen.insert(name.as_str()) {
                return Err(ConfigError::Message(
                    format!("Duplicate class name in evaluation.class_names: {}", name)
                ));
            }
        }

        match self.logging.level.to_lowercase().as_str() {
            "error" | "warn" | "info" | "debug" | "trace" => Ok(()),
            _ => Err(ConfigError::Message(
                format!("Invalid logging level: {}. Must be one of: error, warn, info, debug, trace",
                    self.logging.level)
            )),
        }?;

        for dir in [&self.models.directory, &self.history.directory, &self.confusion_history.directory] {
            if !dir.exists() {
                std::fs::create_dir_all(dir).map_err(|e| {
                    ConfigError::Message(format!(
                        "Failed to create directory at {}: {}",
                        dir.display(), e
                    ))
                })?;
            }
        }

        if let Some(log_dir) = &self.logging.file {
            if !log_dir.exists() {
                std::fs::create_dir_all(log_dir).map_err(|e| {
                    ConfigError::Message(format!(
                        "Failed to create log directory at {}: {}",
                        log_dir.display(), e
                    ))
                })?;
            }
        }

        Ok(())
    }
}
