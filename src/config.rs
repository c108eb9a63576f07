//! Configuration management for the publishing core
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (vocab.toml)
//! - Environment variables (VOCAB__*)
//!
//! ## Example config file (vocab.toml):
//! ```toml
//! [store]
//! path = "./vocab-store.json"
//!
//! [publishing]
//! enforce_monotonic = true
//! initial_version = "1.0"
//! default_publisher = "Taxonomy Team"
//!
//! [history]
//! default_limit = 50
//! max_limit = 500
//! ```

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::version::Version;

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PublishConfig {
    /// Store settings
    #[serde(default)]
    pub store: StoreConfig,

    /// Publishing rules
    #[serde(default)]
    pub publishing: PublishingConfig,

    /// History query settings
    #[serde(default)]
    pub history: HistoryConfig,
}

/// Store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// JSON file backing the store
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

/// Publishing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishingConfig {
    /// Reject labels that do not sort after the latest finalized version
    #[serde(default = "default_true")]
    pub enforce_monotonic: bool,

    /// Suggested label when a project has no versions yet
    #[serde(default = "default_initial_version")]
    pub initial_version: String,

    /// Publisher recorded when the caller gives none
    #[serde(default)]
    pub default_publisher: Option<String>,
}

/// History configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    #[serde(default = "default_limit")]
    pub default_limit: usize,

    /// Upper bound on any requested page size
    #[serde(default = "default_max_limit")]
    pub max_limit: usize,
}

// Default value functions
fn default_store_path() -> PathBuf {
    PathBuf::from("vocab-store.json")
}

fn default_true() -> bool {
    true
}

fn default_initial_version() -> String {
    "1.0".to_string()
}

fn default_limit() -> usize {
    50
}

fn default_max_limit() -> usize {
    500
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

impl Default for PublishingConfig {
    fn default() -> Self {
        Self {
            enforce_monotonic: true,
            initial_version: default_initial_version(),
            default_publisher: None,
        }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            max_limit: default_max_limit(),
        }
    }
}

impl PublishConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load configuration, adding a required explicit file
    pub fn load_from(config_path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        let config_locations = ["vocab.toml", ".vocab.toml", "config/vocab.toml"];
        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        // XDG config directory
        if let Some(config_dir) = directories::ProjectDirs::from("org", "vocab", "vocab-publish") {
            let xdg_config = config_dir.config_dir().join("vocab.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // VOCAB__PUBLISHING__ENFORCE_MONOTONIC=false etc.
        builder = builder.add_source(
            Environment::with_prefix("VOCAB")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        let config: Self = config.try_deserialize()?;
        config.validate().map_err(ConfigError::Message)?;
        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }

    /// Check values that deserialize fine but make no sense
    pub fn validate(&self) -> Result<(), String> {
        let initial = Version::parse(&self.publishing.initial_version)
            .map_err(|e| format!("publishing.initial_version: {}", e))?;
        if initial.is_pre_release() {
            return Err(format!(
                "publishing.initial_version must be a release label, got '{}'",
                self.publishing.initial_version
            ));
        }
        if self.history.max_limit == 0 {
            return Err("history.max_limit must be at least 1".to_string());
        }
        if self.history.default_limit > self.history.max_limit {
            return Err(format!(
                "history.default_limit ({}) exceeds history.max_limit ({})",
                self.history.default_limit, self.history.max_limit
            ));
        }
        Ok(())
    }

    /// Suggested first release label
    pub fn initial_version(&self) -> crate::error::Result<Version> {
        Version::parse(&self.publishing.initial_version)
    }

    /// Get the store path (resolves relative paths)
    pub fn store_path(&self) -> PathBuf {
        if self.store.path.is_absolute() {
            self.store.path.clone()
        } else {
            std::env::current_dir()
                .unwrap_or_default()
                .join(&self.store.path)
        }
    }
}
