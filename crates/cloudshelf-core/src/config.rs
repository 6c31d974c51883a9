//! Configuration module for CloudShelf's synchronization subsystem.
//!
//! Provides typed configuration structs that map to the YAML configuration
//! file, with loading, defaults, and a platform default path.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Top-level configuration for the synchronization subsystem.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub sync: SyncConfig,
    pub logging: LoggingConfig,
}

/// Synchronization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Local directory holding the user's documents.
    pub documents_dir: PathBuf,
    /// The single accepted document extension (lowercase, without dot).
    pub document_extension: String,
    /// Media type tagged onto items carrying the accepted extension.
    pub document_content_type: String,
    /// Quiet window before a burst of local changes is reported (ms).
    pub local_debounce_ms: u64,
    /// Interval between cloud metadata snapshot polls (ms).
    pub cloud_poll_interval_ms: u64,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level or `tracing` filter directive: `trace`, `debug`, `info`,
    /// `warn`, or `error`.
    pub level: String,
}

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/cloudshelf/sync.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("cloudshelf")
            .join("sync.yaml")
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            documents_dir: dirs::document_dir()
                .or_else(dirs::home_dir)
                .unwrap_or_else(|| PathBuf::from("~"))
                .join("CloudShelf"),
            document_extension: "epub".to_string(),
            document_content_type: "application/epub+zip".to_string(),
            local_debounce_ms: 200,
            cloud_poll_interval_ms: 1000,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}
