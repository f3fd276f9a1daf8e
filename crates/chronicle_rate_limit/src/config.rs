//! Layered configuration for the archiver.
//!
//! This module provides TOML-based configuration. The configuration system supports:
//! - Bundled defaults (include_str! from chronicle.toml)
//! - User overrides (./chronicle.toml or ~/.config/chronicle/chronicle.toml)
//! - Automatic merging with user values taking precedence

use crate::RetryPolicy;
use chronicle_core::ModelConfig;
use chronicle_error::{ChronicleError, ChronicleResult, ConfigError};
use config::{Config, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, instrument};

/// Chunking and auto-archiving parameters.
///
/// ```toml
/// [archive]
/// max_messages_per_chunk = 20
/// preview_chars = 80
/// auto_archive_threshold = 40
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ArchiveSettings {
    /// Upper bound on messages per chunk
    pub max_messages_per_chunk: usize,
    /// Length of the review preview, in characters
    pub preview_chars: usize,
    /// Messages after the watermark that trigger auto-archiving
    pub auto_archive_threshold: usize,
}

impl Default for ArchiveSettings {
    fn default() -> Self {
        Self {
            max_messages_per_chunk: 20,
            preview_chars: 80,
            auto_archive_threshold: 40,
        }
    }
}

/// Backend request limits. `None` means unlimited.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct RateLimitSettings {
    /// Requests per minute
    #[serde(default)]
    pub rpm: Option<u32>,
    /// Maximum concurrent requests
    #[serde(default)]
    pub max_concurrent: Option<u32>,
}

/// Where sessions are stored on disk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct StorageSettings {
    /// Root directory for session documents
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

impl StorageSettings {
    /// Resolve the data directory, expanding a leading `~` and falling back
    /// to the platform data directory.
    pub fn resolve_data_dir(&self) -> PathBuf {
        match &self.data_dir {
            Some(dir) => match (dir.strip_prefix("~"), dirs::home_dir()) {
                (Ok(rest), Some(home)) => home.join(rest),
                _ => dir.clone(),
            },
            None => dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("chronicle"),
        }
    }
}

fn default_model() -> ModelConfig {
    ModelConfig::new("gpt-4o-mini")
}

/// Top-level Chronicle configuration.
///
/// Loads configuration from TOML files with a precedence system:
/// 1. Bundled defaults (include_str! from chronicle.toml)
/// 2. User override (~/.config/chronicle/chronicle.toml, then ./chronicle.toml)
///
/// # Example
///
/// ```no_run
/// use chronicle_rate_limit::ChronicleConfig;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = ChronicleConfig::load()?;
/// println!("Chunk size: {}", config.archive.max_messages_per_chunk);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ChronicleConfig {
    /// Chunking and auto-archiving
    #[serde(default)]
    pub archive: ArchiveSettings,
    /// Retry policy for generation calls
    #[serde(default)]
    pub retry: RetryPolicy,
    /// Default backend model
    #[serde(default = "default_model")]
    pub model: ModelConfig,
    /// Backend request limits
    #[serde(default)]
    pub rate_limit: RateLimitSettings,
    /// Session storage
    #[serde(default)]
    pub storage: StorageSettings,
}

impl Default for ChronicleConfig {
    fn default() -> Self {
        Self {
            archive: ArchiveSettings::default(),
            retry: RetryPolicy::default(),
            model: default_model(),
            rate_limit: RateLimitSettings::default(),
            storage: StorageSettings::default(),
        }
    }
}

impl ChronicleConfig {
    /// Load configuration from a specific file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or fails validation.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<std::path::Path>) -> ChronicleResult<Self> {
        debug!("Loading configuration from file");

        let config: Self = Config::builder()
            .add_source(File::from(path.as_ref()))
            .build()
            .map_err(|e| {
                ChronicleError::from(ConfigError::new(format!(
                    "Failed to read configuration from {}: {}",
                    path.as_ref().display(),
                    e
                )))
            })?
            .try_deserialize()
            .map_err(|e| {
                ChronicleError::from(ConfigError::new(format!(
                    "Failed to parse configuration: {}",
                    e
                )))
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration with precedence: user override > bundled default.
    ///
    /// Configuration sources in order of precedence (later sources override earlier):
    /// 1. Bundled defaults (chronicle.toml shipped with the library)
    /// 2. User config in home directory (~/.config/chronicle/chronicle.toml)
    /// 3. User config in current directory (./chronicle.toml)
    ///
    /// User config files are optional and will be silently skipped if not found.
    #[instrument]
    pub fn load() -> ChronicleResult<Self> {
        debug!("Loading configuration with precedence: current dir > home dir > bundled defaults");

        const DEFAULT_CONFIG: &str = include_str!("../../../chronicle.toml");

        let mut builder =
            Config::builder().add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml));

        if let Some(home) = dirs::home_dir() {
            let home_config = home.join(".config/chronicle/chronicle.toml");
            builder = builder.add_source(File::from(home_config).required(false));
        }

        builder = builder.add_source(File::with_name("chronicle").required(false));

        let config: Self = builder
            .build()
            .map_err(|e| {
                ChronicleError::from(ConfigError::new(format!(
                    "Failed to build configuration: {}",
                    e
                )))
            })?
            .try_deserialize()
            .map_err(|e| {
                ChronicleError::from(ConfigError::new(format!(
                    "Failed to parse configuration: {}",
                    e
                )))
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Reject values the archiver cannot run with.
    pub fn validate(&self) -> ChronicleResult<()> {
        if self.archive.max_messages_per_chunk == 0 {
            return Err(ConfigError::new("archive.max_messages_per_chunk must be at least 1").into());
        }
        if self.archive.auto_archive_threshold == 0 {
            return Err(ConfigError::new("archive.auto_archive_threshold must be at least 1").into());
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::new("retry.max_attempts must be at least 1").into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_dir_expands_home() {
        let settings = StorageSettings {
            data_dir: Some(PathBuf::from("~/archives")),
        };
        let resolved = settings.resolve_data_dir();

        if let Some(home) = dirs::home_dir() {
            assert_eq!(resolved, home.join("archives"));
        }
    }

    #[test]
    fn test_data_dir_absolute_unchanged() {
        let settings = StorageSettings {
            data_dir: Some(PathBuf::from("/srv/chronicle")),
        };
        assert_eq!(settings.resolve_data_dir(), PathBuf::from("/srv/chronicle"));
    }

    #[test]
    fn test_validate_rejects_zero_attempts() {
        let mut config = ChronicleConfig::default();
        config.retry.max_attempts = 0;
        assert!(config.validate().is_err());
    }
}
