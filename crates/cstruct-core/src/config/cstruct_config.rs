//! Top-level cstruct configuration with layered resolution.

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{Backend, RetryConfig, RunConfig, StorageConfig, TransportConfig};
use crate::constants::PROJECT_CONFIG_FILE;
use crate::errors::ConfigError;

/// Top-level configuration aggregating all sub-configs.
///
/// Resolution order (highest priority first):
/// 1. CLI flags (applied via `apply_cli_overrides`)
/// 2. Environment variables (`CSTRUCT_*`)
/// 3. Project config (`cstruct.toml` in the project root)
/// 4. User config (`~/.cstruct/config.toml`)
/// 5. Compiled defaults
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CstructConfig {
    pub storage: StorageConfig,
    pub retry: RetryConfig,
    pub transport: TransportConfig,
    pub run: RunConfig,
}

/// CLI override arguments that can be applied to a config.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub database: Option<String>,
    pub base_path: Option<String>,
    pub filter: Option<String>,
    pub autocommit: Option<bool>,
    pub queue_path: Option<String>,
    pub unlink_stale: Option<bool>,
}

impl CstructConfig {
    /// Load configuration with layered resolution rooted at `root`.
    pub fn load(root: &Path, cli_overrides: Option<&CliOverrides>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        // Lowest priority: user config
        if let Some(user_config_path) = Self::user_config_path() {
            if user_config_path.exists() {
                match Self::merge_toml_file(&mut config, &user_config_path) {
                    Ok(()) => {}
                    Err(e @ ConfigError::ParseError { .. }) => return Err(e),
                    Err(e) => {
                        tracing::warn!(error = %e, "ignoring unreadable user config");
                    }
                }
            }
        }

        let project_config_path = root.join(PROJECT_CONFIG_FILE);
        if project_config_path.exists() {
            Self::merge_toml_file(&mut config, &project_config_path)?;
        }

        Self::apply_env_overrides(&mut config)?;

        if let Some(cli) = cli_overrides {
            Self::apply_cli_overrides(&mut config, cli);
        }

        Self::validate(&config)?;

        Ok(config)
    }

    /// Load configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml_str).map_err(|e| ConfigError::ParseError {
            path: "<string>".to_string(),
            message: e.to_string(),
        })
    }

    /// Validate the configuration values.
    pub fn validate(config: &CstructConfig) -> Result<(), ConfigError> {
        if config.retry.interval_ms == Some(0) {
            return Err(ConfigError::ValidationFailed {
                field: "retry.interval_ms".to_string(),
                message: "must be greater than 0".to_string(),
            });
        }
        if config.retry.effective_ceiling() < config.retry.effective_interval() {
            return Err(ConfigError::ValidationFailed {
                field: "retry.ceiling_secs".to_string(),
                message: "must not be shorter than the retry interval".to_string(),
            });
        }
        if config.transport.channel_capacity == Some(0) {
            return Err(ConfigError::ValidationFailed {
                field: "transport.channel_capacity".to_string(),
                message: "must be greater than 0".to_string(),
            });
        }
        if config.transport.idle_flush_ms == Some(0) {
            return Err(ConfigError::ValidationFailed {
                field: "transport.idle_flush_ms".to_string(),
                message: "must be greater than 0".to_string(),
            });
        }
        if config.transport.max_message_size == Some(0) {
            return Err(ConfigError::ValidationFailed {
                field: "transport.max_message_size".to_string(),
                message: "must be greater than 0".to_string(),
            });
        }
        if config.storage.lock_name.as_deref().is_some_and(str::is_empty) {
            return Err(ConfigError::ValidationFailed {
                field: "storage.lock_name".to_string(),
                message: "must not be empty".to_string(),
            });
        }
        if let Some(ref filter) = config.run.filter {
            glob::Pattern::new(filter).map_err(|e| ConfigError::ValidationFailed {
                field: "run.filter".to_string(),
                message: e.to_string(),
            })?;
        }
        Ok(())
    }

    /// Returns the user config path: `~/.cstruct/config.toml`.
    fn user_config_path() -> Option<std::path::PathBuf> {
        dirs_path().map(|d| d.join("config.toml"))
    }

    /// Merge a TOML file into the existing config.
    /// Unknown keys are ignored.
    fn merge_toml_file(config: &mut CstructConfig, path: &Path) -> Result<(), ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
            path: path.display().to_string(),
        })?;

        let file_config: CstructConfig =
            toml::from_str(&content).map_err(|e| ConfigError::ParseError {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;

        Self::merge(config, &file_config);
        Ok(())
    }

    /// Merge `other` into `base`; `Some` values in `other` win.
    fn merge(base: &mut CstructConfig, other: &CstructConfig) {
        // Storage
        if other.storage.database.is_some() {
            base.storage.database = other.storage.database.clone();
        }
        if other.storage.staging_dir.is_some() {
            base.storage.staging_dir = other.storage.staging_dir.clone();
        }
        if other.storage.lock_dir.is_some() {
            base.storage.lock_dir = other.storage.lock_dir.clone();
        }
        if other.storage.lock_name.is_some() {
            base.storage.lock_name = other.storage.lock_name.clone();
        }
        if other.storage.base_path.is_some() {
            base.storage.base_path = other.storage.base_path.clone();
        }
        if other.storage.keep_staging.is_some() {
            base.storage.keep_staging = other.storage.keep_staging;
        }

        // Retry
        if other.retry.interval_ms.is_some() {
            base.retry.interval_ms = other.retry.interval_ms;
        }
        if other.retry.ceiling_secs.is_some() {
            base.retry.ceiling_secs = other.retry.ceiling_secs;
        }

        // Transport
        if other.transport.backend.is_some() {
            base.transport.backend = other.transport.backend;
        }
        if other.transport.queue_path.is_some() {
            base.transport.queue_path = other.transport.queue_path.clone();
        }
        if other.transport.autocommit.is_some() {
            base.transport.autocommit = other.transport.autocommit;
        }
        if other.transport.idle_flush_ms.is_some() {
            base.transport.idle_flush_ms = other.transport.idle_flush_ms;
        }
        if other.transport.max_message_size.is_some() {
            base.transport.max_message_size = other.transport.max_message_size;
        }
        if other.transport.channel_capacity.is_some() {
            base.transport.channel_capacity = other.transport.channel_capacity;
        }
        if other.transport.unlink_stale.is_some() {
            base.transport.unlink_stale = other.transport.unlink_stale;
        }

        // Run
        if other.run.track.is_some() {
            base.run.track = other.run.track;
        }
        if other.run.id.is_some() {
            base.run.id = other.run.id;
        }
        if other.run.filter.is_some() {
            base.run.filter = other.run.filter.clone();
        }
        if other.run.version.is_some() {
            base.run.version = other.run.version.clone();
        }
        if other.run.sha.is_some() {
            base.run.sha = other.run.sha.clone();
        }
        if other.run.skip.is_some() {
            base.run.skip = other.run.skip;
        }
    }

    /// Apply `CSTRUCT_*` environment overrides.
    ///
    /// Unparsable numbers and booleans are ignored; an unknown backend name
    /// is an error because silently falling back would send facts elsewhere.
    fn apply_env_overrides(config: &mut CstructConfig) -> Result<(), ConfigError> {
        if let Ok(val) = std::env::var("CSTRUCT_DB") {
            config.storage.database = Some(val);
        }
        if let Ok(val) = std::env::var("CSTRUCT_BASE_PATH") {
            config.storage.base_path = Some(val);
        }
        if let Ok(val) = std::env::var("CSTRUCT_STAGING_DIR") {
            config.storage.staging_dir = Some(val);
        }
        if let Ok(val) = std::env::var("CSTRUCT_LOCK_DIR") {
            config.storage.lock_dir = Some(val);
        }
        if let Ok(val) = std::env::var("CSTRUCT_FILTER") {
            config.run.filter = Some(val);
        }
        if let Ok(val) = std::env::var("CSTRUCT_RUN_ID") {
            if let Ok(v) = val.parse::<i64>() {
                config.run.id = Some(v);
            }
        }
        if let Ok(val) = std::env::var("CSTRUCT_BACKEND") {
            config.transport.backend = Some(val.parse::<Backend>()?);
        }
        if let Ok(val) = std::env::var("CSTRUCT_QUEUE") {
            config.transport.queue_path = Some(val);
        }
        if let Ok(val) = std::env::var("CSTRUCT_AUTOCOMMIT") {
            if let Some(v) = parse_flag(&val) {
                config.transport.autocommit = Some(v);
            }
        }
        Ok(())
    }

    /// Apply CLI overrides (highest priority).
    fn apply_cli_overrides(config: &mut CstructConfig, cli: &CliOverrides) {
        if let Some(ref v) = cli.database {
            config.storage.database = Some(v.clone());
        }
        if let Some(ref v) = cli.base_path {
            config.storage.base_path = Some(v.clone());
        }
        if let Some(ref v) = cli.filter {
            config.run.filter = Some(v.clone());
        }
        if let Some(v) = cli.autocommit {
            config.transport.autocommit = Some(v);
        }
        if let Some(ref v) = cli.queue_path {
            config.transport.queue_path = Some(v.clone());
        }
        if let Some(v) = cli.unlink_stale {
            config.transport.unlink_stale = Some(v);
        }
    }

    /// Serialize the config back to TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ParseError {
            path: "<serialization>".to_string(),
            message: e.to_string(),
        })
    }
}

fn parse_flag(val: &str) -> Option<bool> {
    match val.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Returns the user-level config directory: `~/.cstruct/`.
fn dirs_path() -> Option<std::path::PathBuf> {
    home_dir().map(|h| h.join(".cstruct"))
}

fn home_dir() -> Option<std::path::PathBuf> {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(std::path::PathBuf::from)
}
