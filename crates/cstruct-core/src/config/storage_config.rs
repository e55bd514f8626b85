//! Store locations.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_DATABASE, DEFAULT_LOCK_NAME};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct StorageConfig {
    /// Corpus database file. Default: `structs.db`.
    pub database: Option<String>,
    /// Directory for per-process staging stores. Default: OS temp dir.
    pub staging_dir: Option<String>,
    /// Directory holding the host lock file. Default: OS temp dir.
    pub lock_dir: Option<String>,
    /// Host lock name. Default: `clang_struct`.
    pub lock_name: Option<String>,
    /// Prefix stripped from recorded source paths.
    pub base_path: Option<String>,
    /// Keep the staging store after a successful merge. Default: false.
    pub keep_staging: Option<bool>,
}

impl StorageConfig {
    pub fn effective_database(&self) -> PathBuf {
        PathBuf::from(self.database.as_deref().unwrap_or(DEFAULT_DATABASE))
    }

    pub fn effective_staging_dir(&self) -> PathBuf {
        self.staging_dir
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(std::env::temp_dir)
    }

    pub fn effective_lock_dir(&self) -> PathBuf {
        self.lock_dir
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(std::env::temp_dir)
    }

    pub fn effective_lock_name(&self) -> &str {
        self.lock_name.as_deref().unwrap_or(DEFAULT_LOCK_NAME)
    }

    pub fn effective_keep_staging(&self) -> bool {
        self.keep_staging.unwrap_or(false)
    }
}
