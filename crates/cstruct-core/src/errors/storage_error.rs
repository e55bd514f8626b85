//! Storage errors.

use super::error_code::{self, CstructErrorCode};

/// Errors raised by SQLite-backed stores (staging and corpus).
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("SQLite error: {message}")]
    SqliteError { message: String },

    #[error("cannot open store at {path}: {message}")]
    OpenFailed { path: String, message: String },

    #[error("migration failed at version {version}: {message}")]
    MigrationFailed { version: u32, message: String },

    #[error("database busy")]
    DbBusy,

    #[error("no parameter :{key} in {kind} insert")]
    UnknownParameter { kind: String, key: String },
}

impl StorageError {
    /// True for engine-level contention that a retry may clear.
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::DbBusy)
    }
}

impl CstructErrorCode for StorageError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::DbBusy => error_code::DB_BUSY,
            Self::MigrationFailed { .. } => error_code::MIGRATION_FAILED,
            Self::UnknownParameter { .. } => error_code::UNKNOWN_PARAMETER,
            _ => error_code::STORAGE_ERROR,
        }
    }
}
