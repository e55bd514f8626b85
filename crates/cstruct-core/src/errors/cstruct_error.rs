//! Top-level error aggregating every subsystem via `From` conversions.

use super::error_code::CstructErrorCode;
use super::{ConfigError, LockError, MergeError, StorageError, TransportError};

#[derive(Debug, thiserror::Error)]
pub enum CstructError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Lock error: {0}")]
    Lock(#[from] LockError),

    #[error("Merge error: {0}")]
    Merge(#[from] MergeError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl CstructErrorCode for CstructError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Storage(e) => e.error_code(),
            Self::Lock(e) => e.error_code(),
            Self::Merge(e) => e.error_code(),
            Self::Transport(e) => e.error_code(),
            Self::Config(e) => e.error_code(),
        }
    }
}
