//! Merge errors.

use super::error_code::CstructErrorCode;
use super::{LockError, StorageError};

/// A failed merge. The corpus transaction has been rolled back and the
/// staging store is untouched.
#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    #[error("merge lock: {0}")]
    Lock(#[from] LockError),

    #[error("merge storage: {0}")]
    Storage(#[from] StorageError),
}

impl CstructErrorCode for MergeError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Lock(e) => e.error_code(),
            Self::Storage(e) => e.error_code(),
        }
    }
}
