//! Host lock errors.

use super::error_code::{self, CstructErrorCode};

/// Errors raised by the host-scoped merge lock.
#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("cannot open lock file {path}: {message}")]
    OpenFailed { path: String, message: String },

    #[error("cannot acquire lock {path}: {message}")]
    AcquireFailed { path: String, message: String },

    #[error("cannot update holder marker in {path}: {message}")]
    MarkerFailed { path: String, message: String },
}

impl CstructErrorCode for LockError {
    fn error_code(&self) -> &'static str {
        error_code::LOCK_ERROR
    }
}
