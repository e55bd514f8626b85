//! Connection plumbing shared by the staging store, the corpus, and the
//! filler's writer thread.

pub mod busy;
pub mod pragmas;
pub mod writer;

use std::path::Path;

use cstruct_core::errors::StorageError;
use rusqlite::{Connection, ErrorCode};

pub use busy::RetryPolicy;

/// Open (or create) a database file and apply write pragmas.
pub fn open_connection(path: &Path) -> Result<Connection, StorageError> {
    let conn = Connection::open(path).map_err(|e| StorageError::OpenFailed {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    pragmas::apply_pragmas(&conn)?;
    Ok(conn)
}

/// Map an engine error, keeping busy/locked distinguishable for retries.
pub fn to_storage_err(e: rusqlite::Error) -> StorageError {
    if is_busy(&e) {
        StorageError::DbBusy
    } else {
        StorageError::SqliteError {
            message: e.to_string(),
        }
    }
}

/// `SQLITE_BUSY` or `SQLITE_LOCKED`.
pub fn is_busy(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _)
            if matches!(err.code, ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
    )
}

/// A UNIQUE or PRIMARY KEY violation: the fact is already stored.
pub fn is_unique_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _)
            if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                || err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
    )
}
