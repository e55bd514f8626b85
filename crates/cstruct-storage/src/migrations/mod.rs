//! Schema migrations using PRAGMA user_version.
//!
//! Staging stores and the corpus share one schema, so a staged row can be
//! copied into the corpus column for column.

pub mod v001_initial;
pub mod v002_views;

use cstruct_core::errors::StorageError;
use rusqlite::{Connection, Transaction, TransactionBehavior};

use crate::connection::to_storage_err;

/// Latest schema version.
pub const LATEST_VERSION: u32 = 2;

/// Run all pending migrations in one immediate transaction, so two
/// processes creating the same store cannot interleave.
pub fn run_migrations(conn: &Connection) -> Result<(), StorageError> {
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)
        .map_err(to_storage_err)?;

    let current_version: u32 = tx
        .pragma_query_value(None, "user_version", |row| row.get(0))
        .map_err(|e| StorageError::MigrationFailed {
            version: 0,
            message: e.to_string(),
        })?;

    let migrations: &[(&str, u32)] = &[
        (v001_initial::MIGRATION_SQL, 1),
        (v002_views::MIGRATION_SQL, 2),
    ];

    for (sql, version) in migrations {
        if current_version < *version {
            tx.execute_batch(sql).map_err(|e| StorageError::MigrationFailed {
                version: *version,
                message: e.to_string(),
            })?;
            tx.pragma_update(None, "user_version", version)
                .map_err(|e| StorageError::MigrationFailed {
                    version: *version,
                    message: e.to_string(),
                })?;
            tracing::debug!(version = version, "applied migration");
        }
    }

    tx.commit().map_err(|e| StorageError::MigrationFailed {
        version: LATEST_VERSION,
        message: e.to_string(),
    })
}

/// Get the current schema version.
pub fn current_version(conn: &Connection) -> Result<u32, StorageError> {
    conn.pragma_query_value(None, "user_version", |row| row.get(0))
        .map_err(|e| StorageError::SqliteError {
            message: e.to_string(),
        })
}
