//! Write transactions.

use cstruct_core::errors::StorageError;
use rusqlite::{Connection, Transaction, TransactionBehavior};

use super::busy::RetryPolicy;
use super::to_storage_err;

/// Execute a write operation inside a BEGIN IMMEDIATE transaction.
///
/// The write lock is taken at BEGIN, retried per `retry` while the engine
/// reports busy. Any error from `f` rolls the transaction back.
pub fn with_immediate_transaction<F, T>(
    conn: &Connection,
    retry: &RetryPolicy,
    f: F,
) -> Result<T, StorageError>
where
    F: FnOnce(&Transaction<'_>) -> Result<T, StorageError>,
{
    let tx = retry.run("begin immediate", || {
        Transaction::new_unchecked(conn, TransactionBehavior::Immediate).map_err(to_storage_err)
    })?;

    let result = f(&tx)?;

    tx.commit().map_err(|e| StorageError::SqliteError {
        message: format!("failed to commit: {e}"),
    })?;

    Ok(result)
}
