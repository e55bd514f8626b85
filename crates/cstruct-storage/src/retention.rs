//! Corpus pruning.
//!
//! Rows are never updated or deleted individually. A run is removed with
//! everything that references it through `ON DELETE CASCADE`; a reset
//! empties every table. The `use` delete trigger keeps member counters in
//! step with the remaining `use` rows.

use std::time::Instant;

use cstruct_core::errors::StorageError;
use cstruct_core::types::RunId;
use rusqlite::{params, Connection};
use serde::Serialize;

use crate::connection::writer::with_immediate_transaction;
use crate::connection::{to_storage_err, RetryPolicy};
use crate::queries::{fact_counts, FactCounts};

/// What a prune removed.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PruneReport {
    pub runs: u64,
    pub deleted: FactCounts,
    pub duration_ms: u64,
}

/// Delete one run and every fact cascading from it.
pub fn delete_run(
    conn: &Connection,
    retry: &RetryPolicy,
    run: RunId,
) -> Result<PruneReport, StorageError> {
    let start = Instant::now();
    let (runs, deleted) = with_immediate_transaction(conn, retry, |tx| {
        let before = fact_counts(tx, "main")?;
        let runs = tx
            .execute("DELETE FROM run WHERE id = ?1", params![run.0])
            .map_err(to_storage_err)?;
        let after = fact_counts(tx, "main")?;
        Ok((runs as u64, before.saturating_sub(&after)))
    })?;

    let report = PruneReport {
        runs,
        deleted,
        duration_ms: start.elapsed().as_millis() as u64,
    };
    tracing::info!(run = %run, rows = report.deleted.total(), "pruned run");
    Ok(report)
}

/// Empty the corpus, runs included.
pub fn reset(conn: &Connection, retry: &RetryPolicy) -> Result<PruneReport, StorageError> {
    let start = Instant::now();
    let (runs, deleted) = with_immediate_transaction(conn, retry, |tx| {
        let before = fact_counts(tx, "main")?;
        tx.execute_batch(
            "DELETE FROM use;
             DELETE FROM member;
             DELETE FROM struct;
             DELETE FROM source;",
        )
        .map_err(to_storage_err)?;
        let runs = tx.execute("DELETE FROM run", []).map_err(to_storage_err)?;
        Ok((runs as u64, before))
    })?;

    let report = PruneReport {
        runs,
        deleted,
        duration_ms: start.elapsed().as_millis() as u64,
    };
    tracing::info!(rows = report.deleted.total(), "reset corpus");
    Ok(report)
}
