//! Merge engine: moves one staging store into the corpus.
//!
//! The corpus is attached to the staging connection, so one transaction
//! reads staged rows and writes corpus rows. Only that transaction runs
//! under the host lock; staging never does. Every insert is
//! `INSERT OR IGNORE` on a natural key, which makes merges idempotent and
//! independent of the order processes finish in.

pub mod sql;

use std::path::{Path, PathBuf};
use std::time::Instant;

use cstruct_core::errors::{CstructErrorCode, MergeError, StorageError};
use cstruct_core::tracing::metrics::{LOCK_WAIT_MS, MERGE_DURATION_MS, UNRESOLVED_MEMBERS, UNRESOLVED_USES};
use cstruct_core::types::RunId;
use rusqlite::{params, Connection, Transaction};
use serde::Serialize;

use crate::connection::writer::with_immediate_transaction;
use crate::connection::{to_storage_err, RetryPolicy};
use crate::corpus::ConsolidatedStore;
use crate::lock::HostLock;
use crate::queries::{fact_counts, FactCounts};
use crate::staging::StagingStore;

const CORPUS_SCHEMA: &str = "corpus";

/// What one merge did.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MergeReport {
    pub run: Option<RunId>,
    /// Rows in the staging store.
    pub staged: FactCounts,
    /// Rows new to the corpus.
    pub inserted: FactCounts,
    /// Staged members whose struct has no corpus row.
    pub unresolved_members: u64,
    /// Staged uses whose member has no corpus row.
    pub unresolved_uses: u64,
    /// The previous lock holder died holding the lock.
    pub recovered_lock: bool,
    pub lock_wait_ms: u64,
    pub duration_ms: u64,
}

impl MergeReport {
    /// Every staged fact found its owner in the corpus.
    pub fn is_fully_resolved(&self) -> bool {
        self.unresolved_members == 0 && self.unresolved_uses == 0
    }
}

pub struct MergeEngine {
    corpus: PathBuf,
    lock: HostLock,
    retry: RetryPolicy,
    run: Option<RunId>,
    schema_ready: bool,
}

impl MergeEngine {
    pub fn new(corpus: &Path, lock: HostLock, retry: RetryPolicy) -> Self {
        Self {
            corpus: corpus.to_path_buf(),
            lock,
            retry,
            run: None,
            schema_ready: false,
        }
    }

    /// Stamp merged rows with `run`.
    pub fn with_run(mut self, run: Option<RunId>) -> Self {
        self.run = run;
        self
    }

    pub fn corpus_path(&self) -> &Path {
        &self.corpus
    }

    /// Merge `staging` into the corpus.
    ///
    /// On error nothing has been written to the corpus, the lock is
    /// released, and `staging` still holds every staged fact.
    pub fn merge(&mut self, staging: &mut StagingStore) -> Result<MergeReport, MergeError> {
        let span = tracing::info_span!("merge", staging = %staging.path().display());
        let _enter = span.enter();

        staging.flush()?;

        let wait_start = Instant::now();
        let mut guard = self.lock.acquire()?;
        let lock_wait_ms = wait_start.elapsed().as_millis() as u64;

        let recovered_lock = guard.state().is_recovered();
        if recovered_lock {
            tracing::warn!(state = ?guard.state(), "previous merge holder died; recovering lock");
            guard.mark_consistent()?;
        }

        let start = Instant::now();
        if !self.schema_ready {
            ConsolidatedStore::open(&self.corpus)?;
            self.schema_ready = true;
        }

        let conn = staging.connection();
        attach(conn, &self.corpus, &self.retry)?;
        let result = with_immediate_transaction(conn, &self.retry, |tx| transfer(tx, self.run));
        detach(conn);
        drop(guard);

        let mut report = match result {
            Ok(report) => report,
            Err(e) => {
                tracing::error!(error = %e.diagnostic(), "merge rolled back; staging store kept");
                return Err(e.into());
            }
        };
        report.run = self.run;
        report.recovered_lock = recovered_lock;
        report.lock_wait_ms = lock_wait_ms;
        report.duration_ms = start.elapsed().as_millis() as u64;

        if !report.is_fully_resolved() {
            tracing::warn!(
                { UNRESOLVED_MEMBERS } = report.unresolved_members,
                { UNRESOLVED_USES } = report.unresolved_uses,
                "staged facts did not resolve by natural key; they were not merged"
            );
        }
        tracing::info!(
            { MERGE_DURATION_MS } = report.duration_ms,
            { LOCK_WAIT_MS } = report.lock_wait_ms,
            inserted = report.inserted.total(),
            staged = report.staged.total(),
            "merged staging store"
        );
        Ok(report)
    }
}

fn attach(conn: &Connection, corpus: &Path, retry: &RetryPolicy) -> Result<(), StorageError> {
    let path = corpus.to_string_lossy().into_owned();
    retry.run("attach corpus", || {
        conn.execute("ATTACH DATABASE ?1 AS corpus", params![path])
            .map(|_| ())
            .map_err(to_storage_err)
    })
}

fn detach(conn: &Connection) {
    if let Err(e) = conn.execute_batch("DETACH DATABASE corpus") {
        tracing::warn!(error = %e, "could not detach corpus");
    }
}

fn transfer(tx: &Transaction<'_>, run: Option<RunId>) -> Result<MergeReport, StorageError> {
    let run = run.map(|r| r.0);
    let staged = fact_counts(tx, "main")?;
    let before = fact_counts(tx, CORPUS_SCHEMA)?;

    tx.execute(sql::INSERT_SOURCES, params![run])
        .map_err(to_storage_err)?;
    tx.execute(sql::INSERT_STRUCTS, params![run])
        .map_err(to_storage_err)?;
    tx.execute(&sql::insert_members(), params![run])
        .map_err(to_storage_err)?;
    tx.execute(&sql::insert_uses(), params![run])
        .map_err(to_storage_err)?;

    let resolved_members = count(tx, &sql::count_resolved_members())?;
    let resolved_uses = count(tx, &sql::count_resolved_uses())?;
    let after = fact_counts(tx, CORPUS_SCHEMA)?;

    Ok(MergeReport {
        staged,
        inserted: after.saturating_sub(&before),
        unresolved_members: staged.members.saturating_sub(resolved_members),
        unresolved_uses: staged.uses.saturating_sub(resolved_uses),
        ..Default::default()
    })
}

fn count(conn: &Connection, sql: &str) -> Result<u64, StorageError> {
    conn.query_row(sql, [], |row| row.get::<_, i64>(0))
        .map(|n| n as u64)
        .map_err(to_storage_err)
}
