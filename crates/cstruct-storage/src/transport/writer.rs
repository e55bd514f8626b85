//! Dedicated writer thread for the filler.
//!
//! Messages arrive over a bounded channel and are executed one by one. In
//! batched mode a transaction opens at the first insert and commits on a
//! flush, after an idle period, or at shutdown. In autocommit mode every
//! insert commits by itself.

use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use cstruct_core::config::TransportConfig;
use cstruct_core::errors::{CstructErrorCode, StorageError, TransportError};
use cstruct_core::tracing::metrics::{BATCH_COMMIT_MS, BATCH_ROWS};
use cstruct_core::types::{FactKind, RunId};
use rusqlite::Connection;
use serde::Serialize;

use crate::connection::{to_storage_err, RetryPolicy};
use crate::statements::{execute_message, Executed, OnConflict};

use super::message::Message;

pub enum WriterCommand {
    Insert(Message<'static>),
    Flush,
    Shutdown,
}

/// Rows written per kind, plus what did not make it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WriterStats {
    pub sources: u64,
    pub structs: u64,
    pub members: u64,
    pub uses: u64,
    /// Duplicates and facts whose owner did not resolve.
    pub ignored: u64,
    /// Messages the statement rejected.
    pub failed: u64,
    /// Committed batches, or inserted rows in autocommit mode.
    pub commits: u64,
}

impl WriterStats {
    pub fn inserted(&self) -> u64 {
        self.sources + self.structs + self.members + self.uses
    }

    fn count(&mut self, kind: FactKind) {
        match kind {
            FactKind::Source => self.sources += 1,
            FactKind::Struct => self.structs += 1,
            FactKind::Member => self.members += 1,
            FactKind::Use => self.uses += 1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct WriterOptions {
    /// Stamped on every inserted row.
    pub run: Option<RunId>,
    pub autocommit: bool,
    /// Commit an open batch after this long without messages.
    pub idle_flush: Duration,
    pub capacity: usize,
    pub retry: RetryPolicy,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self::from_config(&TransportConfig::default())
    }
}

impl WriterOptions {
    pub fn from_config(config: &TransportConfig) -> Self {
        Self {
            run: None,
            autocommit: config.effective_autocommit(),
            idle_flush: config.effective_idle_flush(),
            capacity: config.effective_channel_capacity(),
            retry: RetryPolicy::default(),
        }
    }
}

pub struct FactWriter {
    tx: Sender<WriterCommand>,
    handle: Option<JoinHandle<Result<WriterStats, StorageError>>>,
}

impl FactWriter {
    /// Move `conn` onto a new writer thread.
    pub fn new(conn: Connection, options: WriterOptions) -> Self {
        let (tx, rx) = bounded(options.capacity.max(1));
        let handle = std::thread::spawn(move || -> Result<WriterStats, StorageError> {
            let mut batch = Batch::new(&conn, &options);
            loop {
                match rx.recv_timeout(options.idle_flush) {
                    Ok(WriterCommand::Insert(message)) => batch.insert(&message)?,
                    Ok(WriterCommand::Flush) => batch.commit("flush")?,
                    Err(RecvTimeoutError::Timeout) => batch.commit("idle")?,
                    Ok(WriterCommand::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            batch.commit("shutdown")?;
            Ok(batch.stats)
        });
        Self {
            tx,
            handle: Some(handle),
        }
    }

    pub fn send(&self, command: WriterCommand) -> Result<(), TransportError> {
        self.tx.send(command).map_err(|_| TransportError::WriterGone)
    }

    pub fn insert(&self, message: Message<'static>) -> Result<(), TransportError> {
        self.send(WriterCommand::Insert(message))
    }

    pub fn flush(&self) -> Result<(), TransportError> {
        self.send(WriterCommand::Flush)
    }

    /// Commit what is pending, stop the thread, and return its statistics.
    pub fn shutdown(mut self) -> Result<WriterStats, StorageError> {
        self.join()
    }

    fn join(&mut self) -> Result<WriterStats, StorageError> {
        let Some(handle) = self.handle.take() else {
            return Ok(WriterStats::default());
        };
        // The thread may already have stopped on an error.
        let _ = self.tx.send(WriterCommand::Shutdown);
        handle.join().map_err(|_| StorageError::SqliteError {
            message: "writer thread panicked".to_string(),
        })?
    }
}

impl Drop for FactWriter {
    fn drop(&mut self) {
        if let Err(e) = self.join() {
            tracing::error!(error = %e.diagnostic(), "writer stopped with an error");
        }
    }
}

/// Writer-thread state: the connection and the open batch, if any.
struct Batch<'c> {
    conn: &'c Connection,
    run: Option<RunId>,
    autocommit: bool,
    retry: RetryPolicy,
    open: bool,
    rows: u64,
    stats: WriterStats,
}

impl<'c> Batch<'c> {
    fn new(conn: &'c Connection, options: &WriterOptions) -> Self {
        Self {
            conn,
            run: options.run,
            autocommit: options.autocommit,
            retry: options.retry,
            open: false,
            rows: 0,
            stats: WriterStats::default(),
        }
    }

    fn insert(&mut self, message: &Message<'_>) -> Result<(), StorageError> {
        let Some(kind) = message.kind().filter(|_| !message.is_flush()) else {
            return self.commit("flush");
        };
        if !self.autocommit && !self.open {
            self.retry.run("begin batch", || {
                self.conn.execute_batch("BEGIN IMMEDIATE").map_err(to_storage_err)
            })?;
            self.open = true;
        }

        match execute_message(self.conn, message, self.run, OnConflict::Ignore) {
            Ok(Executed::Inserted) => {
                self.stats.count(kind);
                self.rows += 1;
                if self.autocommit {
                    self.stats.commits += 1;
                }
            }
            Ok(Executed::Duplicate | Executed::NoChange) => self.stats.ignored += 1,
            Err(e) if e.is_busy() => return Err(e),
            Err(e) => {
                self.stats.failed += 1;
                tracing::warn!(kind = %kind, error = %e.diagnostic(), "message rejected");
            }
        }
        Ok(())
    }

    fn commit(&mut self, reason: &'static str) -> Result<(), StorageError> {
        if !self.open {
            return Ok(());
        }
        let start = Instant::now();
        self.conn
            .execute_batch("COMMIT")
            .map_err(|e| StorageError::SqliteError {
                message: format!("failed to commit batch: {e}"),
            })?;
        self.open = false;
        self.stats.commits += 1;
        tracing::debug!(
            reason,
            { BATCH_ROWS } = self.rows,
            { BATCH_COMMIT_MS } = start.elapsed().as_millis() as u64,
            "batch committed"
        );
        self.rows = 0;
        Ok(())
    }
}

impl Drop for Batch<'_> {
    fn drop(&mut self) {
        if self.open {
            if let Err(e) = self.conn.execute_batch("ROLLBACK") {
                tracing::warn!(error = %e, "could not roll back batch");
            }
        }
    }
}
