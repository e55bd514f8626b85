//! Per-process staging store.
//!
//! Each analysis process writes its facts to its own SQLite file
//! (`structs-<pid>.db`) with no cross-process coordination. The file uses
//! the corpus schema, so the merge can copy rows with set-based inserts.
//! Facts stay in one open transaction until [`StagingStore::flush`].

use std::path::{Path, PathBuf};

use cstruct_core::errors::StorageError;
use cstruct_core::types::{Fact, MemberFact, SourceFact, StructFact, UseFact};
use rusqlite::Connection;

use crate::connection::{open_connection, to_storage_err};
use crate::migrations;
use crate::queries::{fact_counts, FactCounts};
use crate::statements::{execute_message, Executed, OnConflict};
use crate::transport::message::Message;

/// Outcome of staging one fact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageOutcome {
    Inserted,
    /// Already staged; seen twice in one translation unit.
    Duplicate,
    /// The owning source, struct, or member is not staged.
    Unresolved,
}

pub struct StagingStore {
    conn: Connection,
    path: PathBuf,
    in_transaction: bool,
}

impl StagingStore {
    /// File name of the staging store for process `pid`.
    pub fn file_name(pid: u32) -> String {
        format!("structs-{pid}.db")
    }

    /// Open the staging store of the current process inside `dir`.
    pub fn open_in_dir(dir: &Path) -> Result<Self, StorageError> {
        Self::open(&dir.join(Self::file_name(std::process::id())))
    }

    /// Open or create a staging store. Reopening keeps what was staged.
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        let conn = open_connection(path)?;
        migrations::run_migrations(&conn)?;
        tracing::debug!(path = %path.display(), "opened staging store");
        Ok(Self {
            conn,
            path: path.to_path_buf(),
            in_transaction: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The staging connection. The merge attaches the corpus to it.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Stage one fact. Each fact is a single statement, so it is either
    /// staged whole or not at all.
    pub fn stage(&mut self, fact: &Fact) -> Result<StageOutcome, StorageError> {
        self.begin()?;
        let message = Message::from_fact(fact);
        let outcome = match execute_message(&self.conn, &message, None, OnConflict::Fail)? {
            Executed::Inserted => StageOutcome::Inserted,
            Executed::Duplicate => StageOutcome::Duplicate,
            Executed::NoChange => StageOutcome::Unresolved,
        };
        if outcome == StageOutcome::Unresolved {
            tracing::debug!(kind = %fact.kind(), struct_name = ?fact.struct_name(), "owner not staged");
        }
        Ok(outcome)
    }

    pub fn add_source(&mut self, fact: SourceFact) -> Result<StageOutcome, StorageError> {
        self.stage(&Fact::Source(fact))
    }

    pub fn add_struct(&mut self, fact: StructFact) -> Result<StageOutcome, StorageError> {
        self.stage(&Fact::Struct(fact))
    }

    pub fn add_member(&mut self, fact: MemberFact) -> Result<StageOutcome, StorageError> {
        self.stage(&Fact::Member(fact))
    }

    pub fn add_use(&mut self, fact: UseFact) -> Result<StageOutcome, StorageError> {
        self.stage(&Fact::Use(fact))
    }

    /// Commit staged facts.
    pub fn flush(&mut self) -> Result<(), StorageError> {
        if self.in_transaction {
            self.conn.execute_batch("COMMIT").map_err(to_storage_err)?;
            self.in_transaction = false;
        }
        Ok(())
    }

    /// Committed and pending facts.
    pub fn counts(&self) -> Result<FactCounts, StorageError> {
        fact_counts(&self.conn, "main")
    }

    /// Delete the store and its WAL files. Only after a successful merge.
    pub fn remove(self) -> Result<(), StorageError> {
        let StagingStore { conn, path, .. } = self;
        conn.close().map_err(|(_, e)| to_storage_err(e))?;
        for suffix in ["", "-wal", "-shm"] {
            let mut name = path.as_os_str().to_owned();
            name.push(suffix);
            let file = PathBuf::from(name);
            match std::fs::remove_file(&file) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(StorageError::SqliteError {
                        message: format!("cannot remove {}: {e}", file.display()),
                    })
                }
            }
        }
        tracing::debug!(path = %path.display(), "removed staging store");
        Ok(())
    }

    fn begin(&mut self) -> Result<(), StorageError> {
        if !self.in_transaction {
            self.conn.execute_batch("BEGIN").map_err(to_storage_err)?;
            self.in_transaction = true;
        }
        Ok(())
    }
}
