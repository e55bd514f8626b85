//! The consolidated store: the one corpus every process merges into.

use std::path::{Path, PathBuf};

use cstruct_core::errors::StorageError;
use cstruct_core::types::{RunId, RunInfo};
use rusqlite::{Connection, OpenFlags};

use crate::connection::pragmas::apply_read_pragmas;
use crate::connection::{open_connection, to_storage_err, RetryPolicy};
use crate::migrations;
use crate::queries::views::{
    list_members, list_struct_members, list_structs, list_unused, list_uses, list_uses_of_member,
    page_members, page_structs, page_unused,
};
use crate::queries::{
    self, FactCounts, MemberRow, Page, RunRow, StructMemberRow, StructRow, UnusedRow, UseFilter,
    UseRow, ViewFilter,
};
use crate::retention::{self, PruneReport};

/// Owns one connection to the corpus.
pub struct ConsolidatedStore {
    conn: Connection,
    path: Option<PathBuf>,
    retry: RetryPolicy,
}

impl ConsolidatedStore {
    /// Open or create the corpus at `path`, apply pragmas, run migrations.
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        let conn = open_connection(path)?;
        migrations::run_migrations(&conn)?;
        tracing::debug!(path = %path.display(), "opened corpus");
        Ok(Self {
            conn,
            path: Some(path.to_path_buf()),
            retry: RetryPolicy::default(),
        })
    }

    /// Open an in-memory corpus.
    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory().map_err(to_storage_err)?;
        crate::connection::pragmas::apply_pragmas(&conn)?;
        migrations::run_migrations(&conn)?;
        Ok(Self {
            conn,
            path: None,
            retry: RetryPolicy::default(),
        })
    }

    /// Open an existing corpus for listings only.
    pub fn open_read_only(path: &Path) -> Result<Self, StorageError> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| StorageError::OpenFailed {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        apply_read_pragmas(&conn)?;
        Ok(Self {
            conn,
            path: Some(path.to_path_buf()),
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Hand the connection to a dedicated writer.
    pub fn into_connection(self) -> Connection {
        self.conn
    }

    /// Database file path (None for in-memory).
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Record a new run; facts merged under it carry its id.
    pub fn create_run(&self, info: &RunInfo) -> Result<RunId, StorageError> {
        let id = queries::runs::insert_run(&self.conn, info)?;
        tracing::info!(run = %id, version = ?info.version, sha = ?info.sha, "created run");
        Ok(id)
    }

    pub fn runs(&self) -> Result<Vec<RunRow>, StorageError> {
        queries::runs::list_runs(&self.conn)
    }

    pub fn delete_run(&self, run: RunId) -> Result<PruneReport, StorageError> {
        retention::delete_run(&self.conn, &self.retry, run)
    }

    pub fn reset(&self) -> Result<PruneReport, StorageError> {
        retention::reset(&self.conn, &self.retry)
    }

    pub fn counts(&self) -> Result<FactCounts, StorageError> {
        queries::fact_counts(&self.conn, "main")
    }

    pub fn structs(&self, filter: &ViewFilter) -> Result<Vec<StructRow>, StorageError> {
        list_structs(&self.conn, filter)
    }

    pub fn members(&self, filter: &ViewFilter) -> Result<Vec<MemberRow>, StorageError> {
        list_members(&self.conn, filter)
    }

    pub fn uses(&self, filter: &UseFilter) -> Result<Vec<UseRow>, StorageError> {
        list_uses(&self.conn, filter)
    }

    pub fn unused(&self, filter: &ViewFilter) -> Result<Vec<UnusedRow>, StorageError> {
        list_unused(&self.conn, filter)
    }

    /// Paged listings: one page plus the number of matching rows.
    pub fn structs_page(&self, filter: &ViewFilter) -> Result<Page<StructRow>, StorageError> {
        page_structs(&self.conn, filter)
    }

    pub fn members_page(&self, filter: &ViewFilter) -> Result<Page<MemberRow>, StorageError> {
        page_members(&self.conn, filter)
    }

    pub fn unused_page(&self, filter: &ViewFilter) -> Result<Page<UnusedRow>, StorageError> {
        page_unused(&self.conn, filter)
    }

    /// Uses of one member ordered by file, then line.
    pub fn uses_of_member(&self, member: i64) -> Result<Vec<UseRow>, StorageError> {
        list_uses_of_member(&self.conn, member)
    }

    /// Members of one struct, each with the inline struct declared at its
    /// position, if any.
    pub fn struct_members(&self, struct_id: i64) -> Result<Vec<StructMemberRow>, StorageError> {
        list_struct_members(&self.conn, struct_id)
    }

    /// Look up one member by struct and member name.
    pub fn member(&self, struct_name: &str, member: &str) -> Result<Option<MemberRow>, StorageError> {
        let filter = ViewFilter {
            struct_name: Some(struct_name.to_string()),
            ..Default::default()
        };
        Ok(self
            .members(&filter)?
            .into_iter()
            .find(|row| row.member == member))
    }

    /// Run a WAL checkpoint (TRUNCATE mode).
    pub fn checkpoint(&self) -> Result<(), StorageError> {
        self.conn
            .execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")
            .map_err(to_storage_err)
    }
}
