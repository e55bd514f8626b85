//! Queries for the run table.

use cstruct_core::errors::StorageError;
use cstruct_core::types::{RunId, RunInfo};
use rusqlite::{params, Connection};
use serde::Serialize;

use crate::connection::to_storage_err;

/// A run record.
#[derive(Debug, Clone, Serialize)]
pub struct RunRow {
    pub id: RunId,
    pub version: Option<String>,
    pub sha: Option<String>,
    pub filter: Option<String>,
    pub skip: bool,
    pub timestamp: String,
}

/// Insert a run. The store assigns id and timestamp.
pub fn insert_run(conn: &Connection, info: &RunInfo) -> Result<RunId, StorageError> {
    conn.execute(
        "INSERT INTO run (version, sha, filter, skip) VALUES (?1, ?2, ?3, ?4)",
        params![info.version, info.sha, info.filter, info.skip],
    )
    .map_err(to_storage_err)?;
    Ok(RunId(conn.last_insert_rowid()))
}

/// All runs, oldest first.
pub fn list_runs(conn: &Connection) -> Result<Vec<RunRow>, StorageError> {
    let mut stmt = conn
        .prepare_cached("SELECT id, version, sha, filter, skip, timestamp FROM run ORDER BY id")
        .map_err(to_storage_err)?;

    let rows = stmt
        .query_map([], |row| {
            Ok(RunRow {
                id: RunId(row.get(0)?),
                version: row.get(1)?,
                sha: row.get(2)?,
                filter: row.get(3)?,
                skip: row.get(4)?,
                timestamp: row.get(5)?,
            })
        })
        .map_err(to_storage_err)?;

    rows.collect::<Result<Vec<_>, _>>().map_err(to_storage_err)
}
