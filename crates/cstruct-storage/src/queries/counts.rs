//! Row counts per fact table.

use cstruct_core::errors::StorageError;
use rusqlite::Connection;
use serde::Serialize;

use crate::connection::to_storage_err;

/// Rows per fact table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FactCounts {
    pub sources: u64,
    pub structs: u64,
    pub members: u64,
    pub uses: u64,
}

impl FactCounts {
    pub fn total(&self) -> u64 {
        self.sources + self.structs + self.members + self.uses
    }

    /// Per-table difference, clamped at zero.
    pub fn saturating_sub(&self, other: &FactCounts) -> FactCounts {
        FactCounts {
            sources: self.sources.saturating_sub(other.sources),
            structs: self.structs.saturating_sub(other.structs),
            members: self.members.saturating_sub(other.members),
            uses: self.uses.saturating_sub(other.uses),
        }
    }
}

/// Count facts in `schema` (`main`, or an attached schema name).
pub fn fact_counts(conn: &Connection, schema: &str) -> Result<FactCounts, StorageError> {
    let sql = format!(
        "SELECT (SELECT COUNT(*) FROM {schema}.source),
                (SELECT COUNT(*) FROM {schema}.struct),
                (SELECT COUNT(*) FROM {schema}.member),
                (SELECT COUNT(*) FROM {schema}.use)"
    );
    conn.query_row(&sql, [], |row| {
        Ok(FactCounts {
            sources: row.get::<_, i64>(0)? as u64,
            structs: row.get::<_, i64>(1)? as u64,
            members: row.get::<_, i64>(2)? as u64,
            uses: row.get::<_, i64>(3)? as u64,
        })
    })
    .map_err(to_storage_err)
}
