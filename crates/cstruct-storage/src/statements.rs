//! Fact insert statements, bound by parameter name from a [`Message`].
//!
//! Owners are resolved through natural-key joins inside the statement: a
//! member finds its struct by (source path, struct name, begin line, begin
//! column), a use finds its member by name under that struct. A statement
//! whose join finds nothing inserts nothing.

use cstruct_core::errors::StorageError;
use cstruct_core::types::{FactKind, RunId};
use rusqlite::Connection;

use crate::connection::{is_unique_violation, to_storage_err};
use crate::transport::message::{Message, Value};

/// What to do when a natural key already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnConflict {
    /// Report the violation as [`Executed::Duplicate`].
    Fail,
    /// Let the engine skip the row silently.
    Ignore,
}

impl OnConflict {
    fn verb(self) -> &'static str {
        match self {
            Self::Fail => "INSERT",
            Self::Ignore => "INSERT OR IGNORE",
        }
    }
}

/// Result of one fact insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Executed {
    Inserted,
    /// The natural key already exists.
    Duplicate,
    /// No row changed: the owner did not resolve, or the row was ignored.
    NoChange,
}

/// Parameter bound from the writer's run rather than from the message.
const RUN_PARAM: &str = ":run";

/// Insert SQL for one fact kind.
pub fn insert_sql(kind: FactKind, on_conflict: OnConflict) -> String {
    let verb = on_conflict.verb();
    match kind {
        FactKind::Source => format!("{verb} INTO source(run, src) VALUES (:run, :src)"),
        FactKind::Struct => format!(
            "{verb} INTO struct(run, type, name, attrs, packed, inMacro, src, \
                                begLine, begCol, endLine, endCol) \
             SELECT :run, :type, :name, :attrs, :packed, :inMacro, id, \
                    :begLine, :begCol, :endLine, :endCol \
             FROM source WHERE src = :src"
        ),
        FactKind::Member => format!(
            "{verb} INTO member(run, name, struct, begLine, begCol, endLine, endCol) \
             SELECT :run, :name, struct.id, :begLine, :begCol, :endLine, :endCol \
             FROM struct \
             JOIN source ON struct.src = source.id \
             WHERE source.src = :src \
               AND struct.name = :struct \
               AND struct.begLine = :strBegLine \
               AND struct.begCol = :strBegCol"
        ),
        FactKind::Use => format!(
            "{verb} INTO use(run, member, src, begLine, begCol, endLine, endCol, load, implicit) \
             SELECT :run, member.id, use_source.id, \
                    :begLine, :begCol, :endLine, :endCol, :load, :implicit \
             FROM member \
             JOIN struct ON member.struct = struct.id \
             JOIN source AS struct_source ON struct.src = struct_source.id \
             JOIN source AS use_source ON use_source.src = :use_src \
             WHERE member.name = :member \
               AND struct.name = :struct \
               AND struct_source.src = :strSrc \
               AND struct.begLine = :strLine \
               AND struct.begCol = :strCol \
             LIMIT 1"
        ),
    }
}

/// Bind `message` to the insert for its kind and execute it.
///
/// Every entry must name a statement parameter; parameters the message
/// does not mention are bound to NULL. `:run` always comes from `run`.
pub fn execute_message(
    conn: &Connection,
    message: &Message<'_>,
    run: Option<RunId>,
    on_conflict: OnConflict,
) -> Result<Executed, StorageError> {
    let kind = message.kind().ok_or_else(|| StorageError::SqliteError {
        message: "flush delimiter has no insert statement".to_string(),
    })?;

    let mut stmt = conn
        .prepare_cached(&insert_sql(kind, on_conflict))
        .map_err(to_storage_err)?;

    for entry in message.entries() {
        let name = format!(":{}", entry.key);
        if stmt.parameter_index(&name).map_err(to_storage_err)?.is_none() {
            return Err(StorageError::UnknownParameter {
                kind: kind.to_string(),
                key: entry.key.to_string(),
            });
        }
    }

    let names: Vec<String> = (1..=stmt.parameter_count())
        .map(|i| stmt.parameter_name(i).unwrap_or_default().to_string())
        .collect();
    for (offset, name) in names.iter().enumerate() {
        let index = offset + 1;
        if name == RUN_PARAM {
            stmt.raw_bind_parameter(index, run.map(|r| r.0))
                .map_err(to_storage_err)?;
            continue;
        }
        match message.get(name.trim_start_matches(':')) {
            Some(value) => stmt.raw_bind_parameter(index, value),
            None => stmt.raw_bind_parameter(index, Value::Null),
        }
        .map_err(to_storage_err)?;
    }

    match stmt.raw_execute() {
        Ok(0) => Ok(Executed::NoChange),
        Ok(_) => Ok(Executed::Inserted),
        Err(e) if is_unique_violation(&e) => Ok(Executed::Duplicate),
        Err(e) => Err(to_storage_err(e)),
    }
}
