//! Listings over the four views, with the usual narrowing filters.

use cstruct_core::errors::StorageError;
use cstruct_core::types::{Access, RunId, StructKind};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params_from_iter, Connection, Row};
use serde::Serialize;

use crate::connection::to_storage_err;

/// Narrowing shared by struct, member, and unused listings.
#[derive(Debug, Clone, Default)]
pub struct ViewFilter {
    pub run: Option<RunId>,
    /// Exact struct name.
    pub struct_name: Option<String>,
    /// Substring of the struct name, or of the member name in member
    /// listings.
    pub name_like: Option<String>,
    /// Substring of the source path.
    pub file_like: Option<String>,
    /// Skip structs whose attributes mention `packed`.
    pub no_packed: bool,
    /// Page size. `None` lists everything.
    pub limit: Option<u64>,
    pub offset: u64,
}

/// Narrowing for use listings.
#[derive(Debug, Clone, Default)]
pub struct UseFilter {
    pub view: ViewFilter,
    pub member: Option<String>,
    /// Only uses with this direction.
    pub access: Option<Access>,
    /// Skip compiler-synthesized uses.
    pub no_implicit: bool,
}

/// One page of a listing and the number of rows matching the filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    pub rows: Vec<T>,
    pub total: u64,
    /// Offset of the next page, if any rows remain.
    pub next_offset: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StructRow {
    pub id: i64,
    pub run: Option<RunId>,
    pub kind: StructKind,
    pub name: String,
    pub attrs: Option<String>,
    pub packed: bool,
    pub in_macro: bool,
    pub src: String,
    pub loc: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemberRow {
    pub id: i64,
    pub run: Option<RunId>,
    pub struct_name: String,
    pub attrs: Option<String>,
    pub member: String,
    pub src: String,
    pub loc: String,
    pub uses: i64,
    pub loads: i64,
    pub stores: i64,
    pub implicit_uses: i64,
}

/// A member of one struct, with the struct declared at the member's
/// position when the member's type is an inline struct or union.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StructMemberRow {
    #[serde(flatten)]
    pub member: MemberRow,
    pub nested_struct: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UseRow {
    pub id: i64,
    pub run: Option<RunId>,
    pub struct_name: String,
    pub attrs: Option<String>,
    pub member: String,
    pub src: String,
    pub loc: String,
    pub access: Access,
    pub implicit: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnusedRow {
    pub id: i64,
    pub run: Option<RunId>,
    pub struct_name: String,
    pub attrs: Option<String>,
    pub member: String,
    pub src: String,
    pub loc: String,
}

/// WHERE clause builder with positional parameters.
#[derive(Default)]
struct Where {
    clauses: Vec<String>,
    values: Vec<SqlValue>,
}

impl Where {
    fn eq(&mut self, column: &str, value: SqlValue) {
        self.values.push(value);
        self.clauses.push(format!("{column} = ?{}", self.values.len()));
    }

    /// `column LIKE %needle%` on any of `columns`.
    fn like(&mut self, columns: &[&str], needle: &str) {
        self.values.push(SqlValue::Text(format!("%{needle}%")));
        let index = self.values.len();
        let any = columns
            .iter()
            .map(|c| format!("{c} LIKE ?{index}"))
            .collect::<Vec<_>>()
            .join(" OR ");
        self.clauses.push(format!("({any})"));
    }

    fn raw(&mut self, clause: &str) {
        self.clauses.push(clause.to_string());
    }

    fn view(&mut self, filter: &ViewFilter, name_columns: &[&str]) {
        if let Some(run) = filter.run {
            self.eq("run", SqlValue::Integer(run.0));
        }
        if let Some(ref name) = filter.struct_name {
            self.eq("struct", SqlValue::Text(name.clone()));
        }
        if let Some(ref needle) = filter.name_like {
            self.like(name_columns, needle);
        }
        if let Some(ref needle) = filter.file_like {
            self.like(&["src"], needle);
        }
        if filter.no_packed {
            self.raw("(attrs IS NULL OR attrs NOT LIKE '%packed%')");
        }
    }

    fn sql(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.clauses.join(" AND "))
        }
    }
}

fn paging(filter: &ViewFilter) -> String {
    match filter.limit {
        Some(limit) => format!(" LIMIT {limit} OFFSET {}", filter.offset),
        None if filter.offset > 0 => format!(" LIMIT -1 OFFSET {}", filter.offset),
        None => String::new(),
    }
}

fn select<T, F>(
    conn: &Connection,
    base: &str,
    filter: &Where,
    paging: &str,
    map: F,
) -> Result<Vec<T>, StorageError>
where
    F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
{
    let sql = format!("{base}{} ORDER BY id{paging}", filter.sql());
    let mut stmt = conn.prepare(&sql).map_err(to_storage_err)?;
    let rows = stmt
        .query_map(params_from_iter(filter.values.iter()), map)
        .map_err(to_storage_err)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(to_storage_err)
}

fn count(conn: &Connection, view: &str, filter: &Where) -> Result<u64, StorageError> {
    let sql = format!("SELECT COUNT(*) FROM {view}{}", filter.sql());
    conn.query_row(&sql, params_from_iter(filter.values.iter()), |row| {
        row.get::<_, i64>(0)
    })
    .map(|n| n as u64)
    .map_err(to_storage_err)
}

fn page<T>(rows: Vec<T>, total: u64, filter: &ViewFilter) -> Page<T> {
    let next = filter.offset + rows.len() as u64;
    Page {
        next_offset: (filter.limit.is_some() && next < total).then_some(next),
        rows,
        total,
    }
}

fn run_id(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<RunId>> {
    Ok(row.get::<_, Option<i64>>(idx)?.map(RunId))
}

const STRUCT_COLUMNS: &str =
    "SELECT id, run, type, struct, attrs, packed, inMacro, src, loc FROM struct_view";
const MEMBER_COLUMNS: &str = "SELECT id, run, struct, attrs, member, src, loc, \
     uses, loads, stores, implicit_uses FROM member_view";
const USE_COLUMNS: &str =
    "SELECT id, run, struct, attrs, member, src, loc, load, implicit FROM use_view";
const UNUSED_COLUMNS: &str = "SELECT id, run, struct, attrs, member, src, loc FROM unused_view";

const STRUCT_NAMES: &[&str] = &["struct"];
const MEMBER_NAMES: &[&str] = &["member", "struct"];

fn struct_row(row: &Row<'_>) -> rusqlite::Result<StructRow> {
    let tag: String = row.get(2)?;
    Ok(StructRow {
        id: row.get(0)?,
        run: run_id(row, 1)?,
        kind: StructKind::from_tag(&tag).unwrap_or(StructKind::Struct),
        name: row.get(3)?,
        attrs: row.get(4)?,
        packed: row.get(5)?,
        in_macro: row.get(6)?,
        src: row.get(7)?,
        loc: row.get(8)?,
    })
}

fn member_row(row: &Row<'_>) -> rusqlite::Result<MemberRow> {
    Ok(MemberRow {
        id: row.get(0)?,
        run: run_id(row, 1)?,
        struct_name: row.get(2)?,
        attrs: row.get(3)?,
        member: row.get(4)?,
        src: row.get(5)?,
        loc: row.get(6)?,
        uses: row.get(7)?,
        loads: row.get(8)?,
        stores: row.get(9)?,
        implicit_uses: row.get(10)?,
    })
}

fn use_row(row: &Row<'_>) -> rusqlite::Result<UseRow> {
    Ok(UseRow {
        id: row.get(0)?,
        run: run_id(row, 1)?,
        struct_name: row.get(2)?,
        attrs: row.get(3)?,
        member: row.get(4)?,
        src: row.get(5)?,
        loc: row.get(6)?,
        access: Access::from_load(row.get(7)?),
        implicit: row.get(8)?,
    })
}

fn unused_row(row: &Row<'_>) -> rusqlite::Result<UnusedRow> {
    Ok(UnusedRow {
        id: row.get(0)?,
        run: run_id(row, 1)?,
        struct_name: row.get(2)?,
        attrs: row.get(3)?,
        member: row.get(4)?,
        src: row.get(5)?,
        loc: row.get(6)?,
    })
}

fn use_where(filter: &UseFilter) -> Where {
    let mut w = Where::default();
    w.view(&filter.view, MEMBER_NAMES);
    if let Some(ref member) = filter.member {
        w.eq("member", SqlValue::Text(member.clone()));
    }
    match filter.access.map(Access::as_load) {
        Some(Some(load)) => w.eq("load", SqlValue::Integer(load)),
        Some(None) => w.raw("load IS NULL"),
        None => {}
    }
    if filter.no_implicit {
        w.raw("implicit = 0");
    }
    w
}

pub fn list_structs(conn: &Connection, filter: &ViewFilter) -> Result<Vec<StructRow>, StorageError> {
    let mut w = Where::default();
    w.view(filter, STRUCT_NAMES);
    select(conn, STRUCT_COLUMNS, &w, &paging(filter), struct_row)
}

pub fn page_structs(conn: &Connection, filter: &ViewFilter) -> Result<Page<StructRow>, StorageError> {
    let mut w = Where::default();
    w.view(filter, STRUCT_NAMES);
    let total = count(conn, "struct_view", &w)?;
    let rows = select(conn, STRUCT_COLUMNS, &w, &paging(filter), struct_row)?;
    Ok(page(rows, total, filter))
}

pub fn list_members(conn: &Connection, filter: &ViewFilter) -> Result<Vec<MemberRow>, StorageError> {
    let mut w = Where::default();
    w.view(filter, MEMBER_NAMES);
    select(conn, MEMBER_COLUMNS, &w, &paging(filter), member_row)
}

pub fn page_members(conn: &Connection, filter: &ViewFilter) -> Result<Page<MemberRow>, StorageError> {
    let mut w = Where::default();
    w.view(filter, MEMBER_NAMES);
    let total = count(conn, "member_view", &w)?;
    let rows = select(conn, MEMBER_COLUMNS, &w, &paging(filter), member_row)?;
    Ok(page(rows, total, filter))
}

pub fn list_uses(conn: &Connection, filter: &UseFilter) -> Result<Vec<UseRow>, StorageError> {
    select(conn, USE_COLUMNS, &use_where(filter), &paging(&filter.view), use_row)
}

pub fn list_unused(conn: &Connection, filter: &ViewFilter) -> Result<Vec<UnusedRow>, StorageError> {
    let mut w = Where::default();
    w.view(filter, MEMBER_NAMES);
    select(conn, UNUSED_COLUMNS, &w, &paging(filter), unused_row)
}

pub fn page_unused(conn: &Connection, filter: &ViewFilter) -> Result<Page<UnusedRow>, StorageError> {
    let mut w = Where::default();
    w.view(filter, MEMBER_NAMES);
    let total = count(conn, "unused_view", &w)?;
    let rows = select(conn, UNUSED_COLUMNS, &w, &paging(filter), unused_row)?;
    Ok(page(rows, total, filter))
}

/// Every use of one member, by file and then line.
pub fn list_uses_of_member(conn: &Connection, member: i64) -> Result<Vec<UseRow>, StorageError> {
    let mut stmt = conn
        .prepare_cached(
            "SELECT v.id, v.run, v.struct, v.attrs, v.member, v.src, v.loc, v.load, v.implicit \
             FROM use_view AS v \
             JOIN use ON use.id = v.id \
             WHERE use.member = ?1 \
             ORDER BY v.src, use.begLine, use.begCol",
        )
        .map_err(to_storage_err)?;
    let rows = stmt.query_map([member], use_row).map_err(to_storage_err)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(to_storage_err)
}

/// Members of one struct in declaration order. A member whose position
/// is also the start of another struct in the same file names that struct
/// in `nested_struct`.
pub fn list_struct_members(
    conn: &Connection,
    struct_id: i64,
) -> Result<Vec<StructMemberRow>, StorageError> {
    let mut stmt = conn
        .prepare_cached(
            "SELECT v.id, v.run, v.struct, v.attrs, v.member, v.src, v.loc, \
                    v.uses, v.loads, v.stores, v.implicit_uses, \
                    (SELECT nested.id FROM struct AS nested \
                      WHERE nested.src = owner.src \
                        AND nested.begLine = member.begLine \
                        AND nested.begCol = member.begCol \
                        AND nested.id != owner.id \
                      LIMIT 1) \
             FROM member \
             JOIN struct AS owner ON member.struct = owner.id \
             JOIN member_view AS v ON v.id = member.id \
             WHERE member.struct = ?1 \
             ORDER BY member.begLine, member.begCol",
        )
        .map_err(to_storage_err)?;
    let rows = stmt
        .query_map([struct_id], |row| {
            Ok(StructMemberRow {
                member: member_row(row)?,
                nested_struct: row.get(11)?,
            })
        })
        .map_err(to_storage_err)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(to_storage_err)
}
