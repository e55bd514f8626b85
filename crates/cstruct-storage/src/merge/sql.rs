//! Set-based transfer from the staging schema (`main`) into the attached
//! corpus (`corpus`). Corpus ids are re-derived from natural keys; `?1` is
//! the run every inserted row is stamped with.

pub const INSERT_SOURCES: &str = "
INSERT OR IGNORE INTO corpus.source (run, src)
SELECT ?1, ss.src
FROM main.source AS ss
ORDER BY ss.id";

pub const INSERT_STRUCTS: &str = "
INSERT OR IGNORE INTO corpus.struct
    (run, type, name, attrs, packed, inMacro, src, begLine, begCol, endLine, endCol)
SELECT ?1, s.type, s.name, s.attrs, s.packed, s.inMacro, cs.id,
       s.begLine, s.begCol, s.endLine, s.endCol
FROM main.struct AS s
JOIN main.source AS ss ON s.src = ss.id
JOIN corpus.source AS cs ON cs.src = ss.src
ORDER BY s.id";

const MEMBER_JOIN: &str = "
FROM main.member AS m
JOIN main.struct AS s ON m.struct = s.id
JOIN main.source AS ss ON s.src = ss.id
JOIN corpus.source AS cs ON cs.src = ss.src
JOIN corpus.struct AS ct
  ON ct.src = cs.id AND ct.name = s.name
 AND ct.begLine = s.begLine AND ct.begCol = s.begCol";

const USE_JOIN: &str = "
FROM main.use AS u
JOIN main.member AS m ON u.member = m.id
JOIN main.struct AS s ON m.struct = s.id
JOIN main.source AS ss ON s.src = ss.id
JOIN main.source AS us ON u.src = us.id
JOIN corpus.source AS cs ON cs.src = ss.src
JOIN corpus.struct AS ct
  ON ct.src = cs.id AND ct.name = s.name
 AND ct.begLine = s.begLine AND ct.begCol = s.begCol
JOIN corpus.member AS cm
  ON cm.struct = ct.id AND cm.name = m.name
 AND cm.begLine = m.begLine AND cm.begCol = m.begCol
JOIN corpus.source AS cus ON cus.src = us.src";

pub fn insert_members() -> String {
    format!(
        "INSERT OR IGNORE INTO corpus.member
             (run, name, struct, begLine, begCol, endLine, endCol)
         SELECT ?1, m.name, ct.id, m.begLine, m.begCol, m.endLine, m.endCol
         {MEMBER_JOIN}
         ORDER BY m.id"
    )
}

pub fn insert_uses() -> String {
    format!(
        "INSERT OR IGNORE INTO corpus.use
             (run, member, src, begLine, begCol, endLine, endCol, load, implicit)
         SELECT ?1, cm.id, cus.id, u.begLine, u.begCol, u.endLine, u.endCol, u.load, u.implicit
         {USE_JOIN}
         ORDER BY u.id"
    )
}

/// Staged members that found their corpus struct.
pub fn count_resolved_members() -> String {
    format!("SELECT COUNT(*) {MEMBER_JOIN}")
}

/// Staged uses that found their corpus member.
pub fn count_resolved_uses() -> String {
    format!("SELECT COUNT(*) {USE_JOIN}")
}
