//! Listing views. Locations render as `begLine:begCol-endLine:endCol`.

pub const MIGRATION_SQL: &str = r#"
CREATE VIEW IF NOT EXISTS struct_view AS
SELECT struct.id, struct.run, struct.type,
       struct.name AS struct, struct.attrs, struct.packed, struct.inMacro,
       source.src,
       struct.begLine || ':' || struct.begCol || '-' ||
           struct.endLine || ':' || struct.endCol AS loc
FROM struct
LEFT JOIN source ON struct.src = source.id;

CREATE VIEW IF NOT EXISTS member_view AS
SELECT member.id, member.run,
       struct.name AS struct, struct.attrs,
       member.name AS member, source.src,
       member.begLine || ':' || member.begCol || '-' ||
           member.endLine || ':' || member.endCol AS loc,
       member.uses, member.loads, member.stores, member.implicit_uses
FROM member
LEFT JOIN struct ON member.struct = struct.id
LEFT JOIN source ON struct.src = source.id;

CREATE VIEW IF NOT EXISTS use_view AS
SELECT use.id, use.run,
       struct.name AS struct, struct.attrs,
       member.name AS member, source.src,
       use.begLine || ':' || use.begCol || '-' ||
           use.endLine || ':' || use.endCol AS loc,
       use.load, use.implicit
FROM use
LEFT JOIN member ON use.member = member.id
LEFT JOIN struct ON member.struct = struct.id
LEFT JOIN source ON use.src = source.id;

CREATE VIEW IF NOT EXISTS unused_view AS
SELECT member.id, member.run,
       struct.name AS struct, struct.attrs,
       member.name AS member, source.src,
       member.begLine || ':' || member.begCol || '-' ||
           member.endLine || ':' || member.endCol AS loc
FROM member
LEFT JOIN struct ON member.struct = struct.id
LEFT JOIN source ON struct.src = source.id
WHERE member.id NOT IN (SELECT member FROM use)
  AND struct.name != '<anonymous>'
  AND struct.name != '<unnamed>'
  AND member.name != '<unnamed>';
"#;
