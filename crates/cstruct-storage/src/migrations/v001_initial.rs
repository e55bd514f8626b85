//! Fact tables, counter triggers, and indexes.
//!
//! Every table is STRICT. Natural keys are UNIQUE constraints so duplicate
//! facts are rejected by the engine. `member` counters are written only by
//! the `use` triggers.

pub const MIGRATION_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS run (
    id INTEGER PRIMARY KEY,
    version TEXT,
    sha TEXT,
    filter TEXT,
    skip INTEGER NOT NULL DEFAULT 0 CHECK(skip IN (0, 1)),
    timestamp TEXT NOT NULL DEFAULT (STRFTIME('%Y-%m-%d %H:%M:%f', 'NOW', 'localtime'))
) STRICT;

CREATE TABLE IF NOT EXISTS source (
    id INTEGER PRIMARY KEY,
    run INTEGER REFERENCES run(id) ON DELETE CASCADE,
    src TEXT NOT NULL UNIQUE
) STRICT;

CREATE TABLE IF NOT EXISTS struct (
    id INTEGER PRIMARY KEY,
    run INTEGER REFERENCES run(id) ON DELETE CASCADE,
    type TEXT NOT NULL CHECK(type IN ('s', 'u')),
    name TEXT NOT NULL,
    attrs TEXT,
    packed INTEGER NOT NULL DEFAULT 0 CHECK(packed IN (0, 1)),
    inMacro INTEGER NOT NULL DEFAULT 0 CHECK(inMacro IN (0, 1)),
    src INTEGER NOT NULL REFERENCES source(id) ON DELETE CASCADE,
    begLine INTEGER NOT NULL,
    begCol INTEGER NOT NULL,
    endLine INTEGER NOT NULL,
    endCol INTEGER NOT NULL,
    UNIQUE(name, src, begLine, begCol),
    CHECK(endLine >= begLine)
) STRICT;

CREATE TABLE IF NOT EXISTS member (
    id INTEGER PRIMARY KEY,
    run INTEGER REFERENCES run(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    struct INTEGER NOT NULL REFERENCES struct(id) ON DELETE CASCADE,
    begLine INTEGER NOT NULL,
    begCol INTEGER NOT NULL,
    endLine INTEGER NOT NULL,
    endCol INTEGER NOT NULL,
    uses INTEGER NOT NULL DEFAULT 0,
    loads INTEGER NOT NULL DEFAULT 0,
    stores INTEGER NOT NULL DEFAULT 0,
    implicit_uses INTEGER NOT NULL DEFAULT 0,
    UNIQUE(struct, name, begLine, begCol),
    CHECK(endLine >= begLine),
    CHECK(uses >= loads + stores),
    CHECK(uses >= implicit_uses)
) STRICT;

CREATE TABLE IF NOT EXISTS use (
    id INTEGER PRIMARY KEY,
    run INTEGER REFERENCES run(id) ON DELETE CASCADE,
    member INTEGER NOT NULL REFERENCES member(id) ON DELETE CASCADE,
    src INTEGER NOT NULL REFERENCES source(id) ON DELETE CASCADE,
    begLine INTEGER NOT NULL,
    begCol INTEGER NOT NULL,
    endLine INTEGER NOT NULL,
    endCol INTEGER NOT NULL,
    load INTEGER CHECK(load IN (0, 1)),
    implicit INTEGER NOT NULL DEFAULT 0 CHECK(implicit IN (0, 1)),
    UNIQUE(member, src, begLine),
    CHECK(endLine >= begLine)
) STRICT;

CREATE TRIGGER IF NOT EXISTS use_after_insert AFTER INSERT ON use FOR EACH ROW
BEGIN
    UPDATE member SET
        uses = uses + 1,
        loads = loads + (NEW.load IS 1),
        stores = stores + (NEW.load IS 0),
        implicit_uses = implicit_uses + (NEW.implicit = 1)
    WHERE id = NEW.member;
END;

CREATE TRIGGER IF NOT EXISTS use_after_delete AFTER DELETE ON use FOR EACH ROW
BEGIN
    UPDATE member SET
        uses = uses - 1,
        loads = loads - (OLD.load IS 1),
        stores = stores - (OLD.load IS 0),
        implicit_uses = implicit_uses - (OLD.implicit = 1)
    WHERE id = OLD.member;
END;

CREATE INDEX IF NOT EXISTS idx_struct_src ON struct(src);
CREATE INDEX IF NOT EXISTS idx_use_src ON use(src);
CREATE INDEX IF NOT EXISTS idx_source_run ON source(run);
CREATE INDEX IF NOT EXISTS idx_struct_run ON struct(run);
CREATE INDEX IF NOT EXISTS idx_member_run ON member(run);
CREATE INDEX IF NOT EXISTS idx_use_run ON use(run);
"#;
