//! Merge engine: staging → corpus under the host lock.

mod common;

use common::*;
use cstruct_core::types::{Access, RunId, RunInfo, Span};
use cstruct_storage::queries::{UseFilter, ViewFilter};
use cstruct_storage::{ConsolidatedStore, StageOutcome};

// ═══════════════════════════════════════════════════════════════════════════
// COUNTERS AND VIEWS
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn member_without_uses_lands_in_unused_view() {
    let ws = Workspace::new();
    let mut staging = ws.staging("structs-1.db");
    let a = struct_fact("A", HEADER, 9);
    stage_struct(&mut staging, &a, &[("x", Span::from_coords(10, 1, 10, 20))]);

    let report = ws.engine().merge(&mut staging).unwrap();
    assert_eq!(report.inserted.structs, 1);
    assert_eq!(report.inserted.members, 1);
    assert!(report.is_fully_resolved());

    let corpus = ConsolidatedStore::open(&ws.corpus()).unwrap();
    let x = corpus.member("A", "x").unwrap().unwrap();
    assert_eq!((x.uses, x.loads, x.stores), (0, 0, 0));

    let unused = corpus.unused(&ViewFilter::default()).unwrap();
    assert_eq!(unused.len(), 1);
    assert_eq!(unused[0].member, "x");
    assert_eq!(unused[0].loc, "10:1-10:20");
    assert_eq!(unused[0].src, HEADER);
}

#[test]
fn read_and_write_uses_drive_counters() {
    let ws = Workspace::new();
    let mut staging = ws.staging("structs-1.db");
    let a = struct_fact("A", HEADER, 9);
    stage_struct(&mut staging, &a, &[("x", Span::from_coords(10, 1, 10, 20))]);
    stage_use(&mut staging, use_fact(&a, "x", UNIT, 40, Access::Read));
    stage_use(&mut staging, use_fact(&a, "x", UNIT, 41, Access::Write));

    let report = ws.engine().merge(&mut staging).unwrap();
    assert_eq!(report.inserted.uses, 2);

    let corpus = ConsolidatedStore::open(&ws.corpus()).unwrap();
    let x = corpus.member("A", "x").unwrap().unwrap();
    assert_eq!((x.uses, x.loads, x.stores), (2, 1, 1));
    assert!(corpus.unused(&ViewFilter::default()).unwrap().is_empty());

    let reads = corpus
        .uses(&UseFilter {
            access: Some(Access::Read),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(reads.len(), 1);
    assert_eq!(reads[0].loc, "40:5-40:12");
    assert_eq!(reads[0].src, UNIT);
}

#[test]
fn unknown_and_implicit_uses_count_only_as_uses() {
    let ws = Workspace::new();
    let mut staging = ws.staging("structs-1.db");
    let a = struct_fact("A", HEADER, 9);
    stage_struct(&mut staging, &a, &[("x", Span::from_coords(10, 1, 10, 20))]);
    stage_use(&mut staging, use_fact(&a, "x", UNIT, 40, Access::Unknown));
    let mut implicit = use_fact(&a, "x", UNIT, 50, Access::Write);
    implicit.implicit = true;
    stage_use(&mut staging, implicit);

    ws.engine().merge(&mut staging).unwrap();

    let corpus = ConsolidatedStore::open(&ws.corpus()).unwrap();
    let x = corpus.member("A", "x").unwrap().unwrap();
    assert_eq!((x.uses, x.loads, x.stores, x.implicit_uses), (2, 0, 1, 1));
    assert!(x.uses >= x.loads + x.stores);
}

#[test]
fn accesses_on_one_line_collapse_to_one_use() {
    let ws = Workspace::new();
    let mut staging = ws.staging("structs-1.db");
    let a = struct_fact("A", HEADER, 9);
    stage_struct(&mut staging, &a, &[("x", Span::from_coords(10, 1, 10, 20))]);

    // `a.x = a.x + 1;`: a write at column 5 and a read at column 12.
    let mut write = use_fact(&a, "x", UNIT, 40, Access::Write);
    write.span = Span::from_coords(40, 5, 40, 8);
    let mut read = use_fact(&a, "x", UNIT, 40, Access::Read);
    read.span = Span::from_coords(40, 12, 40, 15);
    stage_use(&mut staging, write);
    assert_eq!(staging.add_use(read).unwrap(), StageOutcome::Duplicate);
    assert_eq!(staging.counts().unwrap().uses, 1);

    let report = ws.engine().merge(&mut staging).unwrap();
    assert_eq!(report.inserted.uses, 1);

    let corpus = ConsolidatedStore::open(&ws.corpus()).unwrap();
    let x = corpus.member("A", "x").unwrap().unwrap();
    assert_eq!((x.uses, x.loads, x.stores), (1, 0, 1));
    let uses = corpus.uses(&UseFilter::default()).unwrap();
    assert_eq!(uses.len(), 1);
    assert_eq!(uses[0].loc, "40:5-40:8");
}

// ═══════════════════════════════════════════════════════════════════════════
// CROSS-PROCESS UNION AND IDEMPOTENCE
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn two_processes_union_members_of_one_struct() {
    let ws = Workspace::new();
    let a = struct_fact("A", HEADER, 9);

    let mut first = ws.staging("structs-1.db");
    stage_struct(&mut first, &a, &[("x", Span::from_coords(10, 1, 10, 20))]);
    let mut second = ws.staging("structs-2.db");
    stage_struct(
        &mut second,
        &a,
        &[
            ("x", Span::from_coords(10, 1, 10, 20)),
            ("y", Span::from_coords(11, 1, 11, 9)),
        ],
    );
    stage_use(&mut second, use_fact(&a, "x", UNIT, 40, Access::Read));

    let mut engine = ws.engine();
    engine.merge(&mut first).unwrap();
    let report = engine.merge(&mut second).unwrap();
    assert_eq!(report.inserted.structs, 0);
    assert_eq!(report.inserted.members, 1);

    let corpus = ConsolidatedStore::open(&ws.corpus()).unwrap();
    assert_eq!(corpus.structs(&ViewFilter::default()).unwrap().len(), 1);
    let members: Vec<String> = corpus
        .members(&ViewFilter::default())
        .unwrap()
        .into_iter()
        .map(|m| m.member)
        .collect();
    assert_eq!(members, vec!["x".to_string(), "y".to_string()]);
    assert_eq!(corpus.member("A", "x").unwrap().unwrap().uses, 1);
}

#[test]
fn merging_twice_changes_nothing() {
    let ws = Workspace::new();
    let mut staging = ws.staging("structs-1.db");
    let a = struct_fact("A", HEADER, 9);
    stage_struct(&mut staging, &a, &[("x", Span::from_coords(10, 1, 10, 20))]);
    stage_use(&mut staging, use_fact(&a, "x", UNIT, 40, Access::Read));

    let mut engine = ws.engine();
    let first = engine.merge(&mut staging).unwrap();
    let second = engine.merge(&mut staging).unwrap();
    assert_eq!(first.inserted.total(), 5);
    assert_eq!(second.inserted.total(), 0);
    assert_eq!(second.staged, first.staged);

    let corpus = ConsolidatedStore::open(&ws.corpus()).unwrap();
    assert_eq!(corpus.member("A", "x").unwrap().unwrap().uses, 1);
}

#[test]
fn same_name_in_different_headers_stays_distinct() {
    let ws = Workspace::new();
    let mut staging = ws.staging("structs-1.db");
    let a = struct_fact("A", HEADER, 9);
    let other = struct_fact("A", "include/b.h", 9);
    stage_struct(&mut staging, &a, &[("x", Span::from_coords(10, 1, 10, 20))]);
    stage_struct(&mut staging, &other, &[("x", Span::from_coords(10, 1, 10, 20))]);
    stage_use(&mut staging, use_fact(&other, "x", UNIT, 40, Access::Write));

    ws.engine().merge(&mut staging).unwrap();

    let corpus = ConsolidatedStore::open(&ws.corpus()).unwrap();
    let members = corpus.members(&ViewFilter::default()).unwrap();
    assert_eq!(members.len(), 2);
    let used: Vec<_> = members.iter().filter(|m| m.uses == 1).collect();
    assert_eq!(used.len(), 1);
    assert_eq!(used[0].src, "include/b.h");
}

// ═══════════════════════════════════════════════════════════════════════════
// STAGING OUTCOMES, RUNS, FAILURE
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn staging_reports_duplicates_and_unresolved_owners() {
    let ws = Workspace::new();
    let mut staging = ws.staging("structs-1.db");
    let a = struct_fact("A", HEADER, 9);
    stage_struct(&mut staging, &a, &[]);

    assert_eq!(staging.add_struct(a.clone()).unwrap(), StageOutcome::Duplicate);

    let orphan = struct_fact("B", "include/missing.h", 3);
    let outcome = staging
        .add_member(member_fact(&orphan, "z", Span::from_coords(4, 1, 4, 7)))
        .unwrap();
    assert_eq!(outcome, StageOutcome::Unresolved);

    let outcome = staging
        .add_use(use_fact(&a, "nope", UNIT, 12, Access::Read))
        .unwrap();
    assert_eq!(outcome, StageOutcome::Unresolved);

    let counts = staging.counts().unwrap();
    assert_eq!((counts.sources, counts.structs, counts.members, counts.uses), (1, 1, 0, 0));
}

#[test]
fn merged_rows_carry_the_engine_run() {
    let ws = Workspace::new();
    let run = ConsolidatedStore::open(&ws.corpus())
        .unwrap()
        .create_run(&RunInfo {
            version: Some("0.1.0".to_string()),
            ..Default::default()
        })
        .unwrap();

    let mut staging = ws.staging("structs-1.db");
    let a = struct_fact("A", HEADER, 9);
    stage_struct(&mut staging, &a, &[("x", Span::from_coords(10, 1, 10, 20))]);

    let report = ws.engine().with_run(Some(run)).merge(&mut staging).unwrap();
    assert_eq!(report.run, Some(run));

    let corpus = ConsolidatedStore::open(&ws.corpus()).unwrap();
    let by_run = ViewFilter {
        run: Some(run),
        ..Default::default()
    };
    assert_eq!(corpus.structs(&by_run).unwrap().len(), 1);
    assert_eq!(corpus.members(&by_run).unwrap()[0].run, Some(run));

    let other = ViewFilter {
        run: Some(RunId(run.0 + 1)),
        ..Default::default()
    };
    assert!(corpus.structs(&other).unwrap().is_empty());
}

#[test]
fn failed_merge_keeps_staging_and_corpus_untouched() {
    let ws = Workspace::new();
    let mut staging = ws.staging("structs-1.db");
    let a = struct_fact("A", HEADER, 9);
    stage_struct(&mut staging, &a, &[("x", Span::from_coords(10, 1, 10, 20))]);

    // Stamping with a run the corpus does not have violates the foreign key.
    let err = ws
        .engine()
        .with_run(Some(RunId(999)))
        .merge(&mut staging)
        .unwrap_err();
    assert!(err.to_string().contains("FOREIGN KEY"), "{err}");

    assert!(staging.path().exists());
    assert_eq!(staging.counts().unwrap().members, 1);
    let corpus = ConsolidatedStore::open(&ws.corpus()).unwrap();
    assert_eq!(corpus.counts().unwrap().total(), 0);

    // The lock was released: a later merge goes through.
    ws.engine().merge(&mut staging).unwrap();
    assert_eq!(corpus.counts().unwrap().members, 1);
}

#[test]
fn remove_deletes_staging_files() {
    let ws = Workspace::new();
    let mut staging = ws.staging("structs-1.db");
    stage_struct(&mut staging, &struct_fact("A", HEADER, 9), &[]);
    ws.engine().merge(&mut staging).unwrap();

    let path = staging.path().to_path_buf();
    staging.remove().unwrap();
    assert!(!path.exists());
    assert!(!ws.path().join("structs-1.db-wal").exists());
}

#[test]
fn report_serializes_for_the_log() {
    let ws = Workspace::new();
    let mut staging = ws.staging("structs-1.db");
    stage_struct(&mut staging, &struct_fact("A", HEADER, 9), &[]);
    let report = ws.engine().merge(&mut staging).unwrap();

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["inserted"]["structs"], 1);
    assert_eq!(json["recovered_lock"], false);
}
