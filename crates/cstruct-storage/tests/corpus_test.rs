//! Consolidated store: runs, listings, pruning.

mod common;

use common::*;
use cstruct_core::constants::{ANONYMOUS, UNNAMED};
use cstruct_core::types::{Access, RunInfo, Span};
use cstruct_storage::queries::{UseFilter, ViewFilter};
use cstruct_storage::ConsolidatedStore;

fn x_span() -> Span {
    Span::from_coords(10, 1, 10, 20)
}

#[test]
fn fresh_corpus_is_empty_and_in_wal_mode() {
    let ws = Workspace::new();
    let corpus = ConsolidatedStore::open(&ws.corpus()).unwrap();
    assert_eq!(corpus.path(), Some(ws.corpus().as_path()));
    assert_eq!(corpus.counts().unwrap().total(), 0);
    assert!(cstruct_storage::connection::pragmas::verify_wal_mode(corpus.connection()).unwrap());
    assert!(corpus.runs().unwrap().is_empty());
}

#[test]
fn runs_get_ids_and_timestamps() {
    let corpus = ConsolidatedStore::open_in_memory().unwrap();
    let first = corpus
        .create_run(&RunInfo {
            version: Some("0.1.0".to_string()),
            sha: Some("abc123".to_string()),
            filter: Some("task_*".to_string()),
            skip: true,
        })
        .unwrap();
    let second = corpus.create_run(&RunInfo::default()).unwrap();
    assert!(second.0 > first.0);

    let runs = corpus.runs().unwrap();
    assert_eq!(runs.len(), 2);
    assert_eq!(runs[0].sha.as_deref(), Some("abc123"));
    assert!(runs[0].skip);
    // YYYY-MM-DD HH:MM:SS.SSS
    assert_eq!(runs[0].timestamp.len(), 23);
    assert_eq!(&runs[0].timestamp[4..5], "-");
}

#[test]
fn unused_view_skips_anonymous_and_unnamed() {
    let ws = Workspace::new();
    let mut staging = ws.staging("structs-1.db");
    let anon = struct_fact(ANONYMOUS, HEADER, 20);
    let named = struct_fact("A", HEADER, 9);
    stage_struct(&mut staging, &anon, &[("inner", Span::from_coords(21, 5, 21, 14))]);
    stage_struct(
        &mut staging,
        &named,
        &[(UNNAMED, Span::from_coords(11, 1, 11, 8)), ("x", x_span())],
    );
    ws.engine().merge(&mut staging).unwrap();

    let corpus = ConsolidatedStore::open(&ws.corpus()).unwrap();
    assert_eq!(corpus.members(&ViewFilter::default()).unwrap().len(), 3);
    let unused = corpus.unused(&ViewFilter::default()).unwrap();
    assert_eq!(unused.len(), 1);
    assert_eq!((unused[0].struct_name.as_str(), unused[0].member.as_str()), ("A", "x"));
}

#[test]
fn listing_filters_narrow_results() {
    let ws = Workspace::new();
    let mut staging = ws.staging("structs-1.db");
    let a = struct_fact("A", HEADER, 9);
    let mut packed = struct_fact("P", HEADER, 30);
    packed.attrs = vec!["packed".to_string(), "aligned(4)".to_string()];
    packed.packed = true;
    stage_struct(&mut staging, &a, &[("x", x_span()), ("y", Span::from_coords(11, 1, 11, 9))]);
    stage_struct(&mut staging, &packed, &[("p", Span::from_coords(31, 1, 31, 9))]);
    stage_use(&mut staging, use_fact(&a, "x", UNIT, 40, Access::Read));
    let mut implicit = use_fact(&a, "y", UNIT, 41, Access::Write);
    implicit.implicit = true;
    stage_use(&mut staging, implicit);
    ws.engine().merge(&mut staging).unwrap();

    let corpus = ConsolidatedStore::open_read_only(&ws.corpus()).unwrap();

    let structs = corpus.structs(&ViewFilter::default()).unwrap();
    assert_eq!(structs.len(), 2);
    assert_eq!(structs[1].attrs.as_deref(), Some("packed|aligned(4)"));
    assert!(structs[1].packed);

    let no_packed = ViewFilter {
        no_packed: true,
        ..Default::default()
    };
    let names: Vec<_> = corpus
        .structs(&no_packed)
        .unwrap()
        .into_iter()
        .map(|s| s.name)
        .collect();
    assert_eq!(names, vec!["A".to_string()]);

    let only_a = ViewFilter {
        struct_name: Some("A".to_string()),
        ..Default::default()
    };
    assert_eq!(corpus.members(&only_a).unwrap().len(), 2);

    let explicit = corpus
        .uses(&UseFilter {
            no_implicit: true,
            ..Default::default()
        })
        .unwrap();
    assert_eq!(explicit.len(), 1);
    assert_eq!(explicit[0].member, "x");

    let of_y = corpus
        .uses(&UseFilter {
            member: Some("y".to_string()),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(of_y.len(), 1);
    assert!(of_y[0].implicit);
    assert_eq!(of_y[0].access, Access::Write);
}

#[test]
fn read_only_store_rejects_writes() {
    let ws = Workspace::new();
    ConsolidatedStore::open(&ws.corpus()).unwrap();
    let corpus = ConsolidatedStore::open_read_only(&ws.corpus()).unwrap();
    assert!(corpus.create_run(&RunInfo::default()).is_err());
}

#[test]
fn deleting_a_run_cascades_and_restores_counters() {
    let ws = Workspace::new();
    let corpus = ConsolidatedStore::open(&ws.corpus()).unwrap();
    let declare = corpus.create_run(&RunInfo::default()).unwrap();
    let usage = corpus.create_run(&RunInfo::default()).unwrap();

    let a = struct_fact("A", HEADER, 9);
    let mut first = ws.staging("structs-1.db");
    stage_struct(&mut first, &a, &[("x", x_span())]);
    ws.engine().with_run(Some(declare)).merge(&mut first).unwrap();

    let mut second = ws.staging("structs-2.db");
    stage_struct(&mut second, &a, &[("x", x_span())]);
    stage_use(&mut second, use_fact(&a, "x", UNIT, 40, Access::Read));
    stage_use(&mut second, use_fact(&a, "x", UNIT, 41, Access::Write));
    ws.engine().with_run(Some(usage)).merge(&mut second).unwrap();
    assert_eq!(corpus.member("A", "x").unwrap().unwrap().uses, 2);

    let report = corpus.delete_run(usage).unwrap();
    assert_eq!(report.runs, 1);
    assert_eq!(report.deleted.uses, 2);
    assert_eq!(report.deleted.sources, 1);
    assert_eq!(report.deleted.structs, 0);

    let x = corpus.member("A", "x").unwrap().unwrap();
    assert_eq!((x.uses, x.loads, x.stores), (0, 0, 0));
    assert_eq!(corpus.unused(&ViewFilter::default()).unwrap().len(), 1);
    assert_eq!(corpus.runs().unwrap().len(), 1);
}

#[test]
fn reset_empties_everything() {
    let ws = Workspace::new();
    let corpus = ConsolidatedStore::open(&ws.corpus()).unwrap();
    corpus.create_run(&RunInfo::default()).unwrap();

    let mut staging = ws.staging("structs-1.db");
    let a = struct_fact("A", HEADER, 9);
    stage_struct(&mut staging, &a, &[("x", x_span())]);
    stage_use(&mut staging, use_fact(&a, "x", UNIT, 40, Access::Read));
    ws.engine().merge(&mut staging).unwrap();

    let report = corpus.reset().unwrap();
    assert_eq!(report.runs, 1);
    assert_eq!(report.deleted.total(), 5);
    assert_eq!(corpus.counts().unwrap().total(), 0);
    assert!(corpus.runs().unwrap().is_empty());
    corpus.checkpoint().unwrap();
}

// ═══════════════════════════════════════════════════════════════════════════
// BROWSING: SUBSTRINGS, PAGES, PER-MEMBER USES, NESTED STRUCTS
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn name_and_file_substrings_narrow_listings() {
    let ws = Workspace::new();
    let mut staging = ws.staging("structs-1.db");
    let task = struct_fact("task_struct", HEADER, 100);
    let mm = struct_fact("mm_struct", HEADER, 300);
    let info = struct_fact("task_info", "include/b.h", 9);
    stage_struct(&mut staging, &task, &[("pid", Span::from_coords(101, 5, 101, 14))]);
    stage_struct(&mut staging, &mm, &[("pgd", Span::from_coords(301, 5, 301, 14))]);
    stage_struct(&mut staging, &info, &[("flags", Span::from_coords(10, 5, 10, 18))]);
    ws.engine().merge(&mut staging).unwrap();

    let corpus = ConsolidatedStore::open_read_only(&ws.corpus()).unwrap();
    let names = |filter: &ViewFilter| -> Vec<String> {
        corpus
            .structs(filter)
            .unwrap()
            .into_iter()
            .map(|s| s.name)
            .collect()
    };

    let task_like = ViewFilter {
        name_like: Some("task".to_string()),
        ..Default::default()
    };
    assert_eq!(names(&task_like), vec!["task_struct".to_string(), "task_info".to_string()]);

    let in_b = ViewFilter {
        file_like: Some("b.h".to_string()),
        ..Default::default()
    };
    assert_eq!(names(&in_b), vec!["task_info".to_string()]);

    // Member listings match the member name or the struct name.
    let pid = ViewFilter {
        name_like: Some("pid".to_string()),
        ..Default::default()
    };
    let members = corpus.members(&pid).unwrap();
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].struct_name, "task_struct");

    let mm_like = ViewFilter {
        name_like: Some("mm_".to_string()),
        ..Default::default()
    };
    assert_eq!(corpus.members(&mm_like).unwrap()[0].member, "pgd");
    assert_eq!(corpus.unused(&mm_like).unwrap().len(), 1);
}

#[test]
fn pages_report_total_and_next_offset() {
    let ws = Workspace::new();
    let mut staging = ws.staging("structs-1.db");
    for i in 0..5u32 {
        stage_struct(&mut staging, &struct_fact(&format!("S{i}"), HEADER, 10 + 20 * i), &[]);
    }
    ws.engine().merge(&mut staging).unwrap();
    let corpus = ConsolidatedStore::open(&ws.corpus()).unwrap();

    let first = corpus
        .structs_page(&ViewFilter {
            limit: Some(2),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(first.total, 5);
    assert_eq!(first.rows.len(), 2);
    assert_eq!(first.rows[0].name, "S0");
    assert_eq!(first.next_offset, Some(2));

    let last = corpus
        .structs_page(&ViewFilter {
            limit: Some(2),
            offset: 4,
            ..Default::default()
        })
        .unwrap();
    assert_eq!(last.rows.len(), 1);
    assert_eq!(last.rows[0].name, "S4");
    assert_eq!(last.next_offset, None);

    let unpaged = corpus.members_page(&ViewFilter::default()).unwrap();
    assert_eq!((unpaged.total, unpaged.next_offset), (0, None));
}

#[test]
fn uses_of_a_member_come_by_file_then_line() {
    let ws = Workspace::new();
    let mut staging = ws.staging("structs-1.db");
    let a = struct_fact("A", HEADER, 9);
    stage_struct(&mut staging, &a, &[("x", x_span())]);
    stage_use(&mut staging, use_fact(&a, "x", "src/b.c", 5, Access::Read));
    stage_use(&mut staging, use_fact(&a, "x", UNIT, 40, Access::Write));
    stage_use(&mut staging, use_fact(&a, "x", UNIT, 7, Access::Read));
    ws.engine().merge(&mut staging).unwrap();

    let corpus = ConsolidatedStore::open(&ws.corpus()).unwrap();
    let x = corpus.member("A", "x").unwrap().unwrap();
    let uses: Vec<(String, String)> = corpus
        .uses_of_member(x.id)
        .unwrap()
        .into_iter()
        .map(|u| (u.src, u.loc))
        .collect();
    assert_eq!(
        uses,
        vec![
            (UNIT.to_string(), "7:5-7:12".to_string()),
            (UNIT.to_string(), "40:5-40:12".to_string()),
            ("src/b.c".to_string(), "5:5-5:12".to_string()),
        ]
    );
    assert!(corpus.uses_of_member(x.id + 100).unwrap().is_empty());
}

#[test]
fn inline_struct_members_point_at_their_declaration() {
    let ws = Workspace::new();
    let mut staging = ws.staging("structs-1.db");
    let outer = struct_fact("A", HEADER, 9);
    let inner = struct_fact(ANONYMOUS, HEADER, 12);
    stage_struct(
        &mut staging,
        &outer,
        &[("x", x_span()), ("u", Span::from_coords(12, 1, 15, 2))],
    );
    stage_struct(&mut staging, &inner, &[("a", Span::from_coords(13, 5, 13, 11))]);
    ws.engine().merge(&mut staging).unwrap();

    let corpus = ConsolidatedStore::open(&ws.corpus()).unwrap();
    let structs = corpus.structs(&ViewFilter::default()).unwrap();
    let outer_id = structs.iter().find(|s| s.name == "A").unwrap().id;
    let inner_id = structs.iter().find(|s| s.name == ANONYMOUS).unwrap().id;

    let members = corpus.struct_members(outer_id).unwrap();
    let shape: Vec<(&str, Option<i64>)> = members
        .iter()
        .map(|m| (m.member.member.as_str(), m.nested_struct))
        .collect();
    assert_eq!(shape, vec![("x", None), ("u", Some(inner_id))]);

    let inner_members = corpus.struct_members(inner_id).unwrap();
    assert_eq!(inner_members.len(), 1);
    assert_eq!(inner_members[0].nested_struct, None);
}
