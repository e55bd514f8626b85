//! Queue backend: writer thread batching and the filler daemon end to end.

mod common;

use std::os::unix::net::UnixDatagram;
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use common::*;
use cstruct_core::config::{Backend, CstructConfig};
use cstruct_core::types::{Access, Fact, FactKind, SourceFact, Span};
use cstruct_storage::queries::ViewFilter;
use cstruct_storage::transport::{Daemon, FactWriter, Message, QueueSender, WriterOptions};
use cstruct_storage::{ConsolidatedStore, Recorder};

fn wait_for(what: &str, mut cond: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while !cond() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        thread::sleep(Duration::from_millis(20));
    }
}

fn corpus_total(path: &Path) -> u64 {
    ConsolidatedStore::open_read_only(path)
        .and_then(|c| c.counts())
        .map(|c| c.total())
        .unwrap_or(0)
}

fn source(path: &str) -> Message<'static> {
    Message::from_fact(&Fact::Source(SourceFact {
        path: path.to_string(),
    }))
    .into_owned()
}

fn writer(ws: &Workspace, options: WriterOptions) -> FactWriter {
    let corpus = ConsolidatedStore::open(&ws.corpus()).unwrap();
    FactWriter::new(corpus.into_connection(), options)
}

// ═══════════════════════════════════════════════════════════════════════════
// WRITER THREAD
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn writer_resolves_owners_inside_one_batch() {
    let ws = Workspace::new();
    let writer = writer(&ws, WriterOptions::default());

    let a = struct_fact("A", HEADER, 9);
    let facts = [
        Fact::Source(SourceFact {
            path: HEADER.to_string(),
        }),
        Fact::Struct(a.clone()),
        Fact::Member(member_fact(&a, "x", Span::from_coords(10, 1, 10, 20))),
        Fact::Source(SourceFact {
            path: UNIT.to_string(),
        }),
        Fact::Use(use_fact(&a, "x", UNIT, 40, Access::Read)),
    ];
    for fact in &facts {
        writer.insert(Message::from_fact(fact).into_owned()).unwrap();
    }
    // Sent twice: the second is ignored.
    writer.insert(source(HEADER)).unwrap();

    let stats = writer.shutdown().unwrap();
    assert_eq!((stats.sources, stats.structs, stats.members, stats.uses), (2, 1, 1, 1));
    assert_eq!(stats.ignored, 1);
    assert_eq!(stats.commits, 1);

    let corpus = ConsolidatedStore::open(&ws.corpus()).unwrap();
    assert_eq!(corpus.member("A", "x").unwrap().unwrap().loads, 1);
}

#[test]
fn flush_commits_the_open_batch() {
    let ws = Workspace::new();
    let writer = writer(
        &ws,
        WriterOptions {
            idle_flush: Duration::from_secs(3600),
            ..Default::default()
        },
    );

    writer.insert(source(HEADER)).unwrap();
    writer.flush().unwrap();
    wait_for("flushed batch", || corpus_total(&ws.corpus()) == 1);

    let stats = writer.shutdown().unwrap();
    assert_eq!(stats.commits, 1);
}

#[test]
fn idle_writer_commits_on_its_own() {
    let ws = Workspace::new();
    let writer = writer(
        &ws,
        WriterOptions {
            idle_flush: Duration::from_millis(50),
            ..Default::default()
        },
    );

    writer.insert(source(HEADER)).unwrap();
    wait_for("idle commit", || corpus_total(&ws.corpus()) == 1);
    writer.shutdown().unwrap();
}

#[test]
fn shutdown_commits_an_unflushed_batch() {
    let ws = Workspace::new();
    let writer = writer(
        &ws,
        WriterOptions {
            idle_flush: Duration::from_secs(3600),
            ..Default::default()
        },
    );

    writer.insert(source(HEADER)).unwrap();
    writer.insert(source(UNIT)).unwrap();
    let stats = writer.shutdown().unwrap();
    assert_eq!(stats.sources, 2);
    assert_eq!(stats.commits, 1);
    assert_eq!(corpus_total(&ws.corpus()), 2);
}

#[test]
fn autocommit_writes_each_insert() {
    let ws = Workspace::new();
    let writer = writer(
        &ws,
        WriterOptions {
            autocommit: true,
            idle_flush: Duration::from_secs(3600),
            ..Default::default()
        },
    );

    writer.insert(source(HEADER)).unwrap();
    writer.insert(source(HEADER)).unwrap();
    writer.insert(source(UNIT)).unwrap();
    writer
        .insert(Message::new(FactKind::Source).with("path", "b.c").into_owned())
        .unwrap();
    wait_for("autocommitted rows", || corpus_total(&ws.corpus()) == 2);

    // Only inserted rows count as commits; duplicates and rejects do not.
    let stats = writer.shutdown().unwrap();
    assert_eq!(stats.sources, 2);
    assert_eq!(stats.ignored, 1);
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.commits, 2);
}

#[test]
fn unknown_key_fails_only_that_message() {
    let ws = Workspace::new();
    let writer = writer(&ws, WriterOptions::default());

    writer
        .insert(Message::new(FactKind::Source).with("path", "a.c").into_owned())
        .unwrap();
    writer.insert(source(UNIT)).unwrap();

    let stats = writer.shutdown().unwrap();
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.sources, 1);
}

// ═══════════════════════════════════════════════════════════════════════════
// DAEMON
// ═══════════════════════════════════════════════════════════════════════════

fn daemon_config(ws: &Workspace) -> CstructConfig {
    let mut config = CstructConfig::default();
    config.storage.database = Some(ws.corpus().display().to_string());
    config.transport.backend = Some(Backend::Queue);
    config.transport.queue_path = Some(ws.path().join("filler.sock").display().to_string());
    // Only explicit flushes commit.
    config.transport.idle_flush_ms = Some(600_000);
    config.run.version = Some("test".to_string());
    config
}

#[test]
fn daemon_stores_what_recorders_send() {
    let ws = Workspace::new();
    let config = daemon_config(&ws);
    let daemon = Daemon::start(&config).unwrap();
    let run = daemon.run_id();
    assert!(run.is_some());
    let stop = daemon.stop_handle();
    let handle = thread::spawn(move || daemon.run());

    let mut recorder = Recorder::from_config(&config).unwrap();
    let a = struct_fact("A", HEADER, 9);
    recorder.record_struct(a.clone()).unwrap();
    recorder
        .record_member(member_fact(&a, "x", Span::from_coords(10, 1, 10, 20)))
        .unwrap();
    recorder
        .record_member(member_fact(&a, "y", Span::from_coords(11, 1, 11, 9)))
        .unwrap();
    recorder
        .record_use(use_fact(&a, "x", UNIT, 40, Access::Write))
        .unwrap();
    // A datagram that is not a message.
    let raw = UnixDatagram::unbound().unwrap();
    raw.send_to(b"Zgarbage", ws.path().join("filler.sock")).unwrap();

    let recorded = recorder.finish().unwrap();
    assert_eq!(recorded.stats.recorded, 6);
    assert!(recorded.merge.is_none());

    wait_for("daemon commit", || corpus_total(&ws.corpus()) == 6);
    stop.stop();
    let report = handle.join().unwrap().unwrap();

    assert_eq!(report.run, run);
    assert_eq!(report.malformed, 1);
    assert_eq!(report.flushes, 1);
    assert_eq!(report.writer.inserted(), 6);

    let corpus = ConsolidatedStore::open(&ws.corpus()).unwrap();
    let unused = corpus.unused(&ViewFilter::default()).unwrap();
    assert_eq!(unused.len(), 1);
    assert_eq!(unused[0].member, "y");
    assert_eq!(unused[0].run, run);
    assert!(!ws.path().join("filler.sock").exists());
}

#[test]
fn second_daemon_cannot_take_a_bound_queue() {
    let ws = Workspace::new();
    let config = daemon_config(&ws);
    let first = Daemon::start(&config).unwrap();
    assert!(Daemon::start(&config).is_err());
    drop(first);
}

#[test]
fn recorder_without_daemon_fails_to_connect() {
    let ws = Workspace::new();
    let config = daemon_config(&ws);
    assert!(Recorder::from_config(&config).is_err());
}

#[test]
fn queue_sender_drops_nothing_while_daemon_runs() {
    let ws = Workspace::new();
    let mut config = daemon_config(&ws);
    config.run.track = Some(false);
    let daemon = Daemon::start(&config).unwrap();
    assert_eq!(daemon.run_id(), None);
    let stop = daemon.stop_handle();
    let handle = thread::spawn(move || daemon.run());

    let sender = QueueSender::connect(&ws.path().join("filler.sock"), 8192).unwrap();
    for i in 0..200 {
        sender.send(&source(&format!("src/file{i}.c"))).unwrap();
    }
    sender.send_flush().unwrap();

    wait_for("all sources", || corpus_total(&ws.corpus()) == 200);
    stop.stop();
    let report = handle.join().unwrap().unwrap();
    assert_eq!(report.received, 201);
    assert_eq!(report.writer.sources, 200);
}
