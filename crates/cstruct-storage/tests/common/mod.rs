//! Shared fixtures for storage integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::time::Duration;

use cstruct_core::types::{Access, MemberFact, SourceFact, Span, StructFact, StructKind, UseFact};
use cstruct_storage::connection::RetryPolicy;
use cstruct_storage::{HostLock, MergeEngine, StagingStore};

pub const HEADER: &str = "include/a.h";
pub const UNIT: &str = "src/a.c";

pub fn struct_fact(name: &str, source: &str, line: u32) -> StructFact {
    StructFact {
        name: name.to_string(),
        kind: StructKind::Struct,
        attrs: Vec::new(),
        packed: false,
        in_macro: false,
        source: source.to_string(),
        span: Span::from_coords(line, 1, line + 10, 2),
    }
}

pub fn member_fact(owner: &StructFact, name: &str, span: Span) -> MemberFact {
    MemberFact {
        name: name.to_string(),
        owner: owner.key(),
        span,
    }
}

pub fn use_fact(owner: &StructFact, member: &str, source: &str, line: u32, access: Access) -> UseFact {
    UseFact {
        owner: owner.key(),
        member: member.to_string(),
        source: source.to_string(),
        span: Span::from_coords(line, 5, line, 12),
        access,
        implicit: false,
    }
}

/// Stage a struct with its source and the given members.
pub fn stage_struct(staging: &mut StagingStore, fact: &StructFact, members: &[(&str, Span)]) {
    staging
        .add_source(SourceFact {
            path: fact.source.clone(),
        })
        .unwrap();
    staging.add_struct(fact.clone()).unwrap();
    for (name, span) in members {
        staging.add_member(member_fact(fact, name, *span)).unwrap();
    }
}

pub fn stage_use(staging: &mut StagingStore, fact: UseFact) {
    staging
        .add_source(SourceFact {
            path: fact.source.clone(),
        })
        .unwrap();
    staging.add_use(fact).unwrap();
}

/// A scratch directory holding a corpus, a lock, and staging stores.
pub struct Workspace {
    pub dir: tempfile::TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    pub fn corpus(&self) -> PathBuf {
        self.dir.path().join("structs.db")
    }

    pub fn staging(&self, name: &str) -> StagingStore {
        StagingStore::open(&self.dir.path().join(name)).unwrap()
    }

    pub fn engine(&self) -> MergeEngine {
        MergeEngine::new(&self.corpus(), self.lock(), fast_retry())
    }

    pub fn lock(&self) -> HostLock {
        HostLock::open(self.dir.path(), "test").unwrap()
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}

pub fn fast_retry() -> RetryPolicy {
    RetryPolicy::new(Duration::from_millis(5), Duration::from_secs(30))
}
