//! The analysis-process side: record facts, then hand them to the corpus.
//!
//! A [`Recorder`] either stages facts locally and merges them at
//! [`Recorder::finish`], or sends them to the filler over the queue. Which
//! one comes from `transport.backend`.

use std::path::{Path, PathBuf};

use cstruct_core::config::{Backend, CstructConfig};
use cstruct_core::errors::{ConfigError, CstructError, CstructErrorCode, StorageError};
use cstruct_core::types::{Fact, MemberFact, SourceFact, StructFact, UseFact};
use glob::Pattern;
use rustc_hash::FxHashSet;
use serde::Serialize;

use crate::connection::RetryPolicy;
use crate::lock::HostLock;
use crate::merge::{MergeEngine, MergeReport};
use crate::staging::{StageOutcome, StagingStore};
use crate::transport::message::Message;
use crate::transport::queue::QueueSender;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RecorderStats {
    /// Facts staged or sent.
    pub recorded: u64,
    /// Facts already staged by this process.
    pub duplicates: u64,
    /// Facts whose owner was not staged first.
    pub unresolved: u64,
    /// Facts about structs the name filter excludes.
    pub filtered: u64,
    /// Messages the queue refused.
    pub dropped: u64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RecorderReport {
    pub stats: RecorderStats,
    /// Set by the direct backend.
    pub merge: Option<MergeReport>,
}

enum Sink {
    Direct {
        staging: StagingStore,
        merge: MergeEngine,
        keep_staging: bool,
    },
    Queue {
        sender: QueueSender,
    },
}

pub struct Recorder {
    sink: Sink,
    filter: Option<Pattern>,
    base_path: Option<PathBuf>,
    sources: FxHashSet<String>,
    stats: RecorderStats,
}

impl Recorder {
    pub fn from_config(config: &CstructConfig) -> Result<Self, CstructError> {
        let recorder = match config.transport.effective_backend() {
            Backend::Direct => {
                let storage = &config.storage;
                let retry = RetryPolicy::from_config(&config.retry);
                retry.install();
                let staging = StagingStore::open_in_dir(&storage.effective_staging_dir())?;
                let merge = MergeEngine::new(
                    &storage.effective_database(),
                    HostLock::from_config(storage)?,
                    retry,
                )
                .with_run(config.run.run_id());
                Self::direct(staging, merge).with_keep_staging(storage.effective_keep_staging())
            }
            Backend::Queue => {
                let transport = &config.transport;
                Self::queue(QueueSender::connect(
                    &transport.effective_queue_path(),
                    transport.effective_max_message_size(),
                )?)
            }
        };

        let mut recorder = recorder;
        if let Some(ref filter) = config.run.filter {
            let pattern = Pattern::new(filter).map_err(|e| ConfigError::InvalidValue {
                field: "run.filter".to_string(),
                message: e.to_string(),
            })?;
            recorder = recorder.with_filter(pattern);
        }
        if let Some(ref base) = config.storage.base_path {
            recorder = recorder.with_base_path(base);
        }
        Ok(recorder)
    }

    pub fn direct(staging: StagingStore, merge: MergeEngine) -> Self {
        Self::with_sink(Sink::Direct {
            staging,
            merge,
            keep_staging: false,
        })
    }

    pub fn queue(sender: QueueSender) -> Self {
        Self::with_sink(Sink::Queue { sender })
    }

    fn with_sink(sink: Sink) -> Self {
        Self {
            sink,
            filter: None,
            base_path: None,
            sources: FxHashSet::default(),
            stats: RecorderStats::default(),
        }
    }

    /// Only record facts about structs whose name matches `pattern`.
    pub fn with_filter(mut self, pattern: Pattern) -> Self {
        self.filter = Some(pattern);
        self
    }

    /// Record source paths relative to `base`.
    pub fn with_base_path(mut self, base: impl Into<PathBuf>) -> Self {
        self.base_path = Some(base.into());
        self
    }

    /// Leave the staging store on disk after a successful merge.
    pub fn with_keep_staging(mut self, keep: bool) -> Self {
        if let Sink::Direct {
            ref mut keep_staging,
            ..
        } = self.sink
        {
            *keep_staging = keep;
        }
        self
    }

    pub fn stats(&self) -> RecorderStats {
        self.stats
    }

    /// Path of the staging store, for the direct backend.
    pub fn staging_path(&self) -> Option<&Path> {
        match &self.sink {
            Sink::Direct { staging, .. } => Some(staging.path()),
            Sink::Queue { .. } => None,
        }
    }

    /// Record a source file once per process.
    pub fn record_source(&mut self, path: &str) -> Result<(), StorageError> {
        let path = self.relativize(path);
        self.record_relative_source(path)
    }

    /// `path` is already relative to the base path.
    fn record_relative_source(&mut self, path: String) -> Result<(), StorageError> {
        if self.sources.contains(&path) {
            return Ok(());
        }
        self.emit(Fact::Source(SourceFact { path: path.clone() }))?;
        self.sources.insert(path);
        Ok(())
    }

    /// Record a struct, after its source.
    pub fn record_struct(&mut self, mut fact: StructFact) -> Result<(), StorageError> {
        if !self.admits(&fact.name) {
            return Ok(());
        }
        fact.source = self.relativize(&fact.source);
        self.record_relative_source(fact.source.clone())?;
        self.emit(Fact::Struct(fact))
    }

    pub fn record_member(&mut self, mut fact: MemberFact) -> Result<(), StorageError> {
        if !self.admits(&fact.owner.name) {
            return Ok(());
        }
        fact.owner.source = self.relativize(&fact.owner.source);
        self.emit(Fact::Member(fact))
    }

    /// Record a use, after the source it occurs in.
    pub fn record_use(&mut self, mut fact: UseFact) -> Result<(), StorageError> {
        if !self.admits(&fact.owner.name) {
            return Ok(());
        }
        fact.owner.source = self.relativize(&fact.owner.source);
        fact.source = self.relativize(&fact.source);
        self.record_relative_source(fact.source.clone())?;
        self.emit(Fact::Use(fact))
    }

    /// Hand everything recorded to the corpus.
    ///
    /// Direct: commit staging, merge it, and delete it unless kept. A failed
    /// merge leaves the staging store on disk. Queue: send a flush.
    pub fn finish(mut self) -> Result<RecorderReport, CstructError> {
        match self.sink {
            Sink::Direct {
                mut staging,
                mut merge,
                keep_staging,
            } => {
                let report = match merge.merge(&mut staging) {
                    Ok(report) => report,
                    Err(e) => {
                        tracing::error!(
                            staging = %staging.path().display(),
                            error = %e.diagnostic(),
                            "merge failed; staged facts kept"
                        );
                        return Err(e.into());
                    }
                };
                if !keep_staging {
                    staging.remove()?;
                }
                Ok(RecorderReport {
                    stats: self.stats,
                    merge: Some(report),
                })
            }
            Sink::Queue { sender } => {
                if let Err(e) = sender.send_flush() {
                    self.stats.dropped += 1;
                    tracing::warn!(error = %e.diagnostic(), "could not send flush");
                }
                Ok(RecorderReport {
                    stats: self.stats,
                    merge: None,
                })
            }
        }
    }

    fn admits(&mut self, struct_name: &str) -> bool {
        let admitted = self
            .filter
            .as_ref()
            .map_or(true, |pattern| pattern.matches(struct_name));
        if !admitted {
            self.stats.filtered += 1;
        }
        admitted
    }

    fn relativize(&self, path: &str) -> String {
        match self.base_path {
            Some(ref base) => match Path::new(path).strip_prefix(base) {
                Ok(rel) => rel.to_string_lossy().into_owned(),
                Err(_) => path.to_string(),
            },
            None => path.to_string(),
        }
    }

    fn emit(&mut self, fact: Fact) -> Result<(), StorageError> {
        match self.sink {
            Sink::Direct {
                ref mut staging, ..
            } => match staging.stage(&fact)? {
                StageOutcome::Inserted => self.stats.recorded += 1,
                StageOutcome::Duplicate => self.stats.duplicates += 1,
                StageOutcome::Unresolved => self.stats.unresolved += 1,
            },
            Sink::Queue { ref sender } => match sender.send(&Message::from_fact(&fact)) {
                Ok(()) => self.stats.recorded += 1,
                Err(e) => {
                    self.stats.dropped += 1;
                    tracing::warn!(kind = %fact.kind(), error = %e.diagnostic(), "fact dropped");
                }
            },
        }
        Ok(())
    }
}
