//! The filler daemon: the single writer behind the queue.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use cstruct_core::config::CstructConfig;
use cstruct_core::errors::{CstructError, TransportError};
use cstruct_core::types::RunId;
use serde::Serialize;

use crate::connection::RetryPolicy;
use crate::corpus::ConsolidatedStore;

use super::message::Message;
use super::queue::QueueReceiver;
use super::writer::{FactWriter, WriterOptions, WriterStats};

/// Upper bound on one blocking receive, so a stop request is noticed.
const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Asks a running daemon to drain and stop. Cloneable across threads and
/// signal handlers.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DaemonReport {
    pub run: Option<RunId>,
    /// Datagrams received, flushes included.
    pub received: u64,
    pub flushes: u64,
    pub malformed: u64,
    pub writer: WriterStats,
}

pub struct Daemon {
    receiver: QueueReceiver,
    writer: FactWriter,
    stop: StopHandle,
    run: Option<RunId>,
}

impl Daemon {
    /// Open the corpus, create a run if tracking wants one, and bind the
    /// queue.
    pub fn start(config: &CstructConfig) -> Result<Self, CstructError> {
        let retry = RetryPolicy::from_config(&config.retry);
        retry.install();
        let corpus = ConsolidatedStore::open(&config.storage.effective_database())?.with_retry(retry);

        let run = match config.run.run_id() {
            Some(id) => Some(id),
            None if config.run.effective_track() => Some(corpus.create_run(&config.run.run_info())?),
            None => None,
        };

        let transport = &config.transport;
        let receiver = QueueReceiver::bind(
            &transport.effective_queue_path(),
            transport.effective_max_message_size(),
            transport.effective_unlink_stale(),
            POLL_INTERVAL.min(transport.effective_idle_flush()),
        )?;

        let options = WriterOptions {
            run,
            retry,
            ..WriterOptions::from_config(transport)
        };
        tracing::info!(
            database = %config.storage.effective_database().display(),
            run = ?run,
            autocommit = options.autocommit,
            "filler started"
        );
        let writer = FactWriter::new(corpus.into_connection(), options);
        Ok(Self::new(receiver, writer, run))
    }

    pub fn new(receiver: QueueReceiver, writer: FactWriter, run: Option<RunId>) -> Self {
        Self {
            receiver,
            writer,
            stop: StopHandle::default(),
            run,
        }
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn run_id(&self) -> Option<RunId> {
        self.run
    }

    /// Receive until stopped, then commit what is pending.
    pub fn run(self) -> Result<DaemonReport, CstructError> {
        let Daemon {
            mut receiver,
            writer,
            stop,
            run,
        } = self;
        let mut report = DaemonReport {
            run,
            ..Default::default()
        };

        while !stop.is_stopped() {
            let bytes = match receiver.recv() {
                Ok(Some(bytes)) => bytes,
                Ok(None) => continue,
                Err(TransportError::Malformed { reason }) => {
                    report.malformed += 1;
                    tracing::warn!(%reason, "dropped malformed datagram");
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            report.received += 1;

            match Message::decode(bytes) {
                Ok(message) if message.is_flush() => {
                    report.flushes += 1;
                    writer.flush()?;
                }
                Ok(message) => writer.insert(message.into_owned())?,
                Err(e) => {
                    report.malformed += 1;
                    tracing::warn!(error = %e, "dropped malformed datagram");
                }
            }
        }

        tracing::info!(received = report.received, "filler stopping; committing");
        report.writer = writer.shutdown()?;
        tracing::info!(
            inserted = report.writer.inserted(),
            ignored = report.writer.ignored,
            failed = report.writer.failed,
            malformed = report.malformed,
            "filler stopped"
        );
        Ok(report)
    }
}
