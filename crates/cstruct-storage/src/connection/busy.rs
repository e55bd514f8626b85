//! Retry on engine contention.
//!
//! Every connection gets a busy handler that sleeps a fixed interval per
//! attempt and gives up at a ceiling. The handler is a plain function, so
//! its interval and ceiling are process-wide: 20ms and 20 minutes until
//! [`RetryPolicy::install`] replaces them from `[retry]`. Statements that
//! can still report busy before the handler runs (BEGIN IMMEDIATE, ATTACH)
//! go through [`RetryPolicy::run`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use cstruct_core::config::RetryConfig;
use cstruct_core::constants::{BUSY_CEILING_SECS, BUSY_INTERVAL_MS};
use cstruct_core::errors::StorageError;
use rusqlite::Connection;

static HANDLER_INTERVAL_MS: AtomicU64 = AtomicU64::new(BUSY_INTERVAL_MS);
static HANDLER_CEILING_MS: AtomicU64 = AtomicU64::new(BUSY_CEILING_SECS * 1000);

fn max_attempts(interval_ms: u64, ceiling_ms: u64) -> i32 {
    let attempts = ceiling_ms / interval_ms.max(1);
    i32::try_from(attempts).unwrap_or(i32::MAX)
}

fn retry_while_busy(attempt: i32) -> bool {
    let interval_ms = HANDLER_INTERVAL_MS.load(Ordering::Relaxed);
    let ceiling_ms = HANDLER_CEILING_MS.load(Ordering::Relaxed);
    if attempt >= max_attempts(interval_ms, ceiling_ms) {
        tracing::error!(attempt, "database still busy after retry ceiling, giving up");
        return false;
    }
    if attempt > 0 && attempt % 500 == 0 {
        tracing::debug!(attempt, "database busy, still waiting");
    }
    std::thread::sleep(Duration::from_millis(interval_ms));
    true
}

/// Install the fixed-interval busy handler on a connection.
pub fn install_busy_handler(conn: &Connection) -> Result<(), StorageError> {
    conn.busy_handler(Some(retry_while_busy))
        .map_err(|e| StorageError::SqliteError {
            message: format!("failed to install busy handler: {e}"),
        })
}

/// Sleep-and-retry policy for operations that surface `DbBusy`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    interval: Duration,
    ceiling: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(BUSY_INTERVAL_MS),
            ceiling: Duration::from_secs(BUSY_CEILING_SECS),
        }
    }
}

impl RetryPolicy {
    pub fn new(interval: Duration, ceiling: Duration) -> Self {
        Self { interval, ceiling }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(config.effective_interval(), config.effective_ceiling())
    }

    /// Make this the interval and ceiling of every busy handler in the
    /// process, including handlers already installed.
    pub fn install(&self) {
        HANDLER_INTERVAL_MS.store(self.interval.as_millis() as u64, Ordering::Relaxed);
        HANDLER_CEILING_MS.store(self.ceiling.as_millis() as u64, Ordering::Relaxed);
        tracing::debug!(
            interval_ms = self.interval.as_millis() as u64,
            ceiling_ms = self.ceiling.as_millis() as u64,
            "busy handler configured"
        );
    }

    /// The interval and ceiling busy handlers currently use.
    pub fn installed() -> Self {
        Self::new(
            Duration::from_millis(HANDLER_INTERVAL_MS.load(Ordering::Relaxed)),
            Duration::from_millis(HANDLER_CEILING_MS.load(Ordering::Relaxed)),
        )
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn ceiling(&self) -> Duration {
        self.ceiling
    }

    /// Run `op` until it returns something other than `DbBusy`, or until
    /// the ceiling would be exceeded by another sleep.
    pub fn run<T, F>(&self, what: &str, mut op: F) -> Result<T, StorageError>
    where
        F: FnMut() -> Result<T, StorageError>,
    {
        let started = Instant::now();
        let mut attempts: u64 = 0;
        loop {
            match op() {
                Err(e) if e.is_busy() => {
                    attempts += 1;
                    if started.elapsed() + self.interval > self.ceiling {
                        tracing::warn!(what, attempts, "giving up on busy database");
                        return Err(e);
                    }
                    std::thread::sleep(self.interval);
                }
                other => {
                    if attempts > 0 {
                        tracing::debug!(what, attempts, "database became available");
                    }
                    return other;
                }
            }
        }
    }
}
