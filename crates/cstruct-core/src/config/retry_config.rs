//! Busy retry policy.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{BUSY_CEILING_SECS, BUSY_INTERVAL_MS};

/// `[retry]`: governs every busy wait in the process, both the handler
/// installed on each connection and the retried BEGIN IMMEDIATE and ATTACH.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RetryConfig {
    /// Sleep between attempts, in milliseconds. Default: 20.
    pub interval_ms: Option<u64>,
    /// Give up after this long, in seconds. Default: 1200.
    pub ceiling_secs: Option<u64>,
}

impl RetryConfig {
    pub fn effective_interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.unwrap_or(BUSY_INTERVAL_MS))
    }

    pub fn effective_ceiling(&self) -> Duration {
        Duration::from_secs(self.ceiling_secs.unwrap_or(BUSY_CEILING_SECS))
    }
}
