//! Backend selection and queue transport.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_CHANNEL_CAPACITY, DEFAULT_IDLE_FLUSH_MS, DEFAULT_MAX_MESSAGE_SIZE, DEFAULT_QUEUE_NAME,
};
use crate::errors::ConfigError;

/// Where recorded facts go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Private staging store, merged into the corpus under the host lock.
    #[default]
    Direct,
    /// Datagrams to the filler daemon, the only corpus writer.
    Queue,
}

impl FromStr for Backend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "direct" => Ok(Self::Direct),
            "queue" => Ok(Self::Queue),
            other => Err(ConfigError::InvalidValue {
                field: "transport.backend".to_string(),
                message: format!("expected `direct` or `queue`, got `{other}`"),
            }),
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Direct => f.write_str("direct"),
            Self::Queue => f.write_str("queue"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct TransportConfig {
    pub backend: Option<Backend>,
    /// Queue socket path. Default: `<tmp>/cstruct-filler.sock`.
    pub queue_path: Option<String>,
    /// Commit every insert on its own. Default: false.
    pub autocommit: Option<bool>,
    /// Commit an open batch after this much silence. Default: 5000.
    pub idle_flush_ms: Option<u64>,
    /// Largest accepted datagram. Default: 8192.
    pub max_message_size: Option<usize>,
    /// Writer channel capacity. Default: 1024.
    pub channel_capacity: Option<usize>,
    /// Remove a stale socket left by a previous filler. Default: false.
    pub unlink_stale: Option<bool>,
}

impl TransportConfig {
    pub fn effective_backend(&self) -> Backend {
        self.backend.unwrap_or_default()
    }

    pub fn effective_queue_path(&self) -> PathBuf {
        self.queue_path
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| std::env::temp_dir().join(DEFAULT_QUEUE_NAME))
    }

    pub fn effective_autocommit(&self) -> bool {
        self.autocommit.unwrap_or(false)
    }

    pub fn effective_idle_flush(&self) -> Duration {
        Duration::from_millis(self.idle_flush_ms.unwrap_or(DEFAULT_IDLE_FLUSH_MS))
    }

    pub fn effective_max_message_size(&self) -> usize {
        self.max_message_size.unwrap_or(DEFAULT_MAX_MESSAGE_SIZE)
    }

    pub fn effective_channel_capacity(&self) -> usize {
        self.channel_capacity.unwrap_or(DEFAULT_CHANNEL_CAPACITY)
    }

    pub fn effective_unlink_stale(&self) -> bool {
        self.unlink_stale.unwrap_or(false)
    }
}
