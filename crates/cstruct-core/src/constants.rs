//! Shared constants.

/// Name recorded for anonymous struct/union members of another aggregate.
pub const ANONYMOUS: &str = "<anonymous>";

/// Name recorded for unnamed declarations and unnamed fields.
pub const UNNAMED: &str = "<unnamed>";

/// Separator between attributes in a struct's attribute string.
pub const ATTR_SEPARATOR: &str = "|";

/// Default corpus file name.
pub const DEFAULT_DATABASE: &str = "structs.db";

/// Default name of the host-scoped merge lock.
pub const DEFAULT_LOCK_NAME: &str = "clang_struct";

/// Default queue socket file name, placed in the OS temp dir.
pub const DEFAULT_QUEUE_NAME: &str = "cstruct-filler.sock";

/// Project config file name.
pub const PROJECT_CONFIG_FILE: &str = "cstruct.toml";

/// Busy retry interval in milliseconds.
pub const BUSY_INTERVAL_MS: u64 = 20;

/// Busy retry ceiling in seconds (20 minutes).
pub const BUSY_CEILING_SECS: u64 = 20 * 60;

/// Largest datagram the filler accepts by default.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 8192;

/// Writer channel capacity.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Idle period after which the filler commits its open batch.
pub const DEFAULT_IDLE_FLUSH_MS: u64 = 5000;
