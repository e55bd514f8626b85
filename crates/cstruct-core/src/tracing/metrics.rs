//! Structured field names used in tracing events.
//!
//! Merge and writer events use these names so log lines from many analysis
//! processes can be aggregated with one query.

/// Merge: wall time spent inside the critical section, in milliseconds.
pub const MERGE_DURATION_MS: &str = "merge_duration_ms";

/// Merge: wall time spent waiting for the host lock, in milliseconds.
pub const LOCK_WAIT_MS: &str = "lock_wait_ms";

/// Merge: staged members whose owning struct did not resolve in the corpus.
pub const UNRESOLVED_MEMBERS: &str = "unresolved_members";

/// Merge: staged uses whose owning member did not resolve in the corpus.
pub const UNRESOLVED_USES: &str = "unresolved_uses";

/// Writer: rows committed by one batch commit.
pub const BATCH_ROWS: &str = "batch_rows";

/// Writer: batch commit time in milliseconds.
pub const BATCH_COMMIT_MS: &str = "batch_commit_ms";
