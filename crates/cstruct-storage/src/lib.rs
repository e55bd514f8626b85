//! cstruct-storage: SQLite persistence for struct facts.
//!
//! Two ways into the corpus:
//! - direct: each analysis process stages facts in a private store and
//!   merges them under a host-wide lock ([`merge::MergeEngine`]);
//! - queue: facts travel as datagrams to the filler daemon, the only
//!   writer ([`transport::Daemon`]).
//!
//! [`recorder::Recorder`] picks one of them from configuration.

pub mod connection;
pub mod corpus;
pub mod lock;
pub mod merge;
pub mod migrations;
pub mod queries;
pub mod recorder;
pub mod retention;
pub mod staging;
pub mod statements;
pub mod transport;

pub use corpus::ConsolidatedStore;
pub use lock::{HostLock, LockState};
pub use merge::{MergeEngine, MergeReport};
pub use recorder::Recorder;
pub use staging::{StageOutcome, StagingStore};
