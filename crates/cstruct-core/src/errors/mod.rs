//! Error handling for cstruct.
//! One error enum per subsystem, `thiserror` only, zero `anyhow`.

pub mod config_error;
pub mod cstruct_error;
pub mod error_code;
pub mod lock_error;
pub mod merge_error;
pub mod storage_error;
pub mod transport_error;

pub use config_error::ConfigError;
pub use cstruct_error::CstructError;
pub use error_code::CstructErrorCode;
pub use lock_error::LockError;
pub use merge_error::MergeError;
pub use storage_error::StorageError;
pub use transport_error::TransportError;
