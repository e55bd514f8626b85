//! Configuration system for cstruct.
//! TOML-based, layered resolution: CLI > env > project > user > defaults.

pub mod cstruct_config;
pub mod retry_config;
pub mod run_config;
pub mod storage_config;
pub mod transport_config;

pub use cstruct_config::{CliOverrides, CstructConfig};
pub use retry_config::RetryConfig;
pub use run_config::RunConfig;
pub use storage_config::StorageConfig;
pub use transport_config::{Backend, TransportConfig};
