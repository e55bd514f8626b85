//! cstruct-core: fact types, errors, configuration, and tracing shared by
//! the analysis-side recorder and the filler daemon.

pub mod config;
pub mod constants;
pub mod errors;
pub mod tracing;
pub mod types;

pub use config::CstructConfig;
pub use errors::CstructError;
