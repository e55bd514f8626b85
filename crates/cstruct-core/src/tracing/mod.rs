//! Observability for cstruct.
//! `tracing` crate with `EnvFilter`, per-crate log levels, stderr output.

pub mod metrics;
pub mod setup;

pub use setup::init_tracing;
