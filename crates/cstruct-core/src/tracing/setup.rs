//! Tracing initialization.

use std::sync::Once;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

static INIT: Once = Once::new();

/// Default filter when `CSTRUCT_LOG` is unset or unparsable.
pub const DEFAULT_FILTER: &str = "cstruct_core=info,cstruct_storage=info,cstruct_filler=info";

/// Initialize logging for an analysis process or the filler daemon.
///
/// Reads `CSTRUCT_LOG` for per-crate log levels, e.g.
/// `CSTRUCT_LOG=cstruct_storage=debug`. Everything goes to stderr so the
/// host compiler's stdout stays untouched.
///
/// Calling it more than once is a no-op.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_env("CSTRUCT_LOG")
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

        let _ = tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true),
            )
            .with(filter)
            .try_init();
    });
}
