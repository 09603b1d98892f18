//! Development-time tracing for debugging the loop.
//!
//! Tracing output is dev diagnostics only: it goes to stderr, is filtered by
//! `RUST_LOG`, and is never persisted. The durable record of what each
//! session did lives in `.conductor/` (see `io::session_log`) and is written
//! regardless of the filter configured here.

use tracing_subscriber::EnvFilter;

/// Filter applied when `RUST_LOG` is unset.
const DEFAULT_FILTER: &str = "warn";

/// Install the global tracing subscriber.
///
/// ```bash
/// RUST_LOG=conductor=debug cargo run -- run
/// ```
pub fn init() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}
