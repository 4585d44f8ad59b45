//! Development-time tracing for the loader.
//!
//! # Separation of Concerns
//!
//! - **Tracing (this module)**: Diagnostics via `RUST_LOG`, output to stderr.
//!   Reactor decisions are logged at `debug`, executions and transitions at
//!   `info`.
//!
//! - **CLI output**: Execution requests are printed as JSON lines on stdout by
//!   the executor and are unaffected by `RUST_LOG`.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing subscriber for development logging.
///
/// Reads `RUST_LOG` env var. Falls back to `fallback` (from config) if unset
/// or unparsable.
///
/// # Example
/// ```bash
/// RUST_LOG=script_loader=debug cargo run -- replay --scripts scripts.toml /live/clusters/c1
/// ```
pub fn init(fallback: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    // A second init (e.g. from tests) keeps the first subscriber.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .try_init();
}
