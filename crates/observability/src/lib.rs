//! Tracing/logging initialization (shared setup).

use tracing_subscriber::EnvFilter;

/// Initialize process-wide tracing/logging.
///
/// JSON logs with timestamps, filtered via `RUST_LOG` (default `info`).
/// Safe to call multiple times; subsequent calls are no-ops.
pub fn init() {
    try_init(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")));
}

/// Initialize with explicit filter directives, ignoring `RUST_LOG`.
///
/// Used by tests and tools that want a fixed verbosity, e.g.
/// `init_with_filter("warn")`.
pub fn init_with_filter(directives: &str) {
    try_init(EnvFilter::new(directives));
}

fn try_init(filter: EnvFilter) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false)
        .try_init();
}
