//! Logging initialisation shared by binaries and integration tests.

use tracing_subscriber::EnvFilter;

/// Default directives when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "info,siglab_core=debug,siglab_runner=debug";

/// Install a stderr `fmt` subscriber filtered by `RUST_LOG`.
///
/// Stdout stays free for reports. Calling this twice is harmless; the second
/// call keeps the first subscriber.
pub fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .try_init();
}
