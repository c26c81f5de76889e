//! Tracing subscriber setup shared by the binaries

use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset
pub const DEFAULT_FILTER: &str = "courier_server=info,tower_http=info";

/// Install the global `fmt` subscriber.
///
/// `RUST_LOG` wins over `default_filter`. Calling this twice is harmless; the
/// second install is ignored.
pub fn init_tracing(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init();
}
