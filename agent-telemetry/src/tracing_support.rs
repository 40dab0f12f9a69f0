//! `tracing`-subscriber initialization.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Initializes a global `tracing` subscriber writing compact, leveled output
/// to stdout.
///
/// The filter is read from `RUST_LOG` if set, otherwise falls back to
/// `default_level` (e.g. `"info"`). Calling this more than once in a
/// process is harmless; later calls are no-ops.
pub fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let fmt_layer = tracing_subscriber::fmt::layer().with_target(false).with_level(true);

    let _ = tracing_subscriber::registry().with(fmt_layer.with_filter(filter)).try_init();
}
