//! Local diagnostics.
//!
//! Queue overflow, delivery failures and lifecycle events are reported through
//! `tracing` to stderr. `RUST_LOG` overrides the configured filter.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when neither `RUST_LOG` nor the configuration sets one.
pub const DEFAULT_FILTER: &str = "watchlist=info,tower_http=info";

/// Install the process-wide diagnostics subscriber.
pub fn init_diagnostics(default_filter: &str) {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}
