//! Opt-in log output for binaries and tests built on this crate.
//!
//! The library only emits `tracing` events; nothing is printed until the
//! host application installs a subscriber, for example with
//! [`init_logging`].

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install a formatted stderr subscriber filtered by `RUST_LOG`, falling back
/// to `default_filter` (e.g. `"info"` or `"pkmn_collection=debug"`).
///
/// Returns `false` if a global subscriber was already installed.
pub fn init_logging(default_filter: &str) -> bool {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()
        .is_ok()
}
