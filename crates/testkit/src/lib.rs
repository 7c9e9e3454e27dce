#![warn(missing_docs)]
//! Test surfaces for the dispatch layer: in-memory peers and a handler that
//! records what the main context ran.

mod loopback;
mod recording;

pub use loopback::*;
pub use recording::*;

use tracing_subscriber::EnvFilter;

/// Install a `tracing` subscriber writing through the test harness.
///
/// Safe to call from every test; only the first call installs anything.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
        )
        .with_test_writer()
        .try_init();
}
