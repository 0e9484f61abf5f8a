//! cdp-pilot: Chrome DevTools Protocol client and browser supervisor
//!
//! Connects to a locally debuggable Chromium-family browser, resolves a
//! browsing target, and drives it over a multiplexed CDP session. The
//! supervisor launches and tears down the browser process when the
//! debugging endpoint is not already reachable.

pub mod config;
pub mod error;

pub mod cdp;
pub mod supervisor;

// Re-exports
pub use cdp::DevToolsClient;
pub use config::Config;
pub use error::{Error, Result};
pub use supervisor::{LaunchOptions, Supervisor};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize structured logging from `RUST_LOG`. Safe to call more than
/// once; later calls are no-ops.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
}
