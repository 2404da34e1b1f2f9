//! Test logging.
//!
//! The library only emits `tracing` events; installing a subscriber is the
//! application's job. Tests call [`init_test_logging`] to see those events.

use tracing_subscriber::{filter::EnvFilter, fmt};

/// Default filter if RUST_LOG is not set.
const DEFAULT_LOG_FILTER: &str = "jira_gateway=debug,warn";

/// Install a subscriber that writes through the test harness.
///
/// Honours `RUST_LOG`. Safe to call from every test; only the first call
/// installs anything.
pub(crate) fn init_test_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let _ = fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .with_target(true)
        .try_init();
}
