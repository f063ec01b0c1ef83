//! `tracing` subscriber setup for binaries and tests.

use tracing::debug;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

/// Install a stderr fmt subscriber at `level` (`error` .. `trace`).
///
/// `RUST_LOG`, when set, takes precedence over `level`.
pub fn init(level: &str) -> anyhow::Result<()> {
    let level = level.parse::<LevelFilter>()?;
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .try_init()?;

    debug!(%level, "logging initialized");
    Ok(())
}

/// Route logs into the test harness' captured output. Safe to call from every test.
pub fn init_for_tests() {
    use std::sync::Once;

    static INIT: Once = Once::new();

    INIT.call_once(|| {
        let filter = EnvFilter::builder()
            .with_default_directive(LevelFilter::DEBUG.into())
            .from_env_lossy();

        // Another subscriber may already be installed by the test binary.
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}
