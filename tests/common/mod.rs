//! Shared test helpers.

use std::sync::Once;

static INIT: Once = Once::new();

/// Installs a tracing subscriber writing to the test harness. Safe to call
/// from every test; only the first call installs.
pub fn init_test_logging() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "taskscope=debug".into()),
            )
            .with_test_writer()
            .try_init();
    });
}
