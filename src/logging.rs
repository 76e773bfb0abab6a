// ==========================================
// Product Feed Import - logging setup
// ==========================================
// tracing + tracing-subscriber, level filter from RUST_LOG.
// ==========================================

use tracing_subscriber::{fmt, EnvFilter};

/// Installs the process-wide subscriber.
///
/// # Environment
/// - RUST_LOG: level filter (default: info)
///   e.g. `RUST_LOG=debug` or `RUST_LOG=feed_import=trace`
///
/// # Example
/// ```no_run
/// use feed_import::logging;
/// logging::init();
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_line_number(true)
        .init();
}

/// Same as `init`, emitting one JSON object per event.
pub fn init_json() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    fmt()
        .json()
        .with_env_filter(filter)
        .with_target(true)
        .with_current_span(true)
        .init();
}

/// Debug-level logging captured by the test harness. Safe to call repeatedly.
pub fn init_test() {
    let _ = fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}
