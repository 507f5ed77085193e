// RpaDeck — Structured logging via tracing

use tracing_subscriber::{fmt, EnvFilter};

/// Initialize the global tracing subscriber.
///
/// Log level is controlled by the `RPADECK_LOG` env var (default: `info`).
/// Probe failures are logged at debug (trace for screenshot polls), so:
///   RPADECK_LOG=warn,rpadeck::dispatch=info       only run outcomes
///   RPADECK_LOG=rpadeck::monitor=trace,info       every probe outcome
///   RPADECK_LOG=rpadeck::backend::http=trace      raw GET/POST endpoints
pub fn init() {
    let filter = EnvFilter::try_from_env("RPADECK_LOG").unwrap_or_else(|_| EnvFilter::new("info"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();
}

/// Initialize logger for tests (does not panic if called multiple times).
#[cfg(test)]
pub fn init_test() {
    let _ = fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}
