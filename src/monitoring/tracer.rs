/*!
 * Structured Tracing
 * Subscriber setup for the `tracing` events emitted by the sync and queue layers
 *
 * Events carry structured fields (slot, token, role, spin budget, marker)
 * rather than formatted strings, so the JSON output can be filtered per field.
 */

use tracing::{debug, info, span, Level, Span};
use tracing_subscriber::{
    fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

/// Environment variable selecting JSON output
pub const TRACE_JSON_ENV: &str = "SYNC_TRACE_JSON";

/// Filter used when RUST_LOG is unset
pub const DEFAULT_FILTER: &str = "info";

/// Initialize structured tracing
///
/// Environment variables:
/// - RUST_LOG: Set log level (default: info)
/// - SYNC_TRACE_JSON: Enable JSON output (default: false)
///
/// Safe to call more than once; a subscriber installed earlier (by a host or
/// another test) is left in place.
pub fn init_tracing() {
    // Park and wake events are debug/trace; keep them off unless asked for
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let registry = tracing_subscriber::registry().with(env_filter);
    let json = json_requested();

    let installed = if json {
        // One object per event with the worker span attached
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_thread_names(true)
                    .with_line_number(true)
                    .with_file(true)
                    .with_current_span(true)
                    .with_span_list(false),
            )
            .try_init()
    } else {
        // Thread names carry the worker role, file/line adds only noise here
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_thread_names(true)
                    .with_span_events(FmtSpan::CLOSE)
                    .compact(),
            )
            .try_init()
    };

    match installed {
        Ok(()) => info!(json, "Structured tracing initialized"),
        Err(_) => debug!("Tracing subscriber already installed"),
    }
}

fn json_requested() -> bool {
    std::env::var(TRACE_JSON_ENV)
        .map(|v| v == "1" || v == "true")
        .unwrap_or(false)
}

/// Span covering one pipeline thread
#[inline]
pub fn span_worker(role: &'static str, index: usize) -> Span {
    span!(Level::DEBUG, "worker", role, index)
}
