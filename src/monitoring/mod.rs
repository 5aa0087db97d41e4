/*!
 * Monitoring
 * Tracing subscriber setup
 */

mod tracer;

pub use tracer::{init_tracing, span_worker, DEFAULT_FILTER, TRACE_JSON_ENV};
