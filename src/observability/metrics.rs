//! Forwarding metrics.
//!
//! # Metrics
//! - `proxy_forward_total` (counter): forwards by outcome
//! - `proxy_forward_duration_seconds` (histogram): transport latency

use std::time::Instant;

/// Outcome label for a transport status code.
pub fn outcome(code: u16) -> &'static str {
    match code {
        0 => "miss",
        299 => "unparsable",
        403 => "forbidden",
        404 => "not_found",
        100..=399 => "ok",
        _ => "error",
    }
}

/// Record one transport invocation.
pub fn record_forward(code: u16, start: Instant) {
    metrics::counter!("proxy_forward_total", "outcome" => outcome(code)).increment(1);
    metrics::histogram!("proxy_forward_duration_seconds").record(start.elapsed().as_secs_f64());
}
