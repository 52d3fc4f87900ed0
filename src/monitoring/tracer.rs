/*!
 * Request Tracing
 * Structured tracing for boundary crossings using the tracing crate
 *
 * Features:
 * - Trace ID per request for log correlation
 * - JSON or compact human-readable output
 * - Slow request warnings with timing fields
 */

use crate::core::limits::SLOW_REQUEST_THRESHOLD_MS;
use std::time::Instant;
use tracing::{debug, info, span, warn, Level, Span};
use tracing_subscriber::{
    fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};
use uuid::Uuid;

/// Initialize structured tracing
///
/// Environment variables:
/// - RUST_LOG: Set log level (default: info)
/// - KDICT_TRACE_JSON: Enable JSON output (default: false)
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let use_json = std::env::var("KDICT_TRACE_JSON")
        .map(|v| v == "1" || v == "true")
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(env_filter);

    if use_json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .init();
        info!("Structured tracing initialized with JSON output");
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_line_number(true)
                    .compact(),
            )
            .init();
        info!("Structured tracing initialized");
    }
}

/// Generate a unique trace ID for request correlation
pub fn generate_trace_id() -> String {
    Uuid::new_v4().to_string()
}

/// Span covering one dispatched command
pub struct RequestSpan {
    span: Span,
    start: Instant,
    command: &'static str,
    trace_id: String,
}

impl RequestSpan {
    pub fn new(command: &'static str) -> Self {
        let trace_id = generate_trace_id();
        let span = span!(
            Level::DEBUG,
            "ioctl",
            trace_id = %trace_id,
            command = command,
            status = tracing::field::Empty,
            duration_us = tracing::field::Empty,
        );

        Self {
            span,
            start: Instant::now(),
            command,
            trace_id,
        }
    }

    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    /// Record the status code returned to the caller
    pub fn record_status(&self, status: crate::core::errors::Status) {
        self.span.record("status", tracing::field::debug(status));
    }

    /// Enter the span context
    pub fn enter(&self) -> tracing::span::Entered<'_> {
        self.span.enter()
    }
}

impl Drop for RequestSpan {
    fn drop(&mut self) {
        let duration = self.start.elapsed();
        self.span.record("duration_us", duration.as_micros() as u64);
        let _entered = self.span.enter();

        if duration.as_millis() > SLOW_REQUEST_THRESHOLD_MS {
            warn!(
                trace_id = %self.trace_id,
                command = self.command,
                duration_ms = duration.as_millis() as u64,
                slow = true,
                "slow request detected"
            );
        } else {
            debug!(
                trace_id = %self.trace_id,
                command = self.command,
                duration_us = duration.as_micros() as u64,
                "request completed"
            );
        }
    }
}
