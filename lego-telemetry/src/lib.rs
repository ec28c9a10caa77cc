//! Lightweight tracing, metrics and structured logging
//!
//! Three cooperating pieces share one [`TelemetryConfig`]:
//!
//! - [`Tracer`] - spans with W3C-compatible ids, a bounded buffer of
//!   completed spans, synchronous exporters and an orphan sweep that
//!   force-closes spans nobody ended
//! - [`MetricsCollector`] - counters, gauges and histograms keyed by name and
//!   a canonical label set, exportable as Prometheus text
//! - [`StructuredLogger`] - leveled JSON-friendly log entries, buffered and
//!   flushed to [`LogSink`]s on an interval
//!
//! [`Telemetry`] bundles all three and owns their background tasks.
//!
//! ```rust,no_run
//! use lego_telemetry::{LogLevel, Telemetry, TelemetryConfig};
//! use serde_json::json;
//!
//! # async fn example() -> lego_telemetry::Result<()> {
//! let telemetry = Telemetry::new(TelemetryConfig::new("checkout"))?;
//!
//! let span = telemetry.tracer().start_root_span("charge card");
//! telemetry
//!     .metrics()
//!     .increment_counter("payments_total", 1.0, &[("method", "card")])?;
//! telemetry
//!     .logger()
//!     .log_in_span(LogLevel::Info, "charging", json!({"amount": 42}), &span.context());
//! span.end();
//!
//! telemetry.shutdown()?;
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
pub mod logs;
pub mod metrics;
mod telemetry;
pub mod traces;

pub use config::{TelemetryConfig, ENV_PREFIX};
pub use error::{Result, TelemetryError};
pub use logs::{InMemoryLogSink, JsonLinesLogSink, LogEntry, LogLevel, LogSink, StructuredLogger};
pub use metrics::{HistogramSummary, MetricKind, MetricsCollector, MetricsSnapshot, Timer};
pub use telemetry::Telemetry;
pub use traces::{
    InMemorySpanExporter, Span, SpanContext, SpanEvent, SpanExporter, SpanHandle, SpanId,
    SpanLink, SpanOptions, SpanStatus, StatusCode, TraceId, Tracer, TracingSpanExporter,
};
