//! Spans, the tracer that owns them, and span exporters

mod exporter;
mod ids;
mod span;
mod tracer;

pub use exporter::{InMemorySpanExporter, SpanExporter, TracingSpanExporter};
pub use ids::{SpanContext, SpanId, TraceId};
pub use span::{Attributes, Span, SpanEvent, SpanLink, SpanStatus, StatusCode};
pub use tracer::{SpanHandle, SpanOptions, Tracer};
