//! Span exporters: push targets invoked when a span ends

use super::span::{Span, StatusCode};
use crate::error::Result;
use lego_common::Pretty;
use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

/// Receives every completed span.
///
/// Called synchronously on the thread that ended the span, after the span is
/// in the tracer's completed buffer. An error or panic in one exporter does
/// not stop the others.
pub trait SpanExporter: Send + Sync {
    /// Name used in diagnostics
    fn name(&self) -> &str {
        "span-exporter"
    }

    fn export(&self, span: &Span) -> Result<()>;

    /// Release resources; called once by `Tracer::shutdown_exporters`
    fn shutdown(&self) -> Result<()> {
        Ok(())
    }
}

/// Keeps the most recent exported spans in memory
#[derive(Debug)]
pub struct InMemorySpanExporter {
    spans: Mutex<VecDeque<Span>>,
    capacity: usize,
}

impl InMemorySpanExporter {
    pub fn new(capacity: usize) -> Self {
        Self {
            spans: Mutex::new(VecDeque::new()),
            capacity,
        }
    }

    pub fn spans(&self) -> Vec<Span> {
        self.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<Span>> {
        self.spans.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SpanExporter for InMemorySpanExporter {
    fn name(&self) -> &str {
        "in-memory"
    }

    fn export(&self, span: &Span) -> Result<()> {
        let mut spans = self.lock();
        spans.push_back(span.clone());
        while spans.len() > self.capacity {
            spans.pop_front();
        }
        Ok(())
    }
}

/// Emits each completed span as a `tracing` event
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSpanExporter;

impl SpanExporter for TracingSpanExporter {
    fn name(&self) -> &str {
        "tracing"
    }

    fn export(&self, span: &Span) -> Result<()> {
        let duration_ms = span
            .duration
            .and_then(|d| d.num_microseconds())
            .map(|micros| micros as f64 / 1000.0);
        match span.status.code {
            StatusCode::Error => tracing::warn!(
                target: "lego_telemetry::span",
                name = %span.name,
                trace_id = %span.trace_id,
                span_id = %span.span_id,
                duration_ms,
                status_message = span.status.message.as_deref().unwrap_or_default(),
                "span failed; attributes: {}",
                Pretty(&span.attributes)
            ),
            _ => tracing::info!(
                target: "lego_telemetry::span",
                name = %span.name,
                trace_id = %span.trace_id,
                span_id = %span.span_id,
                duration_ms,
                events = span.events.len(),
                "span completed"
            ),
        }
        Ok(())
    }
}
