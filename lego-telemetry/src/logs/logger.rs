//! Buffered structured logger
//!
//! Entries below the configured level are dropped with one integer
//! comparison. Accepted entries are mirrored as `tracing` events and held in
//! a buffer until a flush hands a copy to every sink. A flush runs when the
//! buffer reaches `max_log_buffer`, on the periodic flush task, on an
//! explicit [`StructuredLogger::flush`], and at shutdown.

use super::level::LogLevel;
use super::sink::LogSink;
use crate::config::TelemetryConfig;
use crate::error::{Result, TelemetryError};
use crate::traces::{SpanContext, SpanId, TraceId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One structured log record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub service: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub context: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<TraceId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span_id: Option<SpanId>,
}

/// Objects become the context map; any other non-null value is kept under
/// `value`
fn context_fields(context: Value) -> Map<String, Value> {
    match context {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => {
            let mut map = Map::new();
            map.insert("value".to_string(), other);
            map
        }
    }
}

fn mirror(entry: &LogEntry) {
    let trace_id = entry.trace_id.map(|id| id.to_string());
    let span_id = entry.span_id.map(|id| id.to_string());
    let context = Value::Object(entry.context.clone());
    match entry.level {
        LogLevel::Debug => debug!(
            target: "lego_telemetry::log",
            service = %entry.service,
            trace_id = ?trace_id,
            span_id = ?span_id,
            context = %context,
            "{}",
            entry.message
        ),
        LogLevel::Info => info!(
            target: "lego_telemetry::log",
            service = %entry.service,
            trace_id = ?trace_id,
            span_id = ?span_id,
            context = %context,
            "{}",
            entry.message
        ),
        LogLevel::Warn => warn!(
            target: "lego_telemetry::log",
            service = %entry.service,
            trace_id = ?trace_id,
            span_id = ?span_id,
            context = %context,
            "{}",
            entry.message
        ),
        LogLevel::Error => error!(
            target: "lego_telemetry::log",
            service = %entry.service,
            trace_id = ?trace_id,
            span_id = ?span_id,
            context = %context,
            "{}",
            entry.message
        ),
    }
}

struct LoggerInner {
    service: String,
    min_rank: u8,
    max_buffer: usize,
    flush_interval: Duration,
    buffer: Mutex<Vec<LogEntry>>,
    sinks: RwLock<Vec<Arc<dyn LogSink>>>,
    flusher: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for LoggerInner {
    fn drop(&mut self) {
        if let Some(handle) = lock(&self.flusher).take() {
            handle.abort();
        }
    }
}

/// Leveled logger with buffered, batched delivery to sinks.
///
/// Cheap to clone; clones share the buffer and sinks.
#[derive(Clone)]
pub struct StructuredLogger {
    inner: Arc<LoggerInner>,
}

impl std::fmt::Debug for StructuredLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StructuredLogger")
            .field("service", &self.inner.service)
            .field("pending", &self.pending())
            .finish()
    }
}

impl StructuredLogger {
    /// Fails only when the configured level does not parse
    pub fn new(config: &TelemetryConfig) -> Result<Self> {
        let level = config.parsed_log_level()?;
        Ok(Self {
            inner: Arc::new(LoggerInner {
                service: config.service_name.clone(),
                min_rank: level.rank(),
                max_buffer: config.max_log_buffer.max(1),
                flush_interval: config.log_flush_interval(),
                buffer: Mutex::new(Vec::new()),
                sinks: RwLock::new(Vec::new()),
                flusher: Mutex::new(None),
            }),
        })
    }

    pub fn enabled(&self, level: LogLevel) -> bool {
        level.rank() >= self.inner.min_rank
    }

    pub fn add_sink<S>(&self, sink: S)
    where
        S: LogSink + 'static,
    {
        self.add_shared_sink(Arc::new(sink));
    }

    pub fn add_shared_sink(&self, sink: Arc<dyn LogSink>) {
        self.inner
            .sinks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(sink);
    }

    fn sinks(&self) -> Vec<Arc<dyn LogSink>> {
        self.inner
            .sinks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    // =========================================================================
    // Logging
    // =========================================================================

    /// Record an entry; returns `false` when it is below the level threshold
    pub fn log(&self, level: LogLevel, message: impl Into<String>, context: Value) -> bool {
        self.record(level, message.into(), context, None)
    }

    /// Record an entry correlated with a span
    pub fn log_in_span(
        &self,
        level: LogLevel,
        message: impl Into<String>,
        context: Value,
        span: &SpanContext,
    ) -> bool {
        self.record(level, message.into(), context, Some(span))
    }

    pub fn debug(&self, message: impl Into<String>, context: Value) -> bool {
        self.log(LogLevel::Debug, message, context)
    }

    pub fn info(&self, message: impl Into<String>, context: Value) -> bool {
        self.log(LogLevel::Info, message, context)
    }

    pub fn warn(&self, message: impl Into<String>, context: Value) -> bool {
        self.log(LogLevel::Warn, message, context)
    }

    pub fn error(&self, message: impl Into<String>, context: Value) -> bool {
        self.log(LogLevel::Error, message, context)
    }

    fn record(
        &self,
        level: LogLevel,
        message: String,
        context: Value,
        span: Option<&SpanContext>,
    ) -> bool {
        if !self.enabled(level) {
            return false;
        }
        let entry = LogEntry {
            timestamp: Utc::now(),
            level,
            service: self.inner.service.clone(),
            message,
            context: context_fields(context),
            trace_id: span.map(|ctx| ctx.trace_id),
            span_id: span.map(|ctx| ctx.span_id),
        };
        mirror(&entry);

        let full = {
            let mut buffer = lock(&self.inner.buffer);
            buffer.push(entry);
            buffer.len() >= self.inner.max_buffer
        };
        if full {
            if let Err(e) = self.flush() {
                error!("log flush on full buffer failed: {}", e);
            }
        }
        true
    }

    /// Entries waiting for the next flush
    pub fn pending(&self) -> usize {
        lock(&self.inner.buffer).len()
    }

    // =========================================================================
    // Flushing
    // =========================================================================

    /// Hand buffered entries to every sink and return how many were flushed.
    ///
    /// The buffer is emptied before any sink runs. Every sink gets the
    /// batch even if an earlier one fails; the first failure is returned and
    /// the batch is not retried.
    pub fn flush(&self) -> Result<usize> {
        let batch = std::mem::take(&mut *lock(&self.inner.buffer));
        if batch.is_empty() {
            return Ok(0);
        }

        let mut first_error = None;
        for sink in self.sinks() {
            let outcome = catch_unwind(AssertUnwindSafe(|| sink.write_batch(&batch)));
            let failure = match outcome {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => e,
                Err(_) => TelemetryError::sink(format!("sink {} panicked", sink.name())),
            };
            warn!(sink = sink.name(), error = %failure, dropped = batch.len(), "log sink failed");
            first_error.get_or_insert(failure);
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(batch.len()),
        }
    }

    /// Flush on the configured interval on the current tokio runtime.
    ///
    /// A failed flush is logged and the task keeps running. Calling this
    /// while the task is running does nothing.
    pub fn start_periodic_flush(&self) -> Result<()> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| TelemetryError::NoRuntime {
            task: "log flush",
        })?;
        let mut slot = lock(&self.inner.flusher);
        if slot.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return Ok(());
        }

        let period = self.inner.flush_interval;
        let weak: Weak<LoggerInner> = Arc::downgrade(&self.inner);
        *slot = Some(runtime.spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                if let Err(e) = (StructuredLogger { inner }).flush() {
                    error!("periodic log flush failed: {}", e);
                }
            }
        }));
        debug!(period_ms = period.as_millis() as u64, "periodic log flush started");
        Ok(())
    }

    pub fn stop_periodic_flush(&self) {
        if let Some(handle) = lock(&self.inner.flusher).take() {
            handle.abort();
            debug!("periodic log flush stopped");
        }
    }

    pub fn is_flushing_periodically(&self) -> bool {
        lock(&self.inner.flusher)
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Stop the flush task, flush what is buffered and shut down every sink.
    ///
    /// Every step runs even when an earlier one fails; the first failure is
    /// returned.
    pub fn shutdown(&self) -> Result<()> {
        self.stop_periodic_flush();
        let mut result = self.flush().map(|_| ());
        for sink in self.sinks() {
            if let Err(e) = sink.shutdown() {
                warn!(sink = sink.name(), error = %e, "log sink shutdown failed");
                if result.is_ok() {
                    result = Err(e);
                }
            }
        }
        result
    }
}
