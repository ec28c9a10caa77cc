//! The tracer: owner of active and completed spans
//!
//! A span lives in the active map from `start_span` until `end_span`, then
//! moves to the bounded completed buffer and is pushed to every exporter.
//! Exporters run after the move, so an exporter that calls back into the
//! tracer sees the span as completed.

use super::exporter::SpanExporter;
use super::ids::{SpanContext, SpanId, TraceId};
use super::span::{Attributes, Span, SpanLink, SpanStatus, StatusCode, TIMEOUT_ATTRIBUTE};
use crate::config::TelemetryConfig;
use crate::error::{Result, TelemetryError};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::fmt::Display;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, Weak};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, warn};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Optional inputs to [`Tracer::start_span`]
#[derive(Debug, Clone, Default)]
pub struct SpanOptions {
    /// Join an existing trace instead of starting a new one
    pub trace_id: Option<TraceId>,
    pub parent_span_id: Option<SpanId>,
    pub attributes: Attributes,
    pub links: Vec<SpanLink>,
}

impl SpanOptions {
    /// Continue the trace of `parent` as its child
    pub fn child_of(parent: &SpanContext) -> Self {
        Self {
            trace_id: Some(parent.trace_id),
            parent_span_id: Some(parent.span_id),
            ..Self::default()
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn with_link(mut self, link: SpanLink) -> Self {
        self.links.push(link);
        self
    }
}

struct TracerInner {
    config: Arc<TelemetryConfig>,
    active: Mutex<HashMap<SpanId, Span>>,
    completed: Mutex<VecDeque<Span>>,
    exporters: RwLock<Vec<Arc<dyn SpanExporter>>>,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for TracerInner {
    fn drop(&mut self) {
        if let Some(handle) = lock(&self.sweeper).take() {
            handle.abort();
        }
    }
}

/// Creates spans and tracks them until they end.
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct Tracer {
    inner: Arc<TracerInner>,
}

impl std::fmt::Debug for Tracer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tracer")
            .field("service", &self.inner.config.service_name)
            .field("active", &self.active_span_count())
            .finish()
    }
}

impl Tracer {
    pub fn new(config: Arc<TelemetryConfig>) -> Self {
        Self {
            inner: Arc::new(TracerInner {
                config,
                active: Mutex::new(HashMap::new()),
                completed: Mutex::new(VecDeque::new()),
                exporters: RwLock::new(Vec::new()),
                sweeper: Mutex::new(None),
            }),
        }
    }

    pub fn config(&self) -> &TelemetryConfig {
        &self.inner.config
    }

    // =========================================================================
    // Exporters
    // =========================================================================

    /// Register an exporter; exporters run in registration order
    pub fn add_exporter<E>(&self, exporter: E)
    where
        E: SpanExporter + 'static,
    {
        self.add_shared_exporter(Arc::new(exporter));
    }

    pub fn add_shared_exporter(&self, exporter: Arc<dyn SpanExporter>) {
        self.inner
            .exporters
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(exporter);
    }

    fn exporters(&self) -> Vec<Arc<dyn SpanExporter>> {
        self.inner
            .exporters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Hand a completed span to each exporter, isolating failures
    fn export(&self, span: &Span) {
        for exporter in self.exporters() {
            match catch_unwind(AssertUnwindSafe(|| exporter.export(span))) {
                Ok(Ok(())) => {}
                Ok(Err(err)) => warn!(
                    exporter = exporter.name(),
                    span_id = %span.span_id,
                    error = %err,
                    "span exporter failed"
                ),
                Err(_) => error!(
                    exporter = exporter.name(),
                    span_id = %span.span_id,
                    "span exporter panicked"
                ),
            }
        }
    }

    /// Shut down every exporter, returning the first failure
    pub fn shutdown_exporters(&self) -> Result<()> {
        let mut first_error = None;
        for exporter in self.exporters() {
            if let Err(err) = exporter.shutdown() {
                warn!(exporter = exporter.name(), error = %err, "exporter shutdown failed");
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    // =========================================================================
    // Span lifecycle
    // =========================================================================

    /// Start a span and register it as active
    pub fn start_span(&self, name: impl Into<String>, options: SpanOptions) -> SpanHandle {
        let span = Span::start(
            name.into(),
            options.trace_id.unwrap_or_else(TraceId::generate),
            options.parent_span_id,
            options.attributes,
            options.links,
            &self.inner.config.service_name,
        );
        let context = span.context();
        debug!(name = %span.name, trace_id = %context.trace_id, span_id = %context.span_id, "span started");
        lock(&self.inner.active).insert(context.span_id, span);
        SpanHandle {
            tracer: self.clone(),
            context,
        }
    }

    /// Start a span in a new trace
    pub fn start_root_span(&self, name: impl Into<String>) -> SpanHandle {
        self.start_span(name, SpanOptions::default())
    }

    /// Start a span in the parent's trace with the parent as its parent
    pub fn start_child_span(&self, parent: &SpanContext, name: impl Into<String>) -> SpanHandle {
        self.start_span(name, SpanOptions::child_of(parent))
    }

    /// End an active span.
    ///
    /// Returns the completed span, or `None` when the span is not active
    /// (already ended or never started). A span is therefore completed and
    /// exported at most once.
    pub fn end_span(&self, span_id: SpanId) -> Option<Span> {
        let span = lock(&self.inner.active).remove(&span_id)?;
        Some(self.complete(span))
    }

    /// Finish a span already removed from the active map, then buffer and
    /// export it
    fn complete(&self, mut span: Span) -> Span {
        span.finish();

        {
            let max = self.inner.config.max_completed_spans;
            let mut completed = lock(&self.inner.completed);
            completed.push_back(span.clone());
            while completed.len() > max {
                completed.pop_front();
            }
        }

        debug!(name = %span.name, span_id = %span.span_id, status = ?span.status.code, "span ended");
        self.export(&span);
        span
    }

    /// Mutate an active span; `false` if it is no longer active
    fn update_active(&self, span_id: SpanId, update: impl FnOnce(&mut Span)) -> bool {
        match lock(&self.inner.active).get_mut(&span_id) {
            Some(span) => {
                update(span);
                true
            }
            None => false,
        }
    }

    /// Run `work` inside a new span, setting OK or ERROR from its result
    pub async fn in_span<F, Fut, R, E>(&self, name: impl Into<String>, work: F) -> std::result::Result<R, E>
    where
        F: FnOnce(SpanHandle) -> Fut,
        Fut: Future<Output = std::result::Result<R, E>>,
        E: Display,
    {
        let span = self.start_root_span(name);
        let result = work(span.clone()).await;
        match &result {
            Ok(_) => span.set_status(SpanStatus::ok()),
            Err(err) => span.record_error(err),
        };
        span.end();
        result
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    pub fn active_span_count(&self) -> usize {
        lock(&self.inner.active).len()
    }

    /// Clones of the active spans, oldest first
    pub fn active_spans(&self) -> Vec<Span> {
        let mut spans: Vec<Span> = lock(&self.inner.active).values().cloned().collect();
        spans.sort_by_key(|span| span.start_time);
        spans
    }

    /// Clones of the completed spans, in end order
    pub fn completed_spans(&self) -> Vec<Span> {
        lock(&self.inner.completed).iter().cloned().collect()
    }

    pub fn find_completed(&self, span_id: SpanId) -> Option<Span> {
        lock(&self.inner.completed)
            .iter()
            .find(|span| span.span_id == span_id)
            .cloned()
    }

    pub fn clear_completed(&self) {
        lock(&self.inner.completed).clear();
    }

    // =========================================================================
    // Orphan sweep
    // =========================================================================

    /// Force-end every active span older than the configured timeout.
    ///
    /// Expired spans leave the active map under a single lock, so a caller
    /// racing to end one either ends it first or gets `None`. Swept spans
    /// get ERROR status and `span.timeout = true`, then finish like any
    /// other span. Returns how many were swept.
    pub fn sweep_orphans(&self) -> usize {
        let timeout = self.inner.config.span_timeout();
        let message = format!("span exceeded timeout of {}ms", timeout.as_millis());
        let expired: Vec<Span> = {
            let mut active = lock(&self.inner.active);
            let ids: Vec<SpanId> = active
                .iter()
                .filter(|(_, span)| span.age() >= timeout)
                .map(|(span_id, _)| *span_id)
                .collect();
            ids.into_iter()
                .filter_map(|span_id| active.remove(&span_id))
                .map(|mut span| {
                    span.status = SpanStatus::error(message.clone());
                    span.attributes
                        .insert(TIMEOUT_ATTRIBUTE.to_string(), Value::Bool(true));
                    span
                })
                .collect()
        };

        let swept = expired.len();
        for span in expired {
            let span = self.complete(span);
            warn!(name = %span.name, span_id = %span.span_id, "force-ended orphaned span");
        }
        swept
    }

    /// Run `sweep_orphans` periodically on the current tokio runtime.
    ///
    /// The period is half the span timeout, capped at one minute. Calling
    /// this while a sweep task is running does nothing.
    pub fn start_orphan_sweep(&self) -> Result<()> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| TelemetryError::NoRuntime {
            task: "orphan sweep",
        })?;
        let mut slot = lock(&self.inner.sweeper);
        if slot.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return Ok(());
        }

        let period = self.inner.config.sweep_interval();
        let weak: Weak<TracerInner> = Arc::downgrade(&self.inner);
        *slot = Some(runtime.spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // the first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                Tracer { inner }.sweep_orphans();
            }
        }));
        debug!(period_ms = period.as_millis() as u64, "orphan sweep started");
        Ok(())
    }

    /// Stop the periodic sweep; safe to call when it is not running
    pub fn stop_orphan_sweep(&self) {
        if let Some(handle) = lock(&self.inner.sweeper).take() {
            handle.abort();
            debug!("orphan sweep stopped");
        }
    }

    pub fn is_sweeping(&self) -> bool {
        lock(&self.inner.sweeper)
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

/// Caller's handle on an active span.
///
/// Every method is a no-op once the span has ended.
#[derive(Clone)]
pub struct SpanHandle {
    tracer: Tracer,
    context: SpanContext,
}

impl std::fmt::Debug for SpanHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpanHandle")
            .field("context", &self.context)
            .finish()
    }
}

impl SpanHandle {
    pub fn context(&self) -> SpanContext {
        self.context
    }

    pub fn span_id(&self) -> SpanId {
        self.context.span_id
    }

    pub fn trace_id(&self) -> TraceId {
        self.context.trace_id
    }

    /// Whether the span is still active
    pub fn is_recording(&self) -> bool {
        lock(&self.tracer.inner.active).contains_key(&self.context.span_id)
    }

    pub fn set_attribute(&self, key: impl Into<String>, value: impl Into<Value>) -> bool {
        let (key, value) = (key.into(), value.into());
        self.tracer.update_active(self.context.span_id, |span| {
            span.attributes.insert(key, value);
        })
    }

    pub fn add_event(&self, name: impl Into<String>) -> bool {
        self.add_event_with_attributes(name, Attributes::new())
    }

    pub fn add_event_with_attributes(&self, name: impl Into<String>, attributes: Attributes) -> bool {
        let name = name.into();
        self.tracer.update_active(self.context.span_id, |span| {
            span.push_event(name, attributes);
        })
    }

    /// Set the status. `Unset` never overwrites a status already set.
    pub fn set_status(&self, status: SpanStatus) -> bool {
        self.tracer.update_active(self.context.span_id, |span| {
            if status.code != StatusCode::Unset {
                span.status = status;
            }
        })
    }

    /// Mark the span failed and record an `exception` event
    pub fn record_error(&self, error: &dyn Display) -> bool {
        let message = error.to_string();
        self.tracer.update_active(self.context.span_id, |span| {
            let mut attributes = Attributes::new();
            attributes.insert("exception.message".to_string(), Value::String(message.clone()));
            span.push_event("exception".to_string(), attributes);
            span.status = SpanStatus::error(message);
        })
    }

    /// Start a child span in the same trace
    pub fn child(&self, name: impl Into<String>) -> SpanHandle {
        self.tracer.start_child_span(&self.context, name)
    }

    /// End the span; `None` if it already ended
    pub fn end(&self) -> Option<Span> {
        self.tracer.end_span(self.context.span_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traces::InMemorySpanExporter;
    use std::time::Duration;

    fn tracer() -> Tracer {
        Tracer::new(Arc::new(TelemetryConfig::new("orders")))
    }

    #[test]
    fn test_start_and_end() {
        let tracer = tracer();
        let span = tracer.start_root_span("op");
        assert_eq!(tracer.active_span_count(), 1);
        assert!(span.add_event("step1"));

        let ended = span.end().unwrap();
        assert_eq!(ended.events.len(), 1);
        assert_eq!(ended.status.code, StatusCode::Unset);
        assert!(ended.duration.unwrap() >= chrono::TimeDelta::zero());
        assert_eq!(tracer.active_span_count(), 0);
        assert_eq!(tracer.completed_spans().len(), 1);
    }

    #[test]
    fn test_end_is_idempotent() {
        let tracer = tracer();
        let exporter = Arc::new(InMemorySpanExporter::new(10));
        tracer.add_shared_exporter(exporter.clone());

        let span = tracer.start_root_span("once");
        assert!(span.end().is_some());
        assert!(span.end().is_none());
        assert!(tracer.end_span(span.span_id()).is_none());

        assert_eq!(tracer.completed_spans().len(), 1);
        assert_eq!(exporter.len(), 1);
    }

    #[test]
    fn test_handle_is_inert_after_end() {
        let tracer = tracer();
        let span = tracer.start_root_span("op");
        span.end();

        assert!(!span.is_recording());
        assert!(!span.set_attribute("late", true));
        assert!(!span.set_status(SpanStatus::ok()));
        let stored = tracer.find_completed(span.span_id()).unwrap();
        assert!(stored.attribute("late").is_none());
        assert_eq!(stored.status.code, StatusCode::Unset);
    }

    #[test]
    fn test_child_shares_trace() {
        let tracer = tracer();
        let parent = tracer.start_root_span("request");
        let child = parent.child("query");

        let child_span = child.end().unwrap();
        assert_eq!(child_span.trace_id, parent.trace_id());
        assert_eq!(child_span.parent_span_id, Some(parent.span_id()));
        assert_ne!(child_span.span_id, parent.span_id());
    }

    #[test]
    fn test_explicit_trace_id_and_links() {
        let tracer = tracer();
        let upstream = SpanContext::from_traceparent(
            "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01",
        )
        .unwrap();
        let span = tracer.start_span(
            "consume",
            SpanOptions {
                trace_id: Some(upstream.trace_id),
                ..SpanOptions::default()
            }
            .with_link(SpanLink::new(upstream))
            .with_attribute("queue", "orders"),
        );

        let ended = span.end().unwrap();
        assert_eq!(ended.trace_id, upstream.trace_id);
        assert_eq!(ended.parent_span_id, None);
        assert_eq!(ended.links.len(), 1);
        assert_eq!(ended.attribute("queue"), Some(&Value::from("orders")));
        assert_eq!(ended.attribute("service.name"), Some(&Value::from("orders")));
    }

    #[test]
    fn test_record_error_sets_status_and_event() {
        let tracer = tracer();
        let span = tracer.start_root_span("op");
        span.record_error(&"disk full");

        let ended = span.end().unwrap();
        assert_eq!(ended.status, SpanStatus::error("disk full"));
        assert_eq!(ended.events[0].name, "exception");
    }

    #[test]
    fn test_unset_does_not_clear_status() {
        let tracer = tracer();
        let span = tracer.start_root_span("op");
        span.set_status(SpanStatus::ok());
        span.set_status(SpanStatus::default());
        assert_eq!(span.end().unwrap().status.code, StatusCode::Ok);
    }

    #[test]
    fn test_sweep_without_timeout_leaves_spans() {
        let tracer = tracer();
        let _span = tracer.start_root_span("fresh");
        assert_eq!(tracer.sweep_orphans(), 0);
        assert_eq!(tracer.active_span_count(), 1);
    }

    #[test]
    fn test_sweep_and_end_race_settles_once() {
        let config = TelemetryConfig::new("orders").with_span_timeout(Duration::from_millis(1));
        let tracer = Tracer::new(Arc::new(config));
        let exporter = Arc::new(InMemorySpanExporter::new(100));
        tracer.add_shared_exporter(exporter.clone());

        let spans: Vec<SpanHandle> = (0..32).map(|n| tracer.start_root_span(format!("op{n}"))).collect();
        std::thread::sleep(Duration::from_millis(5));

        let (swept, ended) = std::thread::scope(|scope| {
            let sweeper = scope.spawn(|| tracer.sweep_orphans());
            let ender = scope.spawn(|| spans.iter().filter_map(|span| span.end()).collect::<Vec<_>>());
            (sweeper.join().unwrap(), ender.join().unwrap())
        });

        assert_eq!(swept + ended.len(), 32);
        assert_eq!(tracer.active_span_count(), 0);
        assert_eq!(exporter.len(), 32);
        assert!(ended
            .iter()
            .all(|span| !span.attributes.contains_key(TIMEOUT_ATTRIBUTE)));
        let timed_out = tracer
            .completed_spans()
            .iter()
            .filter(|span| span.attributes.get(TIMEOUT_ATTRIBUTE) == Some(&Value::Bool(true)))
            .count();
        assert_eq!(timed_out, swept);
    }

    #[test]
    fn test_start_sweep_needs_runtime() {
        let tracer = tracer();
        assert!(matches!(
            tracer.start_orphan_sweep(),
            Err(TelemetryError::NoRuntime { .. })
        ));
        assert!(!tracer.is_sweeping());
    }

    #[tokio::test]
    async fn test_in_span_marks_status() {
        let tracer = tracer();
        let ok: std::result::Result<u32, String> = tracer.in_span("good", |_| async { Ok(7) }).await;
        assert_eq!(ok, Ok(7));
        let err: std::result::Result<u32, String> = tracer
            .in_span("bad", |_| async { Err("nope".to_string()) })
            .await;
        assert!(err.is_err());

        let completed = tracer.completed_spans();
        assert_eq!(completed[0].status.code, StatusCode::Ok);
        assert_eq!(completed[1].status, SpanStatus::error("nope"));
    }
}
