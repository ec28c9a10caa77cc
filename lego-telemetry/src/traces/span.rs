//! Span data model

use super::ids::{SpanContext, SpanId, TraceId};
use crate::error::Result;
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

/// Attribute key reserved for the service name
pub const SERVICE_NAME_ATTRIBUTE: &str = "service.name";
/// Attribute set on spans force-ended by the orphan sweep
pub const TIMEOUT_ATTRIBUTE: &str = "span.timeout";

/// Span attributes, ordered by key
pub type Attributes = BTreeMap<String, Value>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StatusCode {
    #[default]
    Unset,
    Ok,
    Error,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpanStatus {
    pub code: StatusCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl SpanStatus {
    pub fn ok() -> Self {
        Self {
            code: StatusCode::Ok,
            message: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            code: StatusCode::Error,
            message: Some(message.into()),
        }
    }
}

/// Timestamped annotation; events are append-only
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpanEvent {
    pub name: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: Attributes,
}

/// Reference to a span in this or another trace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpanLink {
    pub trace_id: TraceId,
    pub span_id: SpanId,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: Attributes,
}

impl SpanLink {
    pub fn new(context: SpanContext) -> Self {
        Self {
            trace_id: context.trace_id,
            span_id: context.span_id,
            attributes: Attributes::new(),
        }
    }
}

/// One unit of work.
///
/// Owned by the tracer while active; exporters and readers see clones of
/// ended spans.
#[derive(Debug, Clone, Serialize)]
pub struct Span {
    pub name: String,
    pub trace_id: TraceId,
    pub span_id: SpanId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_span_id: Option<SpanId>,
    pub start_time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    /// `end_time - start_time`, set when the span ends
    #[serde(rename = "duration_ms", serialize_with = "duration_as_millis")]
    pub duration: Option<TimeDelta>,
    pub status: SpanStatus,
    pub attributes: Attributes,
    pub events: Vec<SpanEvent>,
    pub links: Vec<SpanLink>,
    /// Monotonic start, used for orphan detection
    #[serde(skip)]
    started: Instant,
}

fn duration_as_millis<S: Serializer>(
    duration: &Option<TimeDelta>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    match duration.and_then(|d| d.num_microseconds()) {
        Some(micros) => serializer.serialize_f64(micros as f64 / 1000.0),
        None => serializer.serialize_none(),
    }
}

impl Span {
    pub(crate) fn start(
        name: String,
        trace_id: TraceId,
        parent_span_id: Option<SpanId>,
        mut attributes: Attributes,
        links: Vec<SpanLink>,
        service_name: &str,
    ) -> Self {
        attributes.insert(
            SERVICE_NAME_ATTRIBUTE.to_string(),
            Value::String(service_name.to_string()),
        );
        Self {
            name,
            trace_id,
            span_id: SpanId::generate(),
            parent_span_id,
            start_time: Utc::now(),
            end_time: None,
            duration: None,
            status: SpanStatus::default(),
            attributes,
            events: Vec::new(),
            links,
            started: Instant::now(),
        }
    }

    /// Record the end time. The wall clock may step backwards, so the end is
    /// never earlier than the start.
    pub(crate) fn finish(&mut self) {
        let end = Utc::now().max(self.start_time);
        self.end_time = Some(end);
        self.duration = Some(end - self.start_time);
    }

    pub fn context(&self) -> SpanContext {
        SpanContext::new(self.trace_id, self.span_id)
    }

    pub fn is_ended(&self) -> bool {
        self.end_time.is_some()
    }

    /// Time since the span started, on the monotonic clock
    pub fn age(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    pub(crate) fn push_event(&mut self, name: String, attributes: Attributes) {
        self.events.push(SpanEvent {
            name,
            timestamp: Utc::now(),
            attributes,
        });
    }

    /// Serialize to a JSON object
    pub fn to_json(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }
}
