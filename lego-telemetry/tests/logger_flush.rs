//! Log buffering, sink failures and shutdown flushing

use lego_telemetry::{
    InMemoryLogSink, JsonLinesLogSink, LogEntry, LogLevel, LogSink, Result, StructuredLogger,
    Telemetry, TelemetryConfig, TelemetryError,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Fails the first `failures` batches, then accepts
struct FlakySink {
    failures: usize,
    attempts: AtomicUsize,
    accepted: InMemoryLogSink,
}

impl FlakySink {
    fn new(failures: usize) -> Self {
        Self {
            failures,
            attempts: AtomicUsize::new(0),
            accepted: InMemoryLogSink::new(),
        }
    }
}

impl LogSink for FlakySink {
    fn write_batch(&self, entries: &[LogEntry]) -> Result<()> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        if attempt < self.failures {
            return Err(TelemetryError::sink("disk full"));
        }
        self.accepted.write_batch(entries)
    }
}

#[test_log::test]
fn test_failing_sink_does_not_starve_others() {
    let logger = StructuredLogger::new(&TelemetryConfig::new("svc")).unwrap();
    let flaky = Arc::new(FlakySink::new(1));
    let memory = Arc::new(InMemoryLogSink::new());
    logger.add_shared_sink(flaky.clone());
    logger.add_shared_sink(memory.clone());

    logger.info("first", Value::Null);
    assert!(logger.flush().is_err());
    assert_eq!(memory.len(), 1);
    assert_eq!(logger.pending(), 0);

    logger.info("second", Value::Null);
    assert_eq!(logger.flush().unwrap(), 1);
    assert_eq!(flaky.accepted.len(), 1);
    assert_eq!(memory.len(), 2);
}

#[test_log::test(tokio::test)]
async fn test_periodic_flush_survives_failures() {
    let config = TelemetryConfig::new("svc").with_log_flush_interval(Duration::from_millis(20));
    let telemetry = Telemetry::new(config).unwrap();
    let flaky = Arc::new(FlakySink::new(2));
    telemetry.logger().add_shared_sink(flaky.clone());

    telemetry.logger().info("lost", Value::Null);
    tokio::time::sleep(Duration::from_millis(50)).await;
    telemetry.logger().info("lost too", Value::Null);
    tokio::time::sleep(Duration::from_millis(50)).await;
    telemetry.logger().warn("kept", json!({"attempt": 3}));

    for _ in 0..20 {
        if !flaky.accepted.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(telemetry.logger().is_flushing_periodically());
    let kept = flaky.accepted.entries();
    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].message, "kept");
    assert_eq!(kept[0].level, LogLevel::Warn);
    telemetry.shutdown().unwrap();
}

#[test_log::test(tokio::test)]
async fn test_shutdown_flushes_buffer() {
    let config = TelemetryConfig::new("svc").with_log_flush_interval(Duration::from_secs(3600));
    let telemetry = Telemetry::new(config).unwrap();
    let sink = Arc::new(JsonLinesLogSink::new(Vec::new()));
    telemetry.logger().add_shared_sink(sink.clone());

    let span = telemetry.tracer().start_root_span("request");
    telemetry
        .logger()
        .log_in_span(LogLevel::Info, "handled", json!({"route": "/orders"}), &span.context());
    span.end();
    assert_eq!(telemetry.logger().pending(), 1);

    telemetry.shutdown().unwrap();
    assert_eq!(telemetry.logger().pending(), 0);

    let output = sink.with_writer(|buf| String::from_utf8(buf.clone()).unwrap());
    let line: Value = serde_json::from_str(output.trim()).unwrap();
    assert_eq!(line["message"], "handled");
    assert_eq!(line["level"], "info");
    assert_eq!(line["service"], "svc");
    assert_eq!(line["context"]["route"], "/orders");
    assert_eq!(line["trace_id"], span.trace_id().to_string());
    assert_eq!(line["span_id"], span.span_id().to_string());

    // second shutdown is a no-op
    telemetry.logger().info("after", Value::Null);
    telemetry.shutdown().unwrap();
    assert_eq!(telemetry.logger().pending(), 1);
}
