//! Prometheus text exposition rendering

use super::collector::{FamilySnapshot, Labels, MetricKind, MetricsSnapshot, SeriesValue};
use std::fmt::Write;

fn type_name(kind: MetricKind) -> &'static str {
    match kind {
        MetricKind::Counter => "counter",
        MetricKind::Gauge => "gauge",
        // count and sum only, no buckets
        MetricKind::Histogram => "summary",
    }
}

fn escape_help(help: &str) -> String {
    help.replace('\\', "\\\\").replace('\n', "\\n")
}

fn escape_label_value(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

fn label_block(labels: &Labels) -> String {
    if labels.is_empty() {
        return String::new();
    }
    let pairs: Vec<String> = labels
        .iter()
        .map(|(name, value)| format!("{name}=\"{}\"", escape_label_value(value)))
        .collect();
    format!("{{{}}}", pairs.join(","))
}

fn render_family(out: &mut String, family: &FamilySnapshot) {
    let name = &family.name;
    let help = family.help.as_deref().unwrap_or(name);
    let _ = writeln!(out, "# HELP {name} {}", escape_help(help));
    let _ = writeln!(out, "# TYPE {name} {}", type_name(family.kind));
    for series in &family.series {
        let labels = label_block(&series.labels);
        match series.value {
            SeriesValue::Scalar(value) => {
                let _ = writeln!(out, "{name}{labels} {value}");
            }
            SeriesValue::Histogram(summary) => {
                let _ = writeln!(out, "{name}_sum{labels} {}", summary.sum);
                let _ = writeln!(out, "{name}_count{labels} {}", summary.count);
            }
        }
    }
}

pub(crate) fn render(snapshot: &MetricsSnapshot) -> String {
    let mut out = String::new();
    for family in &snapshot.families {
        render_family(&mut out, family);
    }
    out
}

#[cfg(test)]
mod tests {
    use crate::metrics::MetricsCollector;

    #[test]
    fn test_counter_output() {
        let metrics = MetricsCollector::new();
        metrics.describe("reqs_total", "Requests served").unwrap();
        metrics.increment_counter("reqs_total", 3.0, &[("method", "GET")]).unwrap();
        metrics.increment_counter("reqs_total", 1.0, &[("method", "POST")]).unwrap();

        let text = metrics.to_prometheus_text();
        assert_eq!(
            text,
            "# HELP reqs_total Requests served\n\
             # TYPE reqs_total counter\n\
             reqs_total{method=\"GET\"} 3\n\
             reqs_total{method=\"POST\"} 1\n"
        );
    }

    #[test]
    fn test_header_once_per_name() {
        let metrics = MetricsCollector::new();
        for route in ["/a", "/b", "/c"] {
            metrics.set_gauge("inflight", 1.0, &[("route", route)]).unwrap();
        }
        let text = metrics.to_prometheus_text();
        assert_eq!(text.matches("# TYPE inflight gauge").count(), 1);
        assert_eq!(text.matches("# HELP inflight inflight").count(), 1);
    }

    #[test]
    fn test_histogram_as_summary() {
        let metrics = MetricsCollector::new();
        metrics.record_histogram("latency_ms", 2.5, &[]).unwrap();
        metrics.record_histogram("latency_ms", 1.5, &[]).unwrap();
        let text = metrics.to_prometheus_text();
        assert!(text.contains("# TYPE latency_ms summary\n"));
        assert!(text.contains("latency_ms_sum 4\n"));
        assert!(text.contains("latency_ms_count 2\n"));
    }

    #[test]
    fn test_label_values_escaped() {
        let metrics = MetricsCollector::new();
        metrics
            .increment("errors_total", &[("message", "say \"hi\"\\\nbye")])
            .unwrap();
        let text = metrics.to_prometheus_text();
        assert!(text.contains(r#"errors_total{message="say \"hi\"\\\nbye"} 1"#));
    }

    #[test]
    fn test_empty_registry_renders_nothing() {
        assert_eq!(MetricsCollector::new().to_prometheus_text(), "");
    }
}
