//! Counters, gauges and histograms with Prometheus text export

mod collector;
mod prometheus;
mod timer;
mod validation;

pub use collector::{
    FamilySnapshot, HistogramSummary, Labels, MetricKind, MetricsCollector, MetricsSnapshot,
    SeriesSnapshot, SeriesValue,
};
pub use timer::Timer;
