//! In-process metric registry
//!
//! Series are keyed by metric name plus a canonical (sorted) label set, so
//! the order labels are passed in never creates a second series. Every call
//! is validated before the registry is touched.

use super::prometheus;
use super::timer::Timer;
use super::validation::{normalize_labels, validate_metric_name};
use crate::error::{Result, TelemetryError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Canonical label set: label name to value, sorted by name
pub type Labels = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    /// Monotonically increasing total
    Counter,
    /// Last written value
    Gauge,
    /// Count, sum, min and max of observations
    Histogram,
}

impl MetricKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Counter => "counter",
            Self::Gauge => "gauge",
            Self::Histogram => "histogram",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Running aggregate of histogram observations
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistogramSummary {
    pub count: u64,
    pub sum: f64,
    pub min: f64,
    pub max: f64,
}

impl HistogramSummary {
    fn first(value: f64) -> Self {
        Self {
            count: 1,
            sum: value,
            min: value,
            max: value,
        }
    }

    fn observe(&mut self, value: f64) {
        self.count += 1;
        self.sum += value;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    pub fn mean(&self) -> f64 {
        self.sum / self.count as f64
    }
}

/// Value of one series
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SeriesValue {
    /// Counter total or gauge value
    Scalar(f64),
    Histogram(HistogramSummary),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesSnapshot {
    pub labels: Labels,
    pub value: SeriesValue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FamilySnapshot {
    pub name: String,
    pub kind: MetricKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help: Option<String>,
    pub series: Vec<SeriesSnapshot>,
}

/// Point-in-time copy of every metric, ordered by name then labels
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub families: Vec<FamilySnapshot>,
}

impl MetricsSnapshot {
    pub fn family(&self, name: &str) -> Option<&FamilySnapshot> {
        self.families.iter().find(|family| family.name == name)
    }
}

struct Family {
    kind: MetricKind,
    series: BTreeMap<Labels, SeriesValue>,
}

#[derive(Default)]
struct Registry {
    families: BTreeMap<String, Family>,
    help: BTreeMap<String, String>,
}

impl Registry {
    /// The family for `name`, created on first use and bound to `kind`
    fn family_mut(&mut self, name: &str, kind: MetricKind) -> Result<&mut Family> {
        if let Some(existing) = self.families.get(name).map(|family| family.kind) {
            if existing != kind {
                return Err(TelemetryError::MetricKindConflict {
                    name: name.to_string(),
                    existing,
                    requested: kind,
                });
            }
        }
        Ok(self
            .families
            .entry(name.to_string())
            .or_insert_with(|| Family {
                kind,
                series: BTreeMap::new(),
            }))
    }

    fn series(&self, name: &str, kind: MetricKind, labels: &Labels) -> Option<SeriesValue> {
        let family = self.families.get(name).filter(|family| family.kind == kind)?;
        family.series.get(labels).copied()
    }
}

fn check_finite(name: &str, value: f64) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(TelemetryError::NonFiniteValue {
            name: name.to_string(),
            value,
        })
    }
}

/// Thread-safe metric registry. Cheap to clone; clones share series.
#[derive(Clone, Default)]
pub struct MetricsCollector {
    registry: Arc<Mutex<Registry>>,
}

impl fmt::Debug for MetricsCollector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricsCollector")
            .field("families", &self.lock().families.len())
            .finish()
    }
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add `value` to a counter series
    pub fn increment_counter(&self, name: &str, value: f64, labels: &[(&str, &str)]) -> Result<()> {
        validate_metric_name(name)?;
        let labels = normalize_labels(labels)?;
        check_finite(name, value)?;
        if value < 0.0 {
            return Err(TelemetryError::NegativeCounterIncrement {
                name: name.to_string(),
                value,
            });
        }

        let mut registry = self.lock();
        let family = registry.family_mut(name, MetricKind::Counter)?;
        let series = family.series.entry(labels).or_insert(SeriesValue::Scalar(0.0));
        if let SeriesValue::Scalar(total) = series {
            *total += value;
        }
        Ok(())
    }

    /// Add one to a counter series
    pub fn increment(&self, name: &str, labels: &[(&str, &str)]) -> Result<()> {
        self.increment_counter(name, 1.0, labels)
    }

    /// Overwrite a gauge series
    pub fn set_gauge(&self, name: &str, value: f64, labels: &[(&str, &str)]) -> Result<()> {
        validate_metric_name(name)?;
        let labels = normalize_labels(labels)?;
        check_finite(name, value)?;

        let mut registry = self.lock();
        let family = registry.family_mut(name, MetricKind::Gauge)?;
        family.series.insert(labels, SeriesValue::Scalar(value));
        Ok(())
    }

    /// Record one observation into a histogram series
    pub fn record_histogram(&self, name: &str, value: f64, labels: &[(&str, &str)]) -> Result<()> {
        validate_metric_name(name)?;
        let labels = normalize_labels(labels)?;
        check_finite(name, value)?;

        let mut registry = self.lock();
        let family = registry.family_mut(name, MetricKind::Histogram)?;
        match family.series.get_mut(&labels) {
            Some(SeriesValue::Histogram(summary)) => summary.observe(value),
            _ => {
                family
                    .series
                    .insert(labels, SeriesValue::Histogram(HistogramSummary::first(value)));
            }
        }
        Ok(())
    }

    /// Set the HELP text used in Prometheus output
    pub fn describe(&self, name: &str, help: impl Into<String>) -> Result<()> {
        validate_metric_name(name)?;
        self.lock().help.insert(name.to_string(), help.into());
        Ok(())
    }

    pub fn counter(&self, name: &str, labels: &[(&str, &str)]) -> Option<f64> {
        match self.lookup(name, MetricKind::Counter, labels)? {
            SeriesValue::Scalar(value) => Some(value),
            SeriesValue::Histogram(_) => None,
        }
    }

    pub fn gauge(&self, name: &str, labels: &[(&str, &str)]) -> Option<f64> {
        match self.lookup(name, MetricKind::Gauge, labels)? {
            SeriesValue::Scalar(value) => Some(value),
            SeriesValue::Histogram(_) => None,
        }
    }

    pub fn histogram(&self, name: &str, labels: &[(&str, &str)]) -> Option<HistogramSummary> {
        match self.lookup(name, MetricKind::Histogram, labels)? {
            SeriesValue::Histogram(summary) => Some(summary),
            SeriesValue::Scalar(_) => None,
        }
    }

    fn lookup(&self, name: &str, kind: MetricKind, labels: &[(&str, &str)]) -> Option<SeriesValue> {
        let labels = normalize_labels(labels).ok()?;
        self.lock().series(name, kind, &labels)
    }

    /// Number of series across all metrics
    pub fn series_count(&self) -> usize {
        self.lock()
            .families
            .values()
            .map(|family| family.series.len())
            .sum()
    }

    /// Drop every series; HELP texts are kept
    pub fn reset(&self) {
        self.lock().families.clear();
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let registry = self.lock();
        let families = registry
            .families
            .iter()
            .map(|(name, family)| FamilySnapshot {
                name: name.clone(),
                kind: family.kind,
                help: registry.help.get(name).cloned(),
                series: family
                    .series
                    .iter()
                    .map(|(labels, value)| SeriesSnapshot {
                        labels: labels.clone(),
                        value: *value,
                    })
                    .collect(),
            })
            .collect();
        MetricsSnapshot { families }
    }

    /// Start a timer that records elapsed milliseconds into a histogram
    pub fn start_timer(&self, name: &str, labels: &[(&str, &str)]) -> Result<Timer> {
        validate_metric_name(name)?;
        normalize_labels(labels)?;
        Ok(Timer::new(name, labels, self))
    }

    /// Render every metric in the Prometheus text exposition format
    pub fn to_prometheus_text(&self) -> String {
        prometheus::render(&self.snapshot())
    }
}
