use super::collector::MetricsCollector;
use crate::error::Result;
use std::time::{Duration, Instant};

/// Records elapsed milliseconds into a histogram when stopped or dropped
#[must_use = "a timer records when dropped; binding it to `_` records immediately"]
pub struct Timer {
    name: String,
    labels: Vec<(String, String)>,
    metrics: MetricsCollector,
    started: Instant,
    recorded: bool,
}

impl Drop for Timer {
    fn drop(&mut self) {
        if self.recorded {
            return;
        }
        if let Err(e) = self.record() {
            tracing::error!("timer {} failed to record: {}", self.name, e);
        }
    }
}

impl Timer {
    pub(crate) fn new(name: &str, labels: &[(&str, &str)], metrics: &MetricsCollector) -> Self {
        Self {
            name: name.to_string(),
            labels: labels
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            metrics: metrics.clone(),
            started: Instant::now(),
            recorded: false,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Record now and return the measured duration
    pub fn stop(mut self) -> Result<Duration> {
        let elapsed = self.started.elapsed();
        self.recorded = true;
        self.record_duration(elapsed)?;
        Ok(elapsed)
    }

    fn record(&self) -> Result<()> {
        self.record_duration(self.started.elapsed())
    }

    fn record_duration(&self, elapsed: Duration) -> Result<()> {
        let labels = self
            .labels
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect::<Vec<_>>();
        self.metrics
            .record_histogram(&self.name, elapsed.as_secs_f64() * 1000.0, &labels)
    }
}
