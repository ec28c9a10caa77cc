//! The tracer, metrics and logger triple with its background tasks

use crate::config::TelemetryConfig;
use crate::error::Result;
use crate::logs::StructuredLogger;
use crate::metrics::MetricsCollector;
use crate::traces::{InMemorySpanExporter, Tracer};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Tracer, metrics collector and logger built from one configuration.
///
/// Every completed span is also kept by a built-in [`InMemorySpanExporter`]
/// sized by `max_exported_spans`.
#[derive(Debug)]
pub struct Telemetry {
    config: Arc<TelemetryConfig>,
    tracer: Tracer,
    metrics: MetricsCollector,
    logger: StructuredLogger,
    recent_spans: Arc<InMemorySpanExporter>,
    shut_down: AtomicBool,
}

impl Telemetry {
    /// Build the triple and, inside a tokio runtime, start the orphan sweep
    /// and the periodic log flush.
    pub fn new(config: TelemetryConfig) -> Result<Self> {
        config.validate()?;
        let config = Arc::new(config);

        let tracer = Tracer::new(config.clone());
        let recent_spans = Arc::new(InMemorySpanExporter::new(config.max_exported_spans));
        tracer.add_shared_exporter(recent_spans.clone());
        let logger = StructuredLogger::new(&config)?;

        if tokio::runtime::Handle::try_current().is_ok() {
            tracer.start_orphan_sweep()?;
            logger.start_periodic_flush()?;
        } else {
            debug!("no tokio runtime; orphan sweep and periodic flush not started");
        }

        info!(
            service = %config.service_name,
            version = %config.service_version,
            environment = %config.environment,
            "telemetry started"
        );
        Ok(Self {
            config,
            tracer,
            metrics: MetricsCollector::new(),
            logger,
            recent_spans,
            shut_down: AtomicBool::new(false),
        })
    }

    /// Build from defaults overridden by `LEGO_TELEMETRY_*` variables
    pub fn from_env() -> Result<Self> {
        Self::new(TelemetryConfig::load()?)
    }

    pub fn config(&self) -> &TelemetryConfig {
        &self.config
    }

    pub fn tracer(&self) -> &Tracer {
        &self.tracer
    }

    pub fn metrics(&self) -> &MetricsCollector {
        &self.metrics
    }

    pub fn logger(&self) -> &StructuredLogger {
        &self.logger
    }

    /// The built-in exporter holding the most recently completed spans
    pub fn recent_spans(&self) -> &InMemorySpanExporter {
        &self.recent_spans
    }

    /// Stop both background tasks, flush the logger and shut down every
    /// sink and exporter.
    ///
    /// Only the first call does anything. All steps run even when one
    /// fails; the first failure is returned.
    pub fn shutdown(&self) -> Result<()> {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.tracer.stop_orphan_sweep();
        let logged = self.logger.shutdown();
        let exported = self.tracer.shutdown_exporters();
        if let Err(e) = &logged {
            warn!(error = %e, "logger shutdown failed");
        }
        if let Err(e) = &exported {
            warn!(error = %e, "span exporter shutdown failed");
        }
        info!(service = %self.config.service_name, "telemetry shut down");
        logged.and(exported)
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }
}
