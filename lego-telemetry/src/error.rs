//! Error types for tracing, metrics and logging

use crate::metrics::MetricKind;
use lego_common::{ErrorSeverity, Severity};
use std::path::PathBuf;
use thiserror::Error;

/// Result type for telemetry operations
pub type Result<T> = std::result::Result<T, TelemetryError>;

/// Errors raised by the telemetry components
#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("invalid metric name '{name}': must match [a-zA-Z_:][a-zA-Z0-9_:]*")]
    InvalidMetricName { name: String },

    #[error("metric name '{name}' uses the reserved '__' prefix")]
    ReservedMetricName { name: String },

    #[error("invalid label name '{name}': must match [a-zA-Z_][a-zA-Z0-9_]* without a '__' prefix")]
    InvalidLabelName { name: String },

    #[error("counter increment must be non-negative for {name}: {value}")]
    NegativeCounterIncrement { name: String, value: f64 },

    #[error("metric value for {name} must be finite, got {value}")]
    NonFiniteValue { name: String, value: f64 },

    /// A metric name was first used as one kind and now as another
    #[error("metric {name} is a {existing}, not a {requested}")]
    MetricKindConflict {
        name: String,
        existing: MetricKind,
        requested: MetricKind,
    },

    #[error("invalid traceparent header: {value}")]
    InvalidTraceparent { value: String },

    #[error("unknown log level '{value}' (expected debug, info, warn or error)")]
    InvalidLogLevel { value: String },

    #[error("configuration file not found: {path}")]
    ConfigFileNotFound { path: PathBuf },

    #[error("unsupported configuration file format: {path}")]
    UnsupportedConfigFormat { path: PathBuf },

    #[error("invalid configuration value for '{key}': {message}")]
    InvalidConfig { key: String, message: String },

    #[error("failed to load configuration: {0}")]
    Config(#[from] Box<figment::Error>),

    /// Background tasks need a tokio runtime
    #[error("no tokio runtime available to run {task}")]
    NoRuntime { task: &'static str },

    #[error("exporter {exporter} failed: {message}")]
    Export { exporter: String, message: String },

    #[error("log sink failed: {message}")]
    Sink { message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<figment::Error> for TelemetryError {
    fn from(error: figment::Error) -> Self {
        Self::Config(Box::new(error))
    }
}

impl TelemetryError {
    pub fn export(exporter: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Export {
            exporter: exporter.into(),
            message: message.into(),
        }
    }

    pub fn sink(message: impl Into<String>) -> Self {
        Self::Sink {
            message: message.into(),
        }
    }

    pub fn invalid_config(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            key: key.into(),
            message: message.into(),
        }
    }

    /// True for rejected metric calls, which never touch collector state
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidMetricName { .. }
                | Self::ReservedMetricName { .. }
                | Self::InvalidLabelName { .. }
                | Self::NegativeCounterIncrement { .. }
                | Self::NonFiniteValue { .. }
                | Self::MetricKindConflict { .. }
        )
    }

    /// Check if retrying the same call could succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Export { .. } | Self::Sink { .. } | Self::Io(_))
    }
}

impl Severity for TelemetryError {
    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::ConfigFileNotFound { .. }
            | Self::UnsupportedConfigFormat { .. }
            | Self::InvalidConfig { .. }
            | Self::InvalidLogLevel { .. }
            | Self::Config(_)
            | Self::NoRuntime { .. } => ErrorSeverity::Critical,
            Self::Export { .. } | Self::Sink { .. } | Self::Io(_) => ErrorSeverity::Warning,
            _ => ErrorSeverity::Error,
        }
    }
}
