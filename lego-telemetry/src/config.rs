//! Telemetry configuration
//!
//! Sources are layered in precedence order (later sources override earlier
//! ones):
//! 1. Built-in defaults
//! 2. An optional TOML, YAML or JSON file
//! 3. `LEGO_TELEMETRY_*` environment variables

use crate::error::{Result, TelemetryError};
use crate::logs::LogLevel;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Prefix for environment overrides, e.g. `LEGO_TELEMETRY_LOG_LEVEL=debug`
pub const ENV_PREFIX: &str = "LEGO_TELEMETRY_";

/// Upper bound on the orphan sweep period
const MAX_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// One configuration snapshot shared by tracer, metrics and logger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Recorded on every span and log entry
    pub service_name: String,
    pub service_version: String,
    pub environment: String,
    /// Minimum level the logger keeps: debug, info, warn or error
    pub log_level: String,
    /// Completed spans retained by the tracer
    pub max_completed_spans: usize,
    /// Active spans older than this are force-ended by the orphan sweep
    pub span_timeout_ms: u64,
    pub log_flush_interval_ms: u64,
    /// Buffered log entries that trigger an immediate flush
    pub max_log_buffer: usize,
    /// Capacity of the in-memory span exporter
    pub max_exported_spans: usize,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "lego".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            environment: "development".to_string(),
            log_level: "info".to_string(),
            max_completed_spans: 1000,
            span_timeout_ms: 300_000,
            log_flush_interval_ms: 5_000,
            max_log_buffer: 100,
            max_exported_spans: 1000,
        }
    }
}

impl TelemetryConfig {
    /// Defaults with a service name
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            ..Self::default()
        }
    }

    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    pub fn with_span_timeout(mut self, timeout: Duration) -> Self {
        self.span_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn with_log_flush_interval(mut self, interval: Duration) -> Self {
        self.log_flush_interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn with_max_completed_spans(mut self, max: usize) -> Self {
        self.max_completed_spans = max;
        self
    }

    pub fn with_max_log_buffer(mut self, max: usize) -> Self {
        self.max_log_buffer = max;
        self
    }

    /// Load from defaults and environment variables
    pub fn load() -> Result<Self> {
        Self::extract(Self::figment(None)?)
    }

    /// Load from defaults, a configuration file and environment variables
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        Self::extract(Self::figment(Some(path.as_ref()))?)
    }

    /// The layered provider chain, for callers that merge in more sources
    pub fn figment(path: Option<&Path>) -> Result<Figment> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(path) = path {
            figment = figment.merge(Self::file_provider(path)?);
        }
        Ok(figment.merge(Env::prefixed(ENV_PREFIX)))
    }

    fn file_provider(path: &Path) -> Result<Figment> {
        if !path.exists() {
            return Err(TelemetryError::ConfigFileNotFound {
                path: path.to_path_buf(),
            });
        }
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);
        match extension.as_deref() {
            Some("toml") => Ok(Figment::from(Toml::file(path))),
            Some("yaml") | Some("yml") => Ok(Figment::from(Yaml::file(path))),
            Some("json") => Ok(Figment::from(Json::file(path))),
            _ => Err(TelemetryError::UnsupportedConfigFormat {
                path: path.to_path_buf(),
            }),
        }
    }

    fn extract(figment: Figment) -> Result<Self> {
        let config: Self = figment.extract()?;
        config.validate()?;
        debug!(
            service = %config.service_name,
            environment = %config.environment,
            log_level = %config.log_level,
            "loaded telemetry configuration"
        );
        Ok(config)
    }

    /// Reject values the components cannot run with
    pub fn validate(&self) -> Result<()> {
        self.parsed_log_level()?;
        if self.service_name.trim().is_empty() {
            return Err(TelemetryError::invalid_config(
                "service_name",
                "must not be empty",
            ));
        }
        if self.span_timeout_ms == 0 {
            return Err(TelemetryError::invalid_config(
                "span_timeout_ms",
                "must be greater than zero",
            ));
        }
        if self.log_flush_interval_ms == 0 {
            return Err(TelemetryError::invalid_config(
                "log_flush_interval_ms",
                "must be greater than zero",
            ));
        }
        Ok(())
    }

    pub fn parsed_log_level(&self) -> Result<LogLevel> {
        self.log_level.parse()
    }

    pub fn span_timeout(&self) -> Duration {
        Duration::from_millis(self.span_timeout_ms)
    }

    pub fn log_flush_interval(&self) -> Duration {
        Duration::from_millis(self.log_flush_interval_ms)
    }

    /// Orphan sweep period: half the span timeout, capped at one minute
    pub fn sweep_interval(&self) -> Duration {
        (self.span_timeout() / 2)
            .min(MAX_SWEEP_INTERVAL)
            .max(Duration::from_millis(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;
    use serial_test::serial;

    #[test]
    fn test_defaults() {
        let config = TelemetryConfig::default();
        assert_eq!(config.max_completed_spans, 1000);
        assert_eq!(config.span_timeout(), Duration::from_secs(300));
        assert_eq!(config.log_flush_interval(), Duration::from_secs(5));
        assert_eq!(config.max_log_buffer, 100);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_sweep_interval_is_half_timeout_capped() {
        let short = TelemetryConfig::default().with_span_timeout(Duration::from_millis(50));
        assert_eq!(short.sweep_interval(), Duration::from_millis(25));

        let long = TelemetryConfig::default();
        assert_eq!(long.sweep_interval(), Duration::from_secs(60));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = TelemetryConfig::default().with_log_level("chatty");
        assert!(matches!(
            config.validate(),
            Err(TelemetryError::InvalidLogLevel { .. })
        ));

        let config = TelemetryConfig {
            span_timeout_ms: 0,
            ..TelemetryConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(TelemetryError::InvalidConfig { ref key, .. }) if key == "span_timeout_ms"
        ));
    }

    #[test]
    #[serial]
    fn test_env_overrides_file() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "telemetry.toml",
                r#"
                service_name = "billing"
                log_level = "warn"
                max_completed_spans = 10
                "#,
            )?;
            jail.set_env("LEGO_TELEMETRY_LOG_LEVEL", "debug");

            let config = TelemetryConfig::load_from("telemetry.toml").map_err(|e| e.to_string())?;
            assert_eq!(config.service_name, "billing");
            assert_eq!(config.log_level, "debug");
            assert_eq!(config.max_completed_spans, 10);
            assert_eq!(config.max_log_buffer, 100);
            Ok(())
        });
    }

    #[test]
    #[serial]
    fn test_yaml_and_json_files() {
        Jail::expect_with(|jail| {
            jail.create_file("telemetry.yaml", "environment: staging\nspan_timeout_ms: 1500\n")?;
            jail.create_file("telemetry.json", r#"{"max_log_buffer": 7}"#)?;

            let yaml = TelemetryConfig::load_from("telemetry.yaml").map_err(|e| e.to_string())?;
            assert_eq!(yaml.environment, "staging");
            assert_eq!(yaml.span_timeout_ms, 1500);

            let json = TelemetryConfig::load_from("telemetry.json").map_err(|e| e.to_string())?;
            assert_eq!(json.max_log_buffer, 7);
            Ok(())
        });
    }

    #[test]
    #[serial]
    fn test_missing_and_unsupported_files() {
        Jail::expect_with(|jail| {
            assert!(matches!(
                TelemetryConfig::load_from("absent.toml"),
                Err(TelemetryError::ConfigFileNotFound { .. })
            ));

            jail.create_file("telemetry.ini", "x=1")?;
            assert!(matches!(
                TelemetryConfig::load_from("telemetry.ini"),
                Err(TelemetryError::UnsupportedConfigFormat { .. })
            ));
            Ok(())
        });
    }

    #[test]
    #[serial]
    fn test_invalid_env_level_is_rejected() {
        Jail::expect_with(|jail| {
            jail.set_env("LEGO_TELEMETRY_LOG_LEVEL", "verbose");
            assert!(matches!(
                TelemetryConfig::load(),
                Err(TelemetryError::InvalidLogLevel { .. })
            ));
            Ok(())
        });
    }
}
