//! Telemetry module for the Integration Health Agent
//!
//! - `emitter` - forwards engine events as mitigation signals, non-blocking
//! - `metrics` - Prometheus metrics for evaluations, decisions and gates

pub mod emitter;
pub mod metrics;

pub use emitter::{SignalEmitter, WebhookClient};
pub use metrics::{MitigationMetrics, MitigationMetricsRegistry};

use thiserror::Error;

/// Telemetry errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to emit signal: {0}")]
    EmissionFailed(String),

    #[error("Failed to serialize signal: {0}")]
    SerializationFailed(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    HttpError(String),

    #[error("Metrics error: {0}")]
    MetricsError(#[from] prometheus::Error),
}

pub type Result<T> = std::result::Result<T, TelemetryError>;

/// Telemetry configuration
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Forward engine events as signals
    pub emit_signals: bool,

    /// Webhook receiving signals; signals are only logged when unset
    pub webhook_url: Option<String>,

    /// Maximum queue size for async emission
    pub max_queue_size: usize,

    /// Emission timeout in milliseconds
    pub timeout_ms: u64,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            emit_signals: true,
            webhook_url: None,
            max_queue_size: 1000,
            timeout_ms: 5000,
        }
    }
}

impl TelemetryConfig {
    /// Create a new config builder
    pub fn builder() -> TelemetryConfigBuilder {
        TelemetryConfigBuilder::new()
    }

    /// Create config from environment variables
    pub fn from_env() -> Self {
        Self {
            emit_signals: std::env::var("SIGNAL_EMIT")
                .map(|v| v.parse().unwrap_or(true))
                .unwrap_or(true),
            webhook_url: std::env::var("SIGNAL_WEBHOOK_URL")
                .ok()
                .filter(|v| !v.trim().is_empty()),
            max_queue_size: std::env::var("SIGNAL_QUEUE_SIZE")
                .map(|v| v.parse().unwrap_or(1000))
                .unwrap_or(1000),
            timeout_ms: std::env::var("SIGNAL_TIMEOUT_MS")
                .map(|v| v.parse().unwrap_or(5000))
                .unwrap_or(5000),
        }
    }
}

/// Builder for TelemetryConfig
pub struct TelemetryConfigBuilder {
    config: TelemetryConfig,
}

impl TelemetryConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: TelemetryConfig::default(),
        }
    }

    /// Set the webhook URL
    pub fn webhook(mut self, url: impl Into<String>) -> Self {
        self.config.webhook_url = Some(url.into());
        self
    }

    pub fn emit_signals(mut self, enabled: bool) -> Self {
        self.config.emit_signals = enabled;
        self
    }

    pub fn max_queue_size(mut self, size: usize) -> Self {
        self.config.max_queue_size = size;
        self
    }

    pub fn timeout_ms(mut self, timeout: u64) -> Self {
        self.config.timeout_ms = timeout;
        self
    }

    pub fn build(self) -> TelemetryConfig {
        self.config
    }
}

impl Default for TelemetryConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TelemetryConfig::default();
        assert!(config.emit_signals);
        assert!(config.webhook_url.is_none());
        assert_eq!(config.max_queue_size, 1000);
        assert_eq!(config.timeout_ms, 5000);
    }

    #[test]
    fn test_config_builder() {
        let config = TelemetryConfig::builder()
            .webhook("http://signals:9090/ingest")
            .emit_signals(false)
            .max_queue_size(64)
            .timeout_ms(250)
            .build();

        assert_eq!(config.webhook_url.as_deref(), Some("http://signals:9090/ingest"));
        assert!(!config.emit_signals);
        assert_eq!(config.max_queue_size, 64);
        assert_eq!(config.timeout_ms, 250);
    }
}
