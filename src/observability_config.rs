//! # Observability Configuration
//!
//! Environment-specific settings for logging, metrics and trace export.

use crate::errors::{AppError, AppResult};

/// Observability configuration for different environments
#[derive(Debug, Clone, PartialEq)]
pub struct ObservabilityConfig {
    /// Environment name (development, staging, production)
    pub environment: String,
    /// OTLP endpoint for trace export
    pub otlp_endpoint: Option<String>,
    /// Prometheus scrape endpoint port
    pub metrics_port: u16,
    /// Log level for this crate
    pub log_level: String,
    /// Trace sampling ratio (0.0-1.0)
    pub trace_sampling_ratio: f64,
    /// Whether to serve metrics over HTTP for Prometheus
    pub enable_metrics_export: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            otlp_endpoint: None,
            metrics_port: 9090,
            log_level: "info".to_string(),
            trace_sampling_ratio: 1.0,
            enable_metrics_export: false,
        }
    }
}

impl ObservabilityConfig {
    /// Check if running in production environment
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Check if running in development environment
    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }

    /// Validate configuration
    pub fn validate(&self) -> AppResult<()> {
        if let Some(endpoint) = &self.otlp_endpoint {
            if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
                return Err(AppError::Config(format!(
                    "Invalid OTLP endpoint format: {}",
                    endpoint
                )));
            }
        }

        if !(0.0..=1.0).contains(&self.trace_sampling_ratio) {
            return Err(AppError::Config(format!(
                "Invalid trace sampling ratio: {}",
                self.trace_sampling_ratio
            )));
        }

        if self.metrics_port == 0 {
            return Err(AppError::Config(format!(
                "Invalid metrics port: {}",
                self.metrics_port
            )));
        }

        if !["trace", "debug", "info", "warn", "error", "off"]
            .contains(&self.log_level.to_lowercase().as_str())
        {
            return Err(AppError::Config(format!(
                "Invalid log level: {}",
                self.log_level
            )));
        }

        Ok(())
    }
}

/// Environment-specific configuration presets
pub mod presets {
    use super::ObservabilityConfig;

    /// Development configuration with full observability
    pub fn development() -> ObservabilityConfig {
        ObservabilityConfig {
            environment: "development".to_string(),
            trace_sampling_ratio: 1.0,
            log_level: "debug".to_string(),
            ..Default::default()
        }
    }

    /// Production configuration with sampled traces and a scrape endpoint
    pub fn production() -> ObservabilityConfig {
        ObservabilityConfig {
            environment: "production".to_string(),
            trace_sampling_ratio: 0.1,
            enable_metrics_export: true,
            log_level: "warn".to_string(),
            ..Default::default()
        }
    }
}
