//! Observability module for centralized metrics, tracing, and logging setup.
//!
//! This module provides:
//! - Structured logging with configurable levels
//! - Metrics collection and optional Prometheus scrape endpoint
//! - Distributed tracing with OpenTelemetry

use anyhow::Result;
use metrics_exporter_prometheus::PrometheusHandle;

use crate::observability_config::ObservabilityConfig;

mod metrics_mod;
mod tracing_mod;

pub use metrics_mod::{
    init_metrics_with_config, record_classification_metrics, record_ocr_metrics,
    record_recommendation_metrics, record_search_metrics, update_circuit_breaker_state,
};
pub use tracing_mod::{
    build_tracer_provider, init_tracing_with_config, llm_span, ocr_span, otel_layer,
    pipeline_span, search_span, shutdown_tracing,
};

/// Initialize the complete observability stack with custom configuration
///
/// Must run inside a Tokio runtime when metrics export or OTLP is enabled.
pub fn init_observability_with_config(config: ObservabilityConfig) -> Result<Option<PrometheusHandle>> {
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid observability configuration: {}", e))?;

    init_tracing_with_config(&config)?;
    let metrics_handle = init_metrics_with_config(&config)?;

    tracing::info!(
        environment = %config.environment,
        otlp_endpoint = ?config.otlp_endpoint,
        metrics_export = %config.enable_metrics_export,
        "Observability stack initialized successfully"
    );
    Ok(metrics_handle)
}
