//! Metrics collection and Prometheus export.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Result;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::observability_config::ObservabilityConfig;

/// Install the Prometheus recorder
///
/// With `enable_metrics_export` the exporter also serves `/metrics` on
/// `metrics_port` and no handle is returned; otherwise the returned handle
/// renders the current values on demand.
pub fn init_metrics_with_config(config: &ObservabilityConfig) -> Result<Option<PrometheusHandle>> {
    let builder = PrometheusBuilder::new();

    let handle = if config.enable_metrics_export {
        let addr = SocketAddr::from(([0, 0, 0, 0], config.metrics_port));
        builder.with_http_listener(addr).install()?;
        tracing::info!(%addr, "Prometheus scrape endpoint listening");
        None
    } else {
        Some(builder.install_recorder()?)
    };

    tracing::info!(
        metrics_export = %config.enable_metrics_export,
        "Metrics collection initialized"
    );
    Ok(handle)
}

fn outcome(success: bool) -> &'static str {
    if success {
        "success"
    } else {
        "failure"
    }
}

/// Record one recognition request, retries included
pub fn record_ocr_metrics(success: bool, duration: Duration, attempt_count: u32, text_chars: usize) {
    metrics::counter!("ocr_operations_total", "result" => outcome(success)).increment(1);
    metrics::histogram!("ocr_duration_seconds").record(duration.as_secs_f64());
    metrics::histogram!("ocr_retry_attempts").record(f64::from(attempt_count));
    if success {
        metrics::histogram!("ocr_text_chars").record(text_chars as f64);
    }
}

/// Update circuit breaker state metric
pub fn update_circuit_breaker_state(is_open: bool) {
    metrics::gauge!("circuit_breaker_state").set(if is_open { 1.0 } else { 0.0 });
}

/// Record one language model call, retries included
pub fn record_classification_metrics(success: bool, duration: Duration, attempt_count: u32, model: &str) {
    let model = model.to_string();
    metrics::counter!("classification_requests_total", "result" => outcome(success), "model" => model.clone())
        .increment(1);
    metrics::histogram!("classification_duration_seconds", "model" => model).record(duration.as_secs_f64());
    metrics::histogram!("classification_retry_attempts").record(f64::from(attempt_count));
}

/// Record one keyword search
pub fn record_search_metrics(success: bool, result_count: usize, duration: Duration) {
    metrics::counter!("image_search_requests_total", "result" => outcome(success)).increment(1);
    metrics::histogram!("image_search_duration_seconds").record(duration.as_secs_f64());
    metrics::histogram!("image_search_results").record(result_count as f64);
}

/// Record the terminal state of a request
pub fn record_recommendation_metrics(matched: bool, candidate_count: usize, duration: Duration) {
    let result = if matched { "matched" } else { "no_match" };
    metrics::counter!("recommendations_total", "result" => result).increment(1);
    metrics::histogram!("recommendation_duration_seconds").record(duration.as_secs_f64());
    metrics::histogram!("recommendation_candidates").record(candidate_count as f64);
}
