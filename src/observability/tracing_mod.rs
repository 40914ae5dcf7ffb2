//! Tracing and logging setup module.
//!
//! This module provides:
//! - Structured logging configuration
//! - OpenTelemetry distributed tracing
//! - Tracing span creation utilities

use std::sync::OnceLock;

use anyhow::Result;
use opentelemetry::global;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::trace::{Sampler, SdkTracerProvider, Tracer};
use tracing_opentelemetry::OpenTelemetryLayer;
use tracing_subscriber::prelude::*;

use crate::observability_config::ObservabilityConfig;

const TRACER_NAME: &str = "reaction-finder";

static TRACER_PROVIDER: OnceLock<SdkTracerProvider> = OnceLock::new();

fn env_filter(config: &ObservabilityConfig) -> Result<tracing_subscriber::EnvFilter> {
    Ok(tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(format!("reaction_finder={}", config.log_level).parse()?)
        .add_directive("reqwest=warn".parse()?)
        .add_directive("hyper=warn".parse()?)
        .add_directive("leptess=warn".parse()?))
}

/// Build the OTLP tracer provider when an endpoint is configured
///
/// The gRPC channel connects lazily, but building it needs a Tokio runtime.
pub fn build_tracer_provider(config: &ObservabilityConfig) -> Result<Option<SdkTracerProvider>> {
    let Some(endpoint) = &config.otlp_endpoint else {
        return Ok(None);
    };

    let otlp_exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint.clone())
        .build()?;

    let tracer_provider = SdkTracerProvider::builder()
        .with_sampler(Sampler::TraceIdRatioBased(config.trace_sampling_ratio))
        .with_batch_exporter(otlp_exporter)
        .build();

    Ok(Some(tracer_provider))
}

/// Layer forwarding `tracing` spans to an OpenTelemetry tracer provider
pub fn otel_layer<S>(provider: &SdkTracerProvider) -> OpenTelemetryLayer<S, Tracer>
where
    S: tracing::Subscriber + for<'span> tracing_subscriber::registry::LookupSpan<'span>,
{
    tracing_opentelemetry::layer().with_tracer(provider.tracer(TRACER_NAME))
}

/// Initialize structured logging and, with an OTLP endpoint, span export
///
/// Pretty output in development or with `LOG_FORMAT=pretty`, JSON otherwise.
/// Logs go to stderr so command output on stdout stays machine readable.
pub fn init_tracing_with_config(config: &ObservabilityConfig) -> Result<()> {
    let filter = env_filter(config)?;
    let provider = build_tracer_provider(config)?;
    let otel = provider.as_ref().map(otel_layer);

    if config.is_development()
        || std::env::var("LOG_FORMAT").unwrap_or_else(|_| "json".to_string()) == "pretty"
    {
        tracing_subscriber::registry()
            .with(filter)
            .with(otel)
            .with(
                tracing_subscriber::fmt::layer()
                    .pretty()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_thread_names(false),
            )
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(otel)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_thread_names(true),
            )
            .try_init()?;
    }

    if let Some(provider) = provider {
        global::set_tracer_provider(provider.clone());
        // A second init keeps the first provider
        let _ = TRACER_PROVIDER.set(provider);
        tracing::info!(
            otlp_endpoint = ?config.otlp_endpoint,
            trace_sampling_ratio = %config.trace_sampling_ratio,
            "OpenTelemetry tracing initialized with OTLP export"
        );
    } else {
        tracing::debug!("OpenTelemetry tracing disabled (no OTLP endpoint configured)");
    }

    tracing::info!(
        environment = %config.environment,
        log_level = %config.log_level,
        "Tracing initialized with structured logging"
    );
    Ok(())
}

/// Flush and stop span export, if it was started
pub fn shutdown_tracing() {
    if let Some(provider) = TRACER_PROVIDER.get() {
        if let Err(e) = provider.shutdown() {
            tracing::warn!("Failed to flush OpenTelemetry spans: {e}");
        }
    }
}

/// Span covering one pipeline request
pub fn pipeline_span(operation: &str) -> tracing::Span {
    tracing::info_span!("pipeline_operation", operation = operation, component = "pipeline")
}

/// Create a span for OCR operations
pub fn ocr_span(operation: &str) -> tracing::Span {
    tracing::info_span!("ocr_operation", operation = operation, component = "ocr")
}

/// Create a span for language model calls
pub fn llm_span(operation: &str, model: &str) -> tracing::Span {
    tracing::info_span!(
        "llm_operation",
        operation = operation,
        model = model,
        component = "llm"
    )
}

/// Create a span for one keyword search
pub fn search_span(keyword: &str) -> tracing::Span {
    tracing::info_span!("search_operation", keyword = keyword, component = "image_search")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_filter_accepts_config_levels() {
        for level in ["trace", "debug", "info", "warn", "error"] {
            let config = ObservabilityConfig {
                log_level: level.to_string(),
                ..Default::default()
            };
            assert!(env_filter(&config).is_ok());
        }
    }

    #[test]
    fn test_no_provider_without_endpoint() {
        let provider = build_tracer_provider(&ObservabilityConfig::default()).unwrap();
        assert!(provider.is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_spans_reach_the_otlp_tracer() {
        use opentelemetry::trace::TraceContextExt;
        use tracing_opentelemetry::OpenTelemetrySpanExt;

        let config = ObservabilityConfig {
            otlp_endpoint: Some("http://127.0.0.1:4317".to_string()),
            // nothing sampled, so nothing is sent on shutdown
            trace_sampling_ratio: 0.0,
            ..Default::default()
        };
        let provider = build_tracer_provider(&config)
            .unwrap()
            .expect("endpoint configured");

        let subscriber = tracing_subscriber::registry().with(otel_layer(&provider));
        let span_context = tracing::subscriber::with_default(subscriber, || {
            let span = pipeline_span("recommend");
            span.context().span().span_context().clone()
        });

        // a span id is only assigned by the OpenTelemetry layer
        assert!(span_context.is_valid());
        let _ = provider.shutdown();
    }

    #[test]
    fn test_spans_can_be_created_without_subscriber() {
        let _ = pipeline_span("recommend");
        let _ = ocr_span("extract_text");
        let _ = llm_span("generate", "gemini-2.5-flash");
        let _ = search_span("笑");
    }
}
