//! # OCR Processing Module
//!
//! Text extraction from normalized screenshot bitmaps.
//!
//! The OCR engine is an unreliable collaborator behind the [`TextRecognizer`]
//! trait. [`TesseractRecognizer`] is the production implementation: it pools
//! Tesseract instances, runs recognition on the blocking thread pool under a
//! timeout, retries with exponential backoff and stops calling the engine
//! while the circuit breaker is open.
//!
//! [`TextExtractor`] sits in front of any recognizer and never fails: every
//! recognition error is logged and turned into empty text, so a screenshot
//! that cannot be read still ends in a "no match" recommendation instead of
//! an aborted request.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::{debug, info, warn, Instrument};

use crate::circuit_breaker::CircuitBreaker;
use crate::errors::error_logging;
use crate::instance_manager::OcrInstanceManager;
use crate::observability;
use crate::ocr_config::{OcrConfig, RecoveryConfig};
use crate::ocr_errors::OcrError;
use crate::preprocessing::NormalizedBitmap;

/// The OCR collaborator: `recognize(bitmap, language_hint) -> text | error`.
///
/// `language_hint` uses Tesseract's `+` syntax, so `"chi_sim+eng"` asks for
/// both scripts in a single pass.
#[async_trait]
pub trait TextRecognizer: Send + Sync {
    async fn recognize(
        &self,
        bitmap: &NormalizedBitmap,
        language_hint: &str,
    ) -> Result<String, OcrError>;
}

/// Tesseract-backed recognizer
pub struct TesseractRecognizer {
    config: OcrConfig,
    instance_manager: Arc<OcrInstanceManager>,
    circuit_breaker: Arc<CircuitBreaker>,
}

impl TesseractRecognizer {
    /// Create a recognizer with its own instance pool and circuit breaker
    pub fn new(config: OcrConfig) -> Self {
        let circuit_breaker = Arc::new(CircuitBreaker::new(config.recovery.clone()));
        Self {
            config,
            instance_manager: Arc::new(OcrInstanceManager::new()),
            circuit_breaker,
        }
    }

    /// Create a recognizer sharing an existing pool and breaker
    pub fn with_shared(
        config: OcrConfig,
        instance_manager: Arc<OcrInstanceManager>,
        circuit_breaker: Arc<CircuitBreaker>,
    ) -> Self {
        Self {
            config,
            instance_manager,
            circuit_breaker,
        }
    }

    pub fn config(&self) -> &OcrConfig {
        &self.config
    }

    pub fn circuit_breaker(&self) -> &CircuitBreaker {
        &self.circuit_breaker
    }
}

#[async_trait]
impl TextRecognizer for TesseractRecognizer {
    async fn recognize(
        &self,
        bitmap: &NormalizedBitmap,
        language_hint: &str,
    ) -> Result<String, OcrError> {
        let start_time = Instant::now();

        if self.circuit_breaker.is_open() {
            warn!("Circuit breaker is open, rejecting OCR request");
            observability::update_circuit_breaker_state(true);
            return Err(OcrError::CircuitOpen);
        }
        observability::update_circuit_breaker_state(false);

        let config = self.config.with_languages(language_hint);
        config
            .validate()
            .map_err(|e| OcrError::Validation(e.to_string()))?;

        let png = bitmap
            .to_png_bytes()
            .map_err(|e| OcrError::Validation(e.to_string()))?;

        info!(
            languages = %config.languages,
            width = bitmap.width(),
            height = bitmap.height(),
            "Starting OCR text extraction"
        );

        let png = Arc::new(png);
        let max_attempts = config.recovery.max_retries + 1;
        let mut attempt = 0;

        loop {
            attempt += 1;

            match perform_ocr_extraction(Arc::clone(&png), &config, &self.instance_manager).await {
                Ok((text, ocr_duration)) => {
                    self.circuit_breaker.record_success();
                    observability::update_circuit_breaker_state(false);
                    observability::record_ocr_metrics(true, start_time.elapsed(), attempt, text.chars().count());

                    info!(
                        "OCR extraction completed on attempt {} in {}ms ({}ms in engine), {} characters",
                        attempt,
                        start_time.elapsed().as_millis(),
                        ocr_duration.as_millis(),
                        text.chars().count()
                    );
                    return Ok(text);
                }
                Err(err) => {
                    // A timed-out pass may still hold the instance lock
                    if err.taints_instance() {
                        self.instance_manager.remove_instance(&config);
                    }

                    if !err.is_retryable() || attempt >= max_attempts {
                        self.circuit_breaker.record_failure();
                        observability::update_circuit_breaker_state(self.circuit_breaker.is_open());
                        observability::record_ocr_metrics(false, start_time.elapsed(), attempt, 0);
                        return Err(err);
                    }

                    let delay_ms = calculate_retry_delay(attempt, &config.recovery);
                    warn!("OCR extraction attempt {attempt} failed: {err}. Retrying in {delay_ms}ms");

                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                }
            }
        }
    }
}

/// One recognition pass on the blocking pool, bounded by the operation timeout
///
/// On timeout the blocking task is abandoned; its result is discarded when it
/// eventually finishes.
async fn perform_ocr_extraction(
    png: Arc<Vec<u8>>,
    config: &OcrConfig,
    instance_manager: &Arc<OcrInstanceManager>,
) -> Result<(String, Duration), OcrError> {
    let ocr_start_time = Instant::now();
    let timeout_duration = Duration::from_secs(config.recovery.operation_timeout_secs);

    let manager = Arc::clone(instance_manager);
    let task_config = config.clone();
    let task = tokio::task::spawn_blocking(move || -> Result<String, OcrError> {
        let instance = manager
            .get_instance(&task_config)
            .map_err(|e| OcrError::Initialization(e.to_string()))?;

        let mut tess = instance.lock();
        tess.set_image_from_mem(&png).map_err(|e| {
            OcrError::ImageLoad(format!("Failed to load bitmap for OCR: {e}"))
        })?;

        tess.get_utf8_text()
            .map_err(|e| OcrError::Extraction(format!("Failed to extract text from bitmap: {e}")))
    });

    let result = tokio::time::timeout(timeout_duration, task).await;
    let ocr_duration = ocr_start_time.elapsed();

    match result {
        Ok(Ok(Ok(text))) => {
            debug!(
                "OCR processing completed in {}ms, extracted {} bytes",
                ocr_duration.as_millis(),
                text.len()
            );
            Ok((text, ocr_duration))
        }
        Ok(Ok(Err(e))) => {
            warn!("OCR processing failed after {}ms: {e}", ocr_duration.as_millis());
            Err(e)
        }
        Ok(Err(join_error)) => Err(OcrError::Extraction(format!(
            "OCR worker task failed: {join_error}"
        ))),
        Err(_) => {
            warn!(
                "OCR processing timed out after {}ms (limit: {}s)",
                ocr_duration.as_millis(),
                config.recovery.operation_timeout_secs
            );
            Err(OcrError::Timeout(format!(
                "OCR operation timed out after {} seconds",
                config.recovery.operation_timeout_secs
            )))
        }
    }
}

/// Calculate retry delay with exponential backoff
///
/// ```text
/// delay = min(base_delay * 2^(attempt-1), max_delay)
/// final_delay = delay + random(0..=delay/4)
/// ```
///
/// ```rust
/// use reaction_finder::ocr_config::RecoveryConfig;
/// use reaction_finder::ocr::calculate_retry_delay;
///
/// let config = RecoveryConfig::default();
/// let delay = calculate_retry_delay(2, &config);
/// assert!((1000..=1250).contains(&delay));
/// ```
pub fn calculate_retry_delay(attempt: u32, recovery: &RecoveryConfig) -> u64 {
    let exponent = attempt.saturating_sub(1).min(32);
    let delay = recovery
        .base_retry_delay_ms
        .saturating_mul(1u64 << exponent)
        .min(recovery.max_retry_delay_ms);

    let jitter = rand::random_range(0..=delay / 4);
    delay + jitter
}

/// Collapse every whitespace run (newlines included) to one space and trim the ends
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Text Extractor: bitmap in, cleaned text out, never an error
pub struct TextExtractor {
    recognizer: Arc<dyn TextRecognizer>,
    language_hint: String,
}

impl TextExtractor {
    pub fn new(recognizer: Arc<dyn TextRecognizer>, language_hint: impl Into<String>) -> Self {
        Self {
            recognizer,
            language_hint: language_hint.into(),
        }
    }

    /// Default language hint used by [`extract`](Self::extract)
    pub fn language_hint(&self) -> &str {
        &self.language_hint
    }

    /// Extract text with the configured language hint
    pub async fn extract(&self, bitmap: &NormalizedBitmap) -> String {
        self.extract_with_hint(bitmap, &self.language_hint).await
    }

    /// Extract text with an explicit language hint
    ///
    /// Recognition failures are logged and yield `""`.
    pub async fn extract_with_hint(&self, bitmap: &NormalizedBitmap, language_hint: &str) -> String {
        let span = observability::ocr_span("extract_text");
        let start_time = Instant::now();

        let result = self
            .recognizer
            .recognize(bitmap, language_hint)
            .instrument(span)
            .await;

        match result {
            Ok(text) => collapse_whitespace(&text),
            Err(err) => {
                error_logging::log_ocr_error(
                    &err,
                    "extract_text",
                    language_hint,
                    Some(bitmap.dimensions()),
                    Some(start_time.elapsed()),
                );
                String::new()
            }
        }
    }
}
