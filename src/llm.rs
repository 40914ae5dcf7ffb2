//! # Language Model Module
//!
//! The language-model collaborator behind the [`LanguageModel`] trait and its
//! production implementation, [`GeminiClient`], which calls the Gemini
//! `generateContent` endpoint.
//!
//! Transient failures (network errors, timeouts, HTTP 429 and 5xx) are retried
//! with exponential backoff; a rejected credential is reported at once.

use std::fmt;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn, Instrument};

use crate::errors::{error_logging, AppError, AppResult, ClassificationError};
use crate::observability;
use crate::ocr::calculate_retry_delay;
use crate::ocr_config::RecoveryConfig;

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// The language-model collaborator: `generate(prompt) -> text | error`.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, ClassificationError>;

    /// Model identifier, for logs and metrics
    fn model(&self) -> &str;
}

/// Language model configuration
#[derive(Clone, PartialEq)]
pub struct LlmConfig {
    /// API credential, required
    pub api_key: String,
    /// Model identifier (e.g. "gemini-2.5-flash")
    pub model: String,
    /// Base URL of the Generative Language API
    pub api_base: String,
    /// Ask the model for `application/json` output
    pub json_output: bool,
    /// Sampling temperature, model default when unset
    pub temperature: Option<f32>,
    /// Per-attempt timeout and retry policy
    pub recovery: RecoveryConfig,
}

impl fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmConfig")
            .field("api_key", &if self.api_key.is_empty() { "<unset>" } else { "<redacted>" })
            .field("model", &self.model)
            .field("api_base", &self.api_base)
            .field("json_output", &self.json_output)
            .field("temperature", &self.temperature)
            .field("recovery", &self.recovery)
            .finish()
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: DEFAULT_MODEL.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            json_output: true,
            temperature: None,
            recovery: RecoveryConfig::default(),
        }
    }
}

impl LlmConfig {
    pub fn with_api_key(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Default::default()
        }
    }

    /// Validate language model configuration
    ///
    /// A missing credential is fatal before any request is processed.
    pub fn validate(&self) -> AppResult<()> {
        if self.api_key.trim().is_empty() {
            return Err(AppError::Config(
                "GEMINI_API_KEY is not set; the tone classifier cannot run without a credential"
                    .to_string(),
            ));
        }
        if self.model.trim().is_empty() {
            return Err(AppError::Config("model identifier cannot be empty".to_string()));
        }
        if !(self.api_base.starts_with("https://") || self.api_base.starts_with("http://")) {
            return Err(AppError::Config(format!(
                "api_base must be an http(s) URL, got '{}'",
                self.api_base
            )));
        }
        if let Some(t) = self.temperature {
            if !(0.0..=2.0).contains(&t) {
                return Err(AppError::Config(format!(
                    "temperature must be between 0.0 and 2.0, got {}",
                    t
                )));
            }
        }
        self.recovery.validate()?;
        Ok(())
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<RequestPart<'a>>,
}

#[derive(Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

impl GenerateResponse {
    /// Text of the first candidate, parts concatenated
    fn into_text(self) -> Result<String, ClassificationError> {
        if let Some(reason) = self.prompt_feedback.and_then(|f| f.block_reason) {
            warn!("Prompt was blocked by the model: {}", reason);
            return Err(ClassificationError::EmptyResponse);
        }

        let text: String = self
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| content.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            Err(ClassificationError::EmptyResponse)
        } else {
            Ok(text)
        }
    }
}

/// One failed attempt, with whether another attempt could help
struct AttemptError {
    error: ClassificationError,
    retryable: bool,
}

impl From<ClassificationError> for AttemptError {
    fn from(error: ClassificationError) -> Self {
        let retryable = error.is_transient();
        Self { error, retryable }
    }
}

/// Gemini `generateContent` client
pub struct GeminiClient {
    client: Client,
    config: LlmConfig,
}

impl GeminiClient {
    /// Create a client, validating the configuration first
    ///
    /// # Errors
    ///
    /// `AppError::Config` when the credential is missing or a setting is invalid.
    pub fn new(config: LlmConfig) -> AppResult<Self> {
        config.validate()?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.recovery.operation_timeout_secs))
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build HTTP client: {}", e)))?;

        info!(model = %config.model, "Language model client configured");
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.api_base.trim_end_matches('/'),
            self.config.model
        )
    }

    /// Cheap round trip to confirm the credential and model work
    pub async fn ping(&self) -> Result<String, ClassificationError> {
        let reply = self.generate_with_retry("respond 'OK'", false).await?;
        Ok(reply.trim().to_string())
    }

    async fn generate_with_retry(
        &self,
        prompt: &str,
        json_output: bool,
    ) -> Result<String, ClassificationError> {
        let start_time = Instant::now();
        let max_attempts = self.config.recovery.max_retries + 1;
        let mut attempt = 0;

        loop {
            attempt += 1;

            match self.send_once(prompt, json_output).await {
                Ok(text) => {
                    observability::record_classification_metrics(
                        true,
                        start_time.elapsed(),
                        attempt,
                        &self.config.model,
                    );
                    debug!(
                        "Language model answered on attempt {} in {}ms ({} characters)",
                        attempt,
                        start_time.elapsed().as_millis(),
                        text.chars().count()
                    );
                    return Ok(text);
                }
                Err(AttemptError { error, retryable }) => {
                    if !retryable || attempt >= max_attempts {
                        observability::record_classification_metrics(
                            false,
                            start_time.elapsed(),
                            attempt,
                            &self.config.model,
                        );
                        error_logging::log_classification_error(
                            &error,
                            "generate_content",
                            &self.config.model,
                            Some(attempt),
                            Some(prompt.chars().count()),
                        );
                        return Err(error);
                    }

                    let delay_ms = calculate_retry_delay(attempt, &self.config.recovery);
                    warn!("Language model attempt {attempt} failed: {error}. Retrying in {delay_ms}ms");
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                }
            }
        }
    }

    async fn send_once(&self, prompt: &str, json_output: bool) -> Result<String, AttemptError> {
        let generation_config = if json_output || self.config.temperature.is_some() {
            Some(GenerationConfig {
                response_mime_type: json_output.then_some("application/json"),
                temperature: self.config.temperature,
            })
        } else {
            None
        };

        let body = GenerateRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![RequestPart { text: prompt }],
            }],
            generation_config,
        };

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ClassificationError::Timeout(format!(
                        "no answer within {} seconds",
                        self.config.recovery.operation_timeout_secs
                    ))
                } else {
                    ClassificationError::Request(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &error_body));
        }

        let parsed: GenerateResponse = response.json().await.map_err(|e| {
            ClassificationError::Request(format!("Failed to decode generateContent response: {}", e))
        })?;

        Ok(parsed.into_text()?)
    }
}

/// Map a non-success HTTP status to an attempt error
fn classify_status(status: StatusCode, body: &str) -> AttemptError {
    let detail = format!("{} {}", status, truncate(body, 200));
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AttemptError {
            error: ClassificationError::Auth(detail),
            retryable: false,
        },
        StatusCode::TOO_MANY_REQUESTS => AttemptError {
            error: ClassificationError::Request(detail),
            retryable: true,
        },
        s if s.is_server_error() => AttemptError {
            error: ClassificationError::Request(detail),
            retryable: true,
        },
        _ => AttemptError {
            error: ClassificationError::Request(detail),
            retryable: false,
        },
    }
}

fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[async_trait]
impl LanguageModel for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String, ClassificationError> {
        let span = observability::llm_span("generate", &self.config.model);
        self.generate_with_retry(prompt, self.config.json_output)
            .instrument(span)
            .await
    }

    fn model(&self) -> &str {
        &self.config.model
    }
}
