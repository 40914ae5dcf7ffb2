//! # Tone Classification Module
//!
//! Asks the language model for the emotion, tone and intent of a chat
//! excerpt and parses the structured answer into a [`ToneProfile`].
//!
//! The classifier is strict: a failed call or an answer that is not the
//! four-field JSON object is a [`ClassificationError`]. A silently defaulted
//! profile would route every request to the fallback keyword with no signal.

use std::sync::Arc;
use std::time::Instant;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::errors::ClassificationError;
use crate::llm::LanguageModel;

lazy_static! {
    static ref CODE_FENCE: Regex =
        Regex::new(r"(?s)^\s*```[A-Za-z0-9_-]*\s*\n?(.*?)\s*```\s*$").expect("valid code fence regex");
}

/// Classifier output
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ToneProfile {
    pub emotion: String,
    pub tone: String,
    pub intent: String,
    /// Model's confidence in `[0, 1]`
    pub confidence: f64,
}

#[derive(Deserialize)]
struct StrictProfile {
    emotion: String,
    tone: String,
    intent: String,
    confidence: f64,
}

impl ToneProfile {
    /// Tags in lookup priority order: emotion, tone, intent
    pub fn tags(&self) -> [&str; 3] {
        [self.emotion.as_str(), self.tone.as_str(), self.intent.as_str()]
    }

    /// Parse a model answer, requiring all four keys with the right types
    ///
    /// Markdown code fences around the object are removed first. Extra keys
    /// are ignored.
    pub fn parse_strict(response: &str) -> Result<Self, ClassificationError> {
        let body = strip_code_fence(response);
        if body.is_empty() {
            return Err(ClassificationError::EmptyResponse);
        }

        let parsed: StrictProfile = serde_json::from_str(body)
            .map_err(|e| ClassificationError::Parse(format!("{}: {}", e, preview(body))))?;

        if !(0.0..=1.0).contains(&parsed.confidence) {
            return Err(ClassificationError::Parse(format!(
                "confidence {} is outside [0, 1]",
                parsed.confidence
            )));
        }

        Ok(Self {
            emotion: parsed.emotion.trim().to_string(),
            tone: parsed.tone.trim().to_string(),
            intent: parsed.intent.trim().to_string(),
            confidence: parsed.confidence,
        })
    }

    /// Parse a model answer without ever failing
    ///
    /// Missing or mistyped fields become empty strings and `0.0`; anything
    /// that is not a JSON object yields [`ToneProfile::default`]. Confidence
    /// is clamped to `[0, 1]`.
    pub fn parse_lenient(response: &str) -> Self {
        let value: Value = match serde_json::from_str(strip_code_fence(response)) {
            Ok(value) => value,
            Err(_) => return Self::default(),
        };
        let Some(object) = value.as_object() else {
            return Self::default();
        };

        let text_field = |key: &str| {
            object
                .get(key)
                .and_then(Value::as_str)
                .map(|s| s.trim().to_string())
                .unwrap_or_default()
        };

        let confidence = object
            .get("confidence")
            .and_then(|v| v.as_f64().or_else(|| v.as_str().and_then(|s| s.trim().parse().ok())))
            .filter(|c: &f64| c.is_finite())
            .map(|c| c.clamp(0.0, 1.0))
            .unwrap_or(0.0);

        Self {
            emotion: text_field("emotion"),
            tone: text_field("tone"),
            intent: text_field("intent"),
            confidence,
        }
    }
}

/// Remove a surrounding Markdown code fence (```` ```json … ``` ````) if present
pub fn strip_code_fence(response: &str) -> &str {
    match CODE_FENCE.captures(response).and_then(|c| c.get(1)) {
        Some(inner) => inner.as_str().trim(),
        None => response.trim(),
    }
}

fn preview(text: &str) -> String {
    let mut preview: String = text.chars().take(80).collect();
    if text.chars().count() > 80 {
        preview.push('…');
    }
    preview
}

/// Build the instructional prompt embedding `text`
///
/// The model plays a linguist, answers in Chinese and returns only the JSON
/// object shown at the end of the prompt.
pub fn build_prompt(text: &str) -> String {
    format!(
        "你是一個專門分析聊天語氣的語言學家。\n\
         \n\
         請分析以下訊息的「情緒、語氣、意圖」，以中文回答，並以 JSON 格式（不加註解）輸出：\n\
         \n\
         訊息內容：\n\
         {text}\n\
         \n\
         JSON 結構：\n\
         {{\n  \"emotion\": \"\",\n  \"tone\": \"\",\n  \"intent\": \"\",\n  \"confidence\": 0.0\n}}\n"
    )
}

/// Join utterance lines into the classifier input
pub fn join_lines(lines: &[String]) -> String {
    lines.join("\n")
}

/// Tone Classifier
pub struct ToneClassifier {
    model: Arc<dyn LanguageModel>,
}

impl ToneClassifier {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }

    pub fn model_name(&self) -> &str {
        self.model.model()
    }

    /// Classify one chat excerpt
    ///
    /// # Errors
    ///
    /// Any [`ClassificationError`] from the model call, or
    /// [`ClassificationError::Parse`] when the answer does not have the
    /// four-field shape.
    pub async fn classify(&self, text: &str) -> Result<ToneProfile, ClassificationError> {
        let start_time = Instant::now();
        let prompt = build_prompt(text);

        let response = self.model.generate(&prompt).await?;
        debug!(response = %preview(&response), "Raw tone classification response");

        let profile = ToneProfile::parse_strict(&response)?;

        info!(
            emotion = %profile.emotion,
            tone = %profile.tone,
            intent = %profile.intent,
            confidence = profile.confidence,
            duration_ms = start_time.elapsed().as_millis() as u64,
            "Tone classified"
        );
        Ok(profile)
    }

    /// Classify a sequence of utterance lines as one excerpt
    pub async fn classify_lines(&self, lines: &[String]) -> Result<ToneProfile, ClassificationError> {
        self.classify(&join_lines(lines)).await
    }
}
