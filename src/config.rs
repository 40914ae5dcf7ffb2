//! # Unified Application Configuration
//!
//! This module consolidates every setting of the pipeline into one structured
//! configuration object, loaded from environment variables and validated
//! before any request is processed.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::errors::{AppError, AppResult};
use crate::image_search::SearchConfig;
use crate::keywords::KeywordConfig;
use crate::llm::LlmConfig;
use crate::observability_config::ObservabilityConfig;
use crate::ocr_config::OcrConfig;
use crate::preprocessing::NormalizerConfig;
use crate::recommendation::RecommendationConfig;

/// Unified application configuration
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    /// Language model configuration
    pub llm: LlmConfig,
    /// OCR processing configuration
    pub ocr: OcrConfig,
    /// Image normalization configuration
    pub normalizer: NormalizerConfig,
    /// Keyword mapping configuration
    pub keywords: KeywordConfig,
    /// Image search configuration
    pub search: SearchConfig,
    /// Recommendation ranking configuration
    pub recommendation: RecommendationConfig,
    /// Observability configuration
    pub observability: ObservabilityConfig,
}

/// Parse an optional variable, keeping `default` when it is unset or blank
fn parse_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> AppResult<T> {
    match lookup(key).filter(|v| !v.trim().is_empty()) {
        Some(value) => value.trim().parse().map_err(|_| {
            AppError::Config(format!("{} must be a valid value, got '{}'", key, value))
        }),
        None => Ok(default),
    }
}

fn parse_bool(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: bool) -> AppResult<bool> {
    match lookup(key).map(|v| v.trim().to_lowercase()) {
        None => Ok(default),
        Some(v) if v.is_empty() => Ok(default),
        Some(v) if ["true", "1", "yes"].contains(&v.as_str()) => Ok(true),
        Some(v) if ["false", "0", "no"].contains(&v.as_str()) => Ok(false),
        Some(v) => Err(AppError::Config(format!("{} must be true or false, got '{}'", key, v))),
    }
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> AppResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> AppResult<Self> {
        let mut config = Self::default();

        // Language model
        config.llm.api_key = lookup("GEMINI_API_KEY").unwrap_or_default().trim().to_string();
        config.llm.model = parse_var(&lookup, "GEMINI_MODEL", config.llm.model)?;
        config.llm.api_base = parse_var(&lookup, "GEMINI_API_BASE", config.llm.api_base)?;
        config.llm.recovery.operation_timeout_secs = parse_var(
            &lookup,
            "LLM_TIMEOUT_SECS",
            config.llm.recovery.operation_timeout_secs,
        )?;
        config.llm.recovery.max_retries =
            parse_var(&lookup, "LLM_MAX_RETRIES", config.llm.recovery.max_retries)?;

        // OCR
        config.ocr.languages = parse_var(&lookup, "OCR_LANGUAGES", config.ocr.languages)?;
        config.ocr.recovery.operation_timeout_secs = parse_var(
            &lookup,
            "OCR_TIMEOUT_SECS",
            config.ocr.recovery.operation_timeout_secs,
        )?;
        config.ocr.tessdata_path = lookup("OCR_TESSDATA_PATH").filter(|v| !v.trim().is_empty());

        // Keyword mapping
        config.keywords.mapping_path = parse_var(
            &lookup,
            "KEYWORD_MAPPING_PATH",
            config.keywords.mapping_path,
        )?;
        config.keywords.fallback_keyword =
            parse_var(&lookup, "FALLBACK_KEYWORD", config.keywords.fallback_keyword)?;

        // Image search
        config.search.index_path = parse_var(&lookup, "IMAGE_INDEX_PATH", config.search.index_path)?;
        config.search.download_dir = lookup("IMAGE_DOWNLOAD_DIR")
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);
        config.search.min_similarity =
            parse_var(&lookup, "SEARCH_MIN_SIMILARITY", config.search.min_similarity)?;

        // Recommendation
        config.recommendation.deduplicate = parse_bool(
            &lookup,
            "RECOMMENDATION_DEDUPLICATE",
            config.recommendation.deduplicate,
        )?;
        config.recommendation.search_timeout_secs = parse_var(
            &lookup,
            "SEARCH_TIMEOUT_SECS",
            config.recommendation.search_timeout_secs,
        )?;

        // Observability
        let defaults = ObservabilityConfig::default();
        config.observability = ObservabilityConfig {
            environment: parse_var(&lookup, "ENVIRONMENT", defaults.environment)?,
            otlp_endpoint: lookup("OTLP_ENDPOINT").filter(|v| !v.trim().is_empty()),
            metrics_port: parse_var(&lookup, "METRICS_PORT", defaults.metrics_port)?,
            log_level: parse_var(&lookup, "OBSERVABILITY_LOG_LEVEL", defaults.log_level)?,
            trace_sampling_ratio: parse_var(
                &lookup,
                "TRACE_SAMPLING_RATIO",
                defaults.trace_sampling_ratio,
            )?,
            enable_metrics_export: parse_bool(
                &lookup,
                "ENABLE_METRICS_EXPORT",
                defaults.enable_metrics_export,
            )?,
        };

        Ok(config)
    }

    /// Validate the sections needed to turn a screenshot into lines
    pub fn validate_extraction(&self) -> AppResult<()> {
        self.ocr.validate()?;
        self.normalizer.validate()?;
        self.observability.validate()?;
        Ok(())
    }

    /// Validate all configuration sections
    pub fn validate(&self) -> AppResult<()> {
        self.validate_extraction()?;
        self.llm.validate()?;
        self.keywords.validate()?;
        self.search.validate()?;
        self.recommendation.validate()?;
        Ok(())
    }

    /// Get a summary of the current configuration for logging
    pub fn summary(&self) -> String {
        format!(
            "Configuration: gemini_api_key=[REDACTED], model={}, ocr_languages={}, keyword_mapping={}, image_index={}, deduplicate={}, metrics_export={}",
            self.llm.model,
            self.ocr.languages,
            self.keywords.mapping_path.display(),
            self.search.index_path.display(),
            self.recommendation.deduplicate,
            self.observability.enable_metrics_export
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_credential_fail_validation() {
        let config = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.llm.model, "gemini-2.5-flash");
        assert_eq!(config.ocr.languages, "chi_sim+eng");
        assert_eq!(config.keywords.fallback_keyword, "笑");
        assert!(matches!(config.validate(), Err(AppError::Config(_))));

        // line extraction does not need the language model
        assert!(config.validate_extraction().is_ok());
    }

    #[test]
    fn test_full_environment() {
        let config = AppConfig::from_lookup(lookup(&[
            ("GEMINI_API_KEY", " key-123 "),
            ("GEMINI_MODEL", "gemini-2.5-pro"),
            ("LLM_TIMEOUT_SECS", "45"),
            ("LLM_MAX_RETRIES", "0"),
            ("OCR_LANGUAGES", "chi_tra+eng"),
            ("KEYWORD_MAPPING_PATH", "/etc/reactions/mapping.json"),
            ("IMAGE_DOWNLOAD_DIR", "/tmp/reactions"),
            ("SEARCH_TIMEOUT_SECS", "5"),
            ("RECOMMENDATION_DEDUPLICATE", "TRUE"),
            ("ENVIRONMENT", "production"),
        ]))
        .unwrap();

        assert_eq!(config.llm.api_key, "key-123");
        assert_eq!(config.llm.model, "gemini-2.5-pro");
        assert_eq!(config.llm.recovery.operation_timeout_secs, 45);
        assert_eq!(config.llm.recovery.max_retries, 0);
        assert_eq!(config.ocr.languages, "chi_tra+eng");
        assert_eq!(
            config.keywords.mapping_path,
            PathBuf::from("/etc/reactions/mapping.json")
        );
        assert_eq!(config.search.download_dir, Some(PathBuf::from("/tmp/reactions")));
        assert_eq!(config.recommendation.search_timeout_secs, 5);
        assert!(config.recommendation.deduplicate);
        assert!(config.observability.is_production());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_malformed_numbers_are_config_errors() {
        let result = AppConfig::from_lookup(lookup(&[("LLM_TIMEOUT_SECS", "soon")]));
        assert!(matches!(result, Err(AppError::Config(_))));

        let result = AppConfig::from_lookup(lookup(&[("RECOMMENDATION_DEDUPLICATE", "maybe")]));
        assert!(matches!(result, Err(AppError::Config(_))));

        let result = AppConfig::from_lookup(lookup(&[("METRICS_PORT", "abc")]));
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn test_search_timeout_reaches_the_engine() {
        let config = AppConfig::from_lookup(lookup(&[("SEARCH_TIMEOUT_SECS", "0")])).unwrap();
        assert_eq!(config.recommendation.search_timeout_secs, 0);
        assert!(matches!(config.recommendation.validate(), Err(AppError::Config(_))));

        let config = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.recommendation.search_timeout_secs, 10);
    }

    #[test]
    fn test_summary_redacts_credential() {
        let config = AppConfig::from_lookup(lookup(&[("GEMINI_API_KEY", "super-secret")])).unwrap();
        let summary = config.summary();
        assert!(!summary.contains("super-secret"));
        assert!(summary.contains("[REDACTED]"));
    }
}
