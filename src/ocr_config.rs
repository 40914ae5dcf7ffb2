//! # OCR Configuration Module
//!
//! This module defines configuration structures for OCR processing,
//! including recovery settings, language selection and Tesseract tuning.

use crate::errors::{AppError, AppResult};

/// Simplified Chinese and English in one pass, the usual mix in chat screenshots.
pub const DEFAULT_LANGUAGES: &str = "chi_sim+eng";

/// Recovery configuration for calls to unreliable collaborators
#[derive(Debug, Clone, PartialEq)]
pub struct RecoveryConfig {
    /// Maximum number of retry attempts
    pub max_retries: u32,
    /// Base delay between retries in milliseconds
    pub base_retry_delay_ms: u64,
    /// Maximum delay between retries in milliseconds
    pub max_retry_delay_ms: u64,
    /// Timeout for a single operation in seconds
    pub operation_timeout_secs: u64,
    /// Circuit breaker failure threshold
    pub circuit_breaker_threshold: u32,
    /// Circuit breaker reset timeout in seconds
    pub circuit_breaker_reset_secs: u64,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_retry_delay_ms: 500,
            max_retry_delay_ms: 5000,
            operation_timeout_secs: 30,
            circuit_breaker_threshold: 5,
            circuit_breaker_reset_secs: 60, // 1 minute
        }
    }
}

impl RecoveryConfig {
    /// Validate recovery configuration parameters
    pub fn validate(&self) -> AppResult<()> {
        if self.base_retry_delay_ms == 0 {
            return Err(AppError::Config(
                "base_retry_delay_ms must be greater than 0".to_string(),
            ));
        }
        if self.max_retry_delay_ms < self.base_retry_delay_ms {
            return Err(AppError::Config(format!(
                "max_retry_delay_ms ({}) must be >= base_retry_delay_ms ({})",
                self.max_retry_delay_ms, self.base_retry_delay_ms
            )));
        }
        if self.operation_timeout_secs == 0 {
            return Err(AppError::Config(
                "operation_timeout_secs must be greater than 0".to_string(),
            ));
        }
        if self.circuit_breaker_threshold == 0 {
            return Err(AppError::Config(
                "circuit_breaker_threshold must be greater than 0".to_string(),
            ));
        }
        if self.circuit_breaker_reset_secs == 0 {
            return Err(AppError::Config(
                "circuit_breaker_reset_secs must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Page Segmentation Mode for Tesseract OCR
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum PageSegMode {
    /// Fully automatic page segmentation
    #[default]
    Auto = 3,
    /// Assume a single column of text
    SingleColumn = 4,
    /// Assume a single uniform block of text
    SingleBlock = 6,
    /// Find as much text as possible in no particular order
    SparseText = 11,
}

impl PageSegMode {
    /// Convert PSM mode to string value for Tesseract
    pub fn as_str(&self) -> &'static str {
        match self {
            PageSegMode::Auto => "3",
            PageSegMode::SingleColumn => "4",
            PageSegMode::SingleBlock => "6",
            PageSegMode::SparseText => "11",
        }
    }
}

/// Tesseract model type for different accuracy/speed trade-offs
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum ModelType {
    /// Fast model (tessdata_fast) - faster processing, lower accuracy
    #[default]
    Fast,
    /// Best model (tessdata_best) - slower processing, higher accuracy
    Best,
}

impl ModelType {
    /// Get the tessdata directory name for this model type
    pub fn tessdata_dir(&self) -> &'static str {
        match self {
            ModelType::Fast => "tessdata_fast",
            ModelType::Best => "tessdata_best",
        }
    }
}

/// Configuration structure for OCR processing
#[derive(Debug, Clone, PartialEq)]
pub struct OcrConfig {
    /// Tesseract language codes joined with `+` (e.g. "chi_sim+eng", "chi_tra+eng")
    pub languages: String,
    /// Tesseract model type (Fast vs Best accuracy)
    pub model_type: ModelType,
    /// Default page segmentation mode for OCR
    pub psm_mode: PageSegMode,
    /// Explicit tessdata directory, overrides the search of common install paths
    pub tessdata_path: Option<String>,
    /// Timeouts and circuit breaker settings
    pub recovery: RecoveryConfig,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            languages: DEFAULT_LANGUAGES.to_string(),
            model_type: ModelType::default(),
            psm_mode: PageSegMode::default(),
            tessdata_path: None,
            recovery: RecoveryConfig::default(),
        }
    }
}

impl OcrConfig {
    /// Returns a copy using another language hint
    pub fn with_languages(&self, languages: impl Into<String>) -> Self {
        Self {
            languages: languages.into(),
            ..self.clone()
        }
    }

    /// Language codes as a list (`"chi_sim+eng"` → `["chi_sim", "eng"]`)
    pub fn language_codes(&self) -> Vec<&str> {
        self.languages
            .split('+')
            .map(str::trim)
            .filter(|code| !code.is_empty())
            .collect()
    }

    /// Validate OCR configuration parameters
    pub fn validate(&self) -> AppResult<()> {
        if self.languages.trim().is_empty() {
            return Err(AppError::Config("languages cannot be empty".to_string()));
        }
        let codes = self.language_codes();
        if codes.len() != self.languages.split('+').count() {
            return Err(AppError::Config(format!(
                "languages contains an empty language code: '{}'",
                self.languages
            )));
        }
        if let Some(code) = codes
            .iter()
            .find(|code| !code.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'))
        {
            return Err(AppError::Config(format!(
                "invalid Tesseract language code '{}'",
                code
            )));
        }

        self.recovery.validate()?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[allow(unused_assignments)]
    fn test_recovery_config_validation() {
        let mut config = RecoveryConfig::default();

        assert!(config.validate().is_ok());

        config.base_retry_delay_ms = 0;
        assert!(config.validate().is_err());
        config.base_retry_delay_ms = 500;

        config.max_retry_delay_ms = 100;
        assert!(config.validate().is_err());
        config.max_retry_delay_ms = 5000;

        config.operation_timeout_secs = 0;
        assert!(config.validate().is_err());
        config.operation_timeout_secs = 30;

        config.circuit_breaker_threshold = 0;
        assert!(config.validate().is_err());
        config.circuit_breaker_threshold = 5;

        config.circuit_breaker_reset_secs = 0;
        assert!(config.validate().is_err());
        config.circuit_breaker_reset_secs = 60;

        // zero retries is allowed: one attempt only
        config.max_retries = 0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_languages_are_mixed_script() {
        let config = OcrConfig::default();
        assert_eq!(config.languages, "chi_sim+eng");
        assert_eq!(config.language_codes(), vec!["chi_sim", "eng"]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_language_validation() {
        let config = OcrConfig::default().with_languages("");
        assert!(config.validate().is_err());

        let config = OcrConfig::default().with_languages("eng++fra");
        assert!(config.validate().is_err());

        let config = OcrConfig::default().with_languages("eng;rm -rf");
        assert!(config.validate().is_err());

        let config = OcrConfig::default().with_languages("chi_tra+eng");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_model_type_values() {
        assert_eq!(ModelType::Fast.tessdata_dir(), "tessdata_fast");
        assert_eq!(ModelType::Best.tessdata_dir(), "tessdata_best");
        assert_eq!(ModelType::default(), ModelType::Fast);
    }

    #[test]
    fn test_psm_strings() {
        assert_eq!(PageSegMode::default().as_str(), "3");
        assert_eq!(PageSegMode::SingleBlock.as_str(), "6");
        assert_eq!(PageSegMode::SparseText.as_str(), "11");
    }
}
