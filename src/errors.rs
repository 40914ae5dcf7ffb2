//! # Application Error Types
//!
//! This module defines the error taxonomy of the recommendation pipeline and
//! the structured logging helpers used to report failures.
//!
//! | Stage | Failure | Policy |
//! |-------|---------|--------|
//! | Normalizer | `AppError::NotFound` | surfaced, OCR is not invoked |
//! | Extractor | `OcrError` | absorbed, text becomes empty |
//! | Classifier | `AppError::Classification` | surfaced, request fails |
//! | Search | `AppError::Search` | surfaced, timeouts stay distinguishable |
//! | Startup | `AppError::Config` | fatal to the process |

use std::fmt;

use crate::preprocessing::PreprocessingError;

/// Failures of the language-model backed tone classifier.
#[derive(Debug, Clone, PartialEq)]
pub enum ClassificationError {
    /// Network or HTTP level failure talking to the model
    Request(String),
    /// The credential was rejected or the quota is exhausted
    Auth(String),
    /// The call did not finish within the configured timeout
    Timeout(String),
    /// The model answered without any text
    EmptyResponse,
    /// The answer was not the expected four-field JSON object
    Parse(String),
}

impl fmt::Display for ClassificationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClassificationError::Request(msg) => write!(f, "[LLM_REQUEST] Language model call failed: {}", msg),
            ClassificationError::Auth(msg) => write!(f, "[LLM_AUTH] Language model rejected the credential: {}", msg),
            ClassificationError::Timeout(msg) => write!(f, "[LLM_TIMEOUT] Language model call timed out: {}", msg),
            ClassificationError::EmptyResponse => write!(f, "[LLM_EMPTY] Language model returned no text"),
            ClassificationError::Parse(msg) => write!(f, "[LLM_PARSE] Tone response is not valid JSON of the expected shape: {}", msg),
        }
    }
}

impl std::error::Error for ClassificationError {}

impl ClassificationError {
    /// Whether another attempt could succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, ClassificationError::Request(_) | ClassificationError::Timeout(_))
    }
}

/// Failures of the image search collaborator.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchError {
    /// The index or backend failed
    Backend(String),
    /// The search did not finish within the configured timeout
    Timeout(String),
}

impl fmt::Display for SearchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchError::Backend(msg) => write!(f, "[SEARCH] Image search failed: {}", msg),
            SearchError::Timeout(msg) => write!(f, "[SEARCH_TIMEOUT] Image search timed out: {}", msg),
        }
    }
}

impl std::error::Error for SearchError {}

/// General application error type for consistent error handling
#[derive(Debug, Clone, PartialEq)]
pub enum AppError {
    /// Missing credential, malformed mapping table or invalid settings
    Config(String),
    /// The screenshot could not be opened or decoded
    NotFound(String),
    /// Tone classification failed
    Classification(ClassificationError),
    /// Image search failed
    Search(SearchError),
    /// Internal application errors
    Internal(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(msg) => write!(f, "[CONFIG] {}", msg),
            AppError::NotFound(msg) => write!(f, "[NOT_FOUND] {}", msg),
            AppError::Classification(err) => write!(f, "[CLASSIFICATION] {}", err),
            AppError::Search(err) => write!(f, "[SEARCH] {}", err),
            AppError::Internal(msg) => write!(f, "[INTERNAL] {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl AppError {
    /// True for timeouts of any external collaborator
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            AppError::Classification(ClassificationError::Timeout(_))
                | AppError::Search(SearchError::Timeout(_))
        )
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<ClassificationError> for AppError {
    fn from(err: ClassificationError) -> Self {
        AppError::Classification(err)
    }
}

impl From<SearchError> for AppError {
    fn from(err: SearchError) -> Self {
        AppError::Search(err)
    }
}

impl From<PreprocessingError> for AppError {
    fn from(err: PreprocessingError) -> Self {
        match err {
            PreprocessingError::NotFound { .. } => AppError::NotFound(err.to_string()),
            PreprocessingError::InvalidParameter { .. } => AppError::Config(err.to_string()),
            PreprocessingError::Encoding { .. } => AppError::Internal(err.to_string()),
        }
    }
}

/// Result type alias for convenience
pub type AppResult<T> = Result<T, AppError>;

/// Standardized error logging utilities for consistent error reporting across the application
pub mod error_logging {
    use tracing::error;

    /// Log OCR processing errors with image and processing context
    pub fn log_ocr_error(
        error: &impl std::fmt::Display,
        operation: &str,
        languages: &str,
        bitmap_dimensions: Option<(u32, u32)>,
        processing_duration: Option<std::time::Duration>,
    ) {
        error!(
            error = %error,
            operation = %operation,
            languages = %languages,
            bitmap_dimensions = ?bitmap_dimensions,
            processing_duration_ms = ?processing_duration.map(|d| d.as_millis()),
            "OCR processing failed"
        );
    }

    /// Log language model errors with model and attempt context
    pub fn log_classification_error(
        error: &impl std::fmt::Display,
        operation: &str,
        model: &str,
        attempt_count: Option<u32>,
        input_chars: Option<usize>,
    ) {
        error!(
            error = %error,
            operation = %operation,
            model = %model,
            attempt_count = ?attempt_count,
            input_chars = ?input_chars,
            "Tone classification failed"
        );
    }

    /// Log image search errors with keyword context
    pub fn log_search_error(
        error: &impl std::fmt::Display,
        operation: &str,
        keyword: &str,
        max_results: Option<usize>,
    ) {
        error!(
            error = %error,
            operation = %operation,
            keyword = %keyword,
            max_results = ?max_results,
            "Image search failed"
        );
    }

    /// Log file system errors with path and operation context
    pub fn log_filesystem_error(
        error: &impl std::fmt::Display,
        operation: &str,
        path: Option<&str>,
        file_size: Option<u64>,
    ) {
        error!(
            error = %error,
            operation = %operation,
            path = ?path,
            file_size_bytes = ?file_size,
            "File system operation failed"
        );
    }

    /// Log configuration errors during startup/initialization
    pub fn log_config_error(
        error: &impl std::fmt::Display,
        config_key: &str,
        operation: &str,
    ) {
        error!(
            error = %error,
            config_key = %config_key,
            operation = %operation,
            "Configuration error"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_carries_category_tags() {
        assert!(AppError::Config("x".into()).to_string().starts_with("[CONFIG]"));
        assert!(AppError::NotFound("x".into()).to_string().starts_with("[NOT_FOUND]"));
        let err = AppError::from(ClassificationError::Parse("bad".into()));
        assert!(err.to_string().contains("[LLM_PARSE]"));
    }

    #[test]
    fn test_preprocessing_not_found_maps_to_not_found() {
        let err = PreprocessingError::NotFound {
            source: "a.png".into(),
            message: "missing".into(),
        };
        assert!(matches!(AppError::from(err), AppError::NotFound(_)));
    }

    #[test]
    fn test_timeouts_are_distinguishable() {
        assert!(AppError::from(ClassificationError::Timeout("30s".into())).is_timeout());
        assert!(AppError::from(SearchError::Timeout("10s".into())).is_timeout());
        assert!(!AppError::from(SearchError::Backend("io".into())).is_timeout());
    }

    #[test]
    fn test_transient_classification_errors() {
        assert!(ClassificationError::Request("reset".into()).is_transient());
        assert!(ClassificationError::Timeout("30s".into()).is_transient());
        assert!(!ClassificationError::Auth("403".into()).is_transient());
        assert!(!ClassificationError::Parse("eof".into()).is_transient());
    }
}
