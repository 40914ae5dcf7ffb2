//! # OCR Error Types Module
//!
//! Recognition failures. None of these ever leave the text extractor: they are
//! logged and turned into empty text there.

/// Custom error types for OCR operations
#[derive(Debug, Clone, PartialEq)]
pub enum OcrError {
    /// Bitmap could not be prepared for the engine
    Validation(String),
    /// OCR engine initialization errors
    Initialization(String),
    /// The engine could not read the bitmap
    ImageLoad(String),
    /// Text extraction errors
    Extraction(String),
    /// Timeout errors
    Timeout(String),
    /// Engine disabled after repeated failures
    CircuitOpen,
}

impl std::fmt::Display for OcrError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OcrError::Validation(msg) => write!(f, "[VALIDATION] Bitmap validation failed: {}", msg),
            OcrError::Initialization(msg) => write!(f, "[OCR_INIT] OCR engine initialization failed: {}", msg),
            OcrError::ImageLoad(msg) => write!(f, "[IMAGE_LOAD] Failed to load bitmap for OCR processing: {}", msg),
            OcrError::Extraction(msg) => write!(f, "[OCR_EXTRACT] Text extraction from image failed: {}", msg),
            OcrError::Timeout(msg) => write!(f, "[OCR_TIMEOUT] OCR processing timed out: {}", msg),
            OcrError::CircuitOpen => write!(f, "[OCR_CIRCUIT_OPEN] OCR temporarily disabled after repeated failures"),
        }
    }
}

impl std::error::Error for OcrError {}

impl OcrError {
    /// Whether another attempt on the same bitmap can succeed
    ///
    /// A missing language pack or an open breaker will not fix itself between
    /// retries.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            OcrError::ImageLoad(_) | OcrError::Extraction(_) | OcrError::Timeout(_)
        )
    }

    /// Whether the cached engine instance must be discarded after this failure
    ///
    /// After a timeout the abandoned blocking task keeps the instance locked
    /// until the engine returns, so the next attempt needs a fresh one.
    pub fn taints_instance(&self) -> bool {
        matches!(
            self,
            OcrError::ImageLoad(_) | OcrError::Extraction(_) | OcrError::Timeout(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_failures() {
        assert!(OcrError::Timeout("30s".to_string()).is_retryable());
        assert!(OcrError::Extraction("empty page".to_string()).is_retryable());
        assert!(!OcrError::Initialization("chi_sim.traineddata missing".to_string()).is_retryable());
        assert!(!OcrError::Validation("bad hint".to_string()).is_retryable());
        assert!(!OcrError::CircuitOpen.is_retryable());
    }

    #[test]
    fn test_every_retry_gets_a_fresh_instance() {
        let timeout = OcrError::Timeout("OCR operation timed out after 30 seconds".to_string());
        assert!(timeout.taints_instance());
        assert!(OcrError::ImageLoad("bad png".to_string()).taints_instance());

        // anything retried must not reuse the instance it failed on
        for err in [
            OcrError::Validation("bad hint".to_string()),
            OcrError::Initialization("missing".to_string()),
            OcrError::ImageLoad("bad png".to_string()),
            OcrError::Extraction("empty page".to_string()),
            timeout,
            OcrError::CircuitOpen,
        ] {
            if err.is_retryable() {
                assert!(err.taints_instance(), "{err} retried on a stale instance");
            }
        }

        // failures before the engine ran leave the cache alone
        assert!(!OcrError::Initialization("missing".to_string()).taints_instance());
        assert!(!OcrError::CircuitOpen.taints_instance());
    }

    #[test]
    fn test_display_tags() {
        assert!(OcrError::CircuitOpen.to_string().starts_with("[OCR_CIRCUIT_OPEN]"));
        assert!(OcrError::Timeout("x".to_string()).to_string().starts_with("[OCR_TIMEOUT]"));
    }
}
