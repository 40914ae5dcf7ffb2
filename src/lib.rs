//! # Reaction Finder
//!
//! Turns a chat screenshot into reaction image recommendations: the image is
//! normalized and read with OCR, the recognized lines are classified by a
//! language model into an emotion/tone/intent profile, the profile is mapped
//! to search keywords and the keywords are looked up in an image collection.

pub mod circuit_breaker;
pub mod config;
pub mod errors;
pub mod image_search;
pub mod instance_manager;
pub mod keywords;
pub mod llm;
pub mod observability;
pub mod observability_config;
pub mod ocr;
pub mod ocr_config;
pub mod ocr_errors;
pub mod pipeline;
pub mod preprocessing;
pub mod recommendation;
pub mod segmentation;
pub mod tone;

// Re-export types for easier access
pub use config::AppConfig;
pub use errors::{AppError, AppResult, ClassificationError, SearchError};
pub use image_search::{ImageCandidate, ImageSearch, LocalImageIndex};
pub use keywords::{KeywordResolver, KeywordSet, KeywordTable};
pub use llm::{GeminiClient, LanguageModel, LlmConfig};
pub use ocr::{TesseractRecognizer, TextExtractor, TextRecognizer};
pub use pipeline::{PipelineComponents, ReactionPipeline, RecommendationReport};
pub use preprocessing::{ImageNormalizer, ImageSource, NormalizedBitmap, NormalizerConfig};
pub use recommendation::{RecommendationConfig, RecommendationEngine, RecommendationResult};
pub use segmentation::LineSegmenter;
pub use tone::{ToneClassifier, ToneProfile};
