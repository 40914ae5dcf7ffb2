//! # Recommendation Pipeline
//!
//! Chains the stages for one screenshot:
//!
//! ```text
//! ImageSource → ImageNormalizer → TextExtractor → LineSegmenter
//!             → ToneClassifier → KeywordResolver → RecommendationEngine
//! ```
//!
//! Every intermediate value is owned by the request. The only state shared
//! between requests is read-only (the keyword table, the OCR instance pool and
//! the HTTP client), so one pipeline can serve concurrent requests.
//!
//! Failure policy per stage:
//!
//! | Stage | On failure |
//! |-------|------------|
//! | decode | `AppError::NotFound`, OCR never runs |
//! | OCR | empty text, the request continues |
//! | classifier | `AppError::Classification`, no keyword lookup |
//! | search | `AppError::Search` |
//!
//! Dropping the returned future cancels the request; a blocking OCR pass that
//! is already running finishes on its worker thread and is discarded.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{info, Instrument};

use crate::config::AppConfig;
use crate::errors::{AppError, AppResult};
use crate::image_search::{ImageSearch, LocalImageIndex};
use crate::keywords::{KeywordResolver, KeywordSet, KeywordTable};
use crate::llm::{GeminiClient, LanguageModel};
use crate::observability;
use crate::ocr::{TesseractRecognizer, TextExtractor, TextRecognizer};
use crate::preprocessing::{ImageNormalizer, ImageSource, NormalizedBitmap};
use crate::recommendation::{RecommendationConfig, RecommendationEngine, RecommendationResult};
use crate::segmentation::LineSegmenter;
use crate::tone::{ToneClassifier, ToneProfile};

/// Collaborators and settings needed to assemble a [`ReactionPipeline`]
pub struct PipelineComponents {
    pub normalizer: ImageNormalizer,
    pub recognizer: Arc<dyn TextRecognizer>,
    pub language_hint: String,
    pub segmenter: LineSegmenter,
    pub language_model: Arc<dyn LanguageModel>,
    pub keyword_table: Arc<KeywordTable>,
    pub image_search: Arc<dyn ImageSearch>,
    pub recommendation: RecommendationConfig,
}

/// Everything a request produced, for display
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecommendationReport {
    pub lines: Vec<String>,
    /// `None` when there was no text to classify
    pub tone: Option<ToneProfile>,
    pub keywords: KeywordSet,
    pub result: RecommendationResult,
}

/// Screenshot → reaction image pipeline
pub struct ReactionPipeline {
    normalizer: ImageNormalizer,
    extractor: TextExtractor,
    segmenter: LineSegmenter,
    classifier: ToneClassifier,
    keyword_table: Arc<KeywordTable>,
    engine: RecommendationEngine,
}

impl ReactionPipeline {
    pub fn new(components: PipelineComponents) -> Self {
        let PipelineComponents {
            normalizer,
            recognizer,
            language_hint,
            segmenter,
            language_model,
            keyword_table,
            image_search,
            recommendation,
        } = components;

        Self {
            normalizer,
            extractor: TextExtractor::new(recognizer, language_hint),
            segmenter,
            classifier: ToneClassifier::new(language_model),
            keyword_table,
            engine: RecommendationEngine::new(image_search, recommendation),
        }
    }

    /// Assemble the production pipeline: Tesseract, Gemini and the local image index
    ///
    /// # Errors
    ///
    /// `AppError::Config` when the configuration is invalid or the keyword
    /// mapping or image index cannot be loaded.
    pub fn from_config(config: &AppConfig) -> AppResult<Self> {
        config.validate()?;

        let keyword_table = KeywordTable::from_config(&config.keywords)?;
        let image_search = LocalImageIndex::from_config(&config.search)?;
        let language_model = GeminiClient::new(config.llm.clone())?;

        info!(
            mappings = keyword_table.len(),
            images = image_search.len(),
            model = %config.llm.model,
            "Pipeline assembled"
        );

        Ok(Self::new(PipelineComponents {
            normalizer: ImageNormalizer::new(config.normalizer.clone()),
            recognizer: Arc::new(TesseractRecognizer::new(config.ocr.clone())),
            language_hint: config.ocr.languages.clone(),
            segmenter: LineSegmenter::default(),
            language_model: Arc::new(language_model),
            keyword_table: Arc::new(keyword_table),
            image_search: Arc::new(image_search),
            recommendation: config.recommendation.clone(),
        }))
    }

    /// Decode and normalize on the blocking pool
    async fn normalize(&self, source: ImageSource) -> AppResult<NormalizedBitmap> {
        let normalizer = self.normalizer.clone();
        tokio::task::spawn_blocking(move || normalizer.normalize_source(&source))
            .await
            .map_err(|e| AppError::Internal(format!("normalizer task failed: {}", e)))?
            .map_err(AppError::from)
    }

    /// Screenshot to utterance lines
    ///
    /// # Errors
    ///
    /// `AppError::NotFound` when the source cannot be opened or decoded. OCR
    /// failures are not errors: they produce no lines.
    pub async fn extract_lines(
        &self,
        source: impl Into<ImageSource>,
        language_hint: Option<&str>,
    ) -> AppResult<Vec<String>> {
        let source = source.into();
        let span = observability::pipeline_span("extract_lines");

        async move {
            let bitmap = self.normalize(source).await?;
            let text = match language_hint {
                Some(hint) => self.extractor.extract_with_hint(&bitmap, hint).await,
                None => self.extractor.extract(&bitmap).await,
            };
            let lines = self.segmenter.segment(&text);
            info!(characters = text.chars().count(), lines = lines.len(), "Extracted chat lines");
            Ok(lines)
        }
        .instrument(span)
        .await
    }

    /// Full request: screenshot to recommendations
    pub async fn recommend(
        &self,
        source: impl Into<ImageSource>,
        language_hint: Option<&str>,
    ) -> AppResult<RecommendationReport> {
        let lines = self.extract_lines(source, language_hint).await?;
        self.recommend_lines(lines).await
    }

    /// Recommendations for already extracted lines
    ///
    /// An empty line set skips the classifier and the search and ends in the
    /// no-match result.
    pub async fn recommend_lines(&self, lines: Vec<String>) -> AppResult<RecommendationReport> {
        let span = observability::pipeline_span("recommend");

        async move {
            let start_time = Instant::now();

            if lines.is_empty() {
                info!("No chat text recognized, skipping classification");
                return Ok(RecommendationReport {
                    lines,
                    tone: None,
                    keywords: KeywordSet::new(),
                    result: self.engine.no_match(),
                });
            }

            let profile = self.classifier.classify_lines(&lines).await?;
            let keywords = KeywordResolver::new(&self.keyword_table).resolve(&profile);
            let result = self.engine.recommend(&keywords).await?;

            info!(
                lines = lines.len(),
                keywords = keywords.len(),
                recommended = result.candidates().len(),
                duration_ms = start_time.elapsed().as_millis() as u64,
                "Request completed"
            );

            Ok(RecommendationReport {
                lines,
                tone: Some(profile),
                keywords,
                result,
            })
        }
        .instrument(span)
        .await
    }

    /// Recommendations for raw chat text, bypassing image processing
    pub async fn recommend_text(&self, text: &str) -> AppResult<RecommendationReport> {
        let lines = self.segmenter.segment(text);
        self.recommend_lines(lines).await
    }

    pub fn keyword_table(&self) -> &KeywordTable {
        &self.keyword_table
    }
}
