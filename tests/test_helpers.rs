//! # Test Helper Library
//!
//! Counting stand-ins for the three external collaborators (OCR engine,
//! language model, image search) and a screenshot fixture writer, shared by
//! the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use image::{GrayImage, Luma};
use parking_lot::Mutex;

use reaction_finder::errors::{ClassificationError, SearchError};
use reaction_finder::image_search::{ImageCandidate, ImageSearch};
use reaction_finder::keywords::KeywordTable;
use reaction_finder::llm::LanguageModel;
use reaction_finder::ocr::TextRecognizer;
use reaction_finder::ocr_errors::OcrError;
use reaction_finder::pipeline::{PipelineComponents, ReactionPipeline};
use reaction_finder::preprocessing::{ImageNormalizer, NormalizedBitmap};
use reaction_finder::recommendation::RecommendationConfig;
use reaction_finder::segmentation::LineSegmenter;

/// Recognizer returning fixed text
pub struct MockRecognizer {
    text: Option<String>,
    calls: AtomicUsize,
}

impl MockRecognizer {
    pub fn returning(text: &str) -> Arc<Self> {
        Arc::new(Self {
            text: Some(text.to_string()),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            text: None,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextRecognizer for MockRecognizer {
    async fn recognize(&self, _bitmap: &NormalizedBitmap, _language_hint: &str) -> Result<String, OcrError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.text
            .clone()
            .ok_or_else(|| OcrError::Extraction("engine unavailable".to_string()))
    }
}

/// Language model returning a scripted reply and recording prompts
pub struct MockModel {
    reply: Option<String>,
    prompts: Mutex<Vec<String>>,
}

impl MockModel {
    pub fn replying(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Some(reply.to_string()),
            prompts: Mutex::new(Vec::new()),
        })
    }

    /// Reply with a well-formed profile
    pub fn with_profile(emotion: &str, tone: &str, intent: &str) -> Arc<Self> {
        Self::replying(&format!(
            r#"{{"emotion": "{}", "tone": "{}", "intent": "{}", "confidence": 0.9}}"#,
            emotion, tone, intent
        ))
    }

    pub fn unreachable() -> Arc<Self> {
        Arc::new(Self {
            reply: None,
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().len()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }
}

#[async_trait]
impl LanguageModel for MockModel {
    async fn generate(&self, prompt: &str) -> Result<String, ClassificationError> {
        self.prompts.lock().push(prompt.to_string());
        self.reply
            .clone()
            .ok_or_else(|| ClassificationError::Request("connection refused".to_string()))
    }

    fn model(&self) -> &str {
        "mock-model"
    }
}

/// Image search answering from a keyword table
#[derive(Default)]
pub struct MockSearch {
    results: HashMap<String, Vec<ImageCandidate>>,
    fail: bool,
    queries: Mutex<Vec<(String, bool, usize)>>,
}

impl MockSearch {
    pub fn with_results(entries: &[(&str, &[&str])]) -> Arc<Self> {
        let results = entries
            .iter()
            .map(|(keyword, refs)| {
                (
                    keyword.to_string(),
                    refs.iter().map(|r| ImageCandidate::new(*r)).collect(),
                )
            })
            .collect();
        Arc::new(Self {
            results,
            ..Default::default()
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail: true,
            ..Default::default()
        })
    }

    pub fn calls(&self) -> usize {
        self.queries.lock().len()
    }

    pub fn keywords(&self) -> Vec<String> {
        self.queries.lock().iter().map(|(k, _, _)| k.clone()).collect()
    }

    pub fn queries(&self) -> Vec<(String, bool, usize)> {
        self.queries.lock().clone()
    }
}

#[async_trait]
impl ImageSearch for MockSearch {
    async fn search(
        &self,
        keyword: &str,
        download: bool,
        max_results: usize,
    ) -> Result<Vec<ImageCandidate>, SearchError> {
        self.queries
            .lock()
            .push((keyword.to_string(), download, max_results));
        if self.fail {
            return Err(SearchError::Backend("index offline".to_string()));
        }
        Ok(self.results.get(keyword).cloned().unwrap_or_default())
    }
}

/// Keyword table used across integration tests
pub fn test_keyword_table() -> KeywordTable {
    KeywordTable::from_json(
        r#"{
            "angry": ["annoyed", "rage"],
            "happy": ["happy"],
            "生氣": ["生氣", "翻桌"],
            "開心": ["開心"]
        }"#,
        "笑",
    )
    .unwrap()
}

/// Pipeline over mock collaborators with default settings
pub fn mock_pipeline(
    recognizer: Arc<MockRecognizer>,
    model: Arc<MockModel>,
    search: Arc<MockSearch>,
) -> ReactionPipeline {
    mock_pipeline_with(recognizer, model, search, RecommendationConfig::default())
}

pub fn mock_pipeline_with(
    recognizer: Arc<MockRecognizer>,
    model: Arc<MockModel>,
    search: Arc<MockSearch>,
    recommendation: RecommendationConfig,
) -> ReactionPipeline {
    ReactionPipeline::new(PipelineComponents {
        normalizer: ImageNormalizer::default(),
        recognizer,
        language_hint: "chi_sim+eng".to_string(),
        segmenter: LineSegmenter::default(),
        language_model: model,
        keyword_table: Arc::new(test_keyword_table()),
        image_search: search,
        recommendation,
    })
}

/// Write a light-mode chat-like PNG into `dir`
///
/// White background with a few dark horizontal bars standing in for text.
pub fn write_screenshot(dir: &Path, name: &str) -> PathBuf {
    let mut image = GrayImage::from_pixel(120, 80, Luma([245]));
    for row in [15u32, 35, 55] {
        for y in row..row + 6 {
            for x in 10..100 {
                image.put_pixel(x, y, Luma([20]));
            }
        }
    }
    let path = dir.join(name);
    image.save(&path).unwrap();
    path
}
