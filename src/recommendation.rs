//! # Recommendation Engine
//!
//! Queries the image search once per keyword, concatenates the results in
//! keyword order, and keeps the first few. An empty result list becomes
//! [`RecommendationResult::NoMatch`], a normal outcome carrying an apology for
//! the user.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info, Instrument};

use crate::errors::{error_logging, AppError, AppResult, SearchError};
use crate::image_search::{ImageCandidate, ImageSearch};
use crate::keywords::KeywordSet;
use crate::observability;

/// Shown when no keyword found any image ("can't find a suitable sticker QQ")
pub const NO_MATCH_MESSAGE: &str = "找不到適合的表情包QQ";

/// Hard cap on results requested per keyword
pub const MAX_RESULTS_PER_KEYWORD: usize = 3;

/// Hard cap on candidates in one [`RecommendationResult`]
pub const MAX_RECOMMENDATIONS: usize = 3;

/// Recommendation configuration
#[derive(Debug, Clone, PartialEq)]
pub struct RecommendationConfig {
    /// Candidates returned to the caller, at most [`MAX_RECOMMENDATIONS`]
    pub max_results: usize,
    /// Candidates requested per keyword, at most [`MAX_RESULTS_PER_KEYWORD`]
    pub per_keyword_results: usize,
    /// Drop repeated references, keeping first-seen rank
    pub deduplicate: bool,
    /// Timeout for one keyword search in seconds
    pub search_timeout_secs: u64,
    /// Apology shown with [`RecommendationResult::NoMatch`]
    pub no_match_message: String,
}

impl Default for RecommendationConfig {
    fn default() -> Self {
        Self {
            max_results: 3,
            per_keyword_results: MAX_RESULTS_PER_KEYWORD,
            deduplicate: false,
            search_timeout_secs: 10,
            no_match_message: NO_MATCH_MESSAGE.to_string(),
        }
    }
}

impl RecommendationConfig {
    pub fn validate(&self) -> AppResult<()> {
        if self.max_results == 0 || self.max_results > MAX_RECOMMENDATIONS {
            return Err(AppError::Config(format!(
                "max_results must be between 1 and {}, got {}",
                MAX_RECOMMENDATIONS, self.max_results
            )));
        }
        if self.per_keyword_results == 0 || self.per_keyword_results > MAX_RESULTS_PER_KEYWORD {
            return Err(AppError::Config(format!(
                "per_keyword_results must be between 1 and {}, got {}",
                MAX_RESULTS_PER_KEYWORD, self.per_keyword_results
            )));
        }
        if self.search_timeout_secs == 0 {
            return Err(AppError::Config(
                "search_timeout_secs must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Terminal output of a request
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RecommendationResult {
    Matches { candidates: Vec<ImageCandidate> },
    NoMatch { message: String },
}

impl RecommendationResult {
    pub fn no_match() -> Self {
        RecommendationResult::NoMatch {
            message: NO_MATCH_MESSAGE.to_string(),
        }
    }

    pub fn is_no_match(&self) -> bool {
        matches!(self, RecommendationResult::NoMatch { .. })
    }

    /// Matched candidates, empty for `NoMatch`
    pub fn candidates(&self) -> &[ImageCandidate] {
        match self {
            RecommendationResult::Matches { candidates } => candidates,
            RecommendationResult::NoMatch { .. } => &[],
        }
    }
}

/// Recommendation Engine
pub struct RecommendationEngine {
    search: Arc<dyn ImageSearch>,
    config: RecommendationConfig,
}

impl RecommendationEngine {
    pub fn new(search: Arc<dyn ImageSearch>, config: RecommendationConfig) -> Self {
        Self { search, config }
    }

    pub fn config(&self) -> &RecommendationConfig {
        &self.config
    }

    /// Sentinel result carrying the configured apology
    pub fn no_match(&self) -> RecommendationResult {
        RecommendationResult::NoMatch {
            message: self.config.no_match_message.clone(),
        }
    }

    /// Search every keyword in order and rank the concatenated results
    ///
    /// # Errors
    ///
    /// `AppError::Search` when a search fails or exceeds its timeout.
    pub async fn recommend(&self, keywords: &KeywordSet) -> AppResult<RecommendationResult> {
        let start_time = Instant::now();
        let per_keyword = self.config.per_keyword_results.min(MAX_RESULTS_PER_KEYWORD);
        let mut collected: Vec<ImageCandidate> = Vec::new();

        for keyword in keywords.iter() {
            let results = self.search_keyword(keyword, per_keyword).await?;
            debug!(keyword = %keyword, results = results.len(), "Keyword searched");
            // the collaborator is trusted for order, not for the cap
            collected.extend(results.into_iter().take(per_keyword));
        }

        if self.config.deduplicate {
            let mut seen = HashSet::new();
            collected.retain(|candidate| seen.insert(candidate.reference.clone()));
        }

        let result = if collected.is_empty() {
            self.no_match()
        } else {
            collected.truncate(self.config.max_results.min(MAX_RECOMMENDATIONS));
            RecommendationResult::Matches {
                candidates: collected,
            }
        };

        observability::record_recommendation_metrics(
            !result.is_no_match(),
            result.candidates().len(),
            start_time.elapsed(),
        );
        info!(
            keywords = keywords.len(),
            recommended = result.candidates().len(),
            no_match = result.is_no_match(),
            "Recommendation ranked"
        );
        Ok(result)
    }

    async fn search_keyword(
        &self,
        keyword: &str,
        max_results: usize,
    ) -> Result<Vec<ImageCandidate>, SearchError> {
        let start_time = Instant::now();
        let timeout = Duration::from_secs(self.config.search_timeout_secs);
        let span = observability::search_span(keyword);

        let outcome = tokio::time::timeout(timeout, self.search.search(keyword, false, max_results))
            .instrument(span)
            .await;

        let result = match outcome {
            Ok(result) => result,
            Err(_) => Err(SearchError::Timeout(format!(
                "search for '{}' exceeded {} seconds",
                keyword, self.config.search_timeout_secs
            ))),
        };

        observability::record_search_metrics(
            result.is_ok(),
            result.as_ref().map_or(0, Vec::len),
            start_time.elapsed(),
        );
        if let Err(err) = &result {
            error_logging::log_search_error(err, "search_keyword", keyword, Some(max_results));
        }
        result
    }
}
