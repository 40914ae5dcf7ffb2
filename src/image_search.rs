//! # Image Search Module
//!
//! The fuzzy image-search collaborator behind the [`ImageSearch`] trait, and
//! [`LocalImageIndex`], an in-process implementation over captioned reaction
//! images.
//!
//! An index is either a JSON file listing `{"caption", "path"}` entries or a
//! directory of images whose file stems serve as captions. Matching is done on
//! captions:
//!
//! 1. captions containing the keyword, in index order
//! 2. other captions whose normalized Levenshtein similarity to the keyword
//!    reaches the configured threshold, most similar first (index order on ties)

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::errors::{error_logging, AppError, AppResult, SearchError};

pub const DEFAULT_INDEX_PATH: &str = "config/image_index.json";

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp", "bmp"];

/// A pre-indexed reaction image
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ImageCandidate {
    /// Path or identifier of the image
    pub reference: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
}

impl ImageCandidate {
    pub fn new(reference: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
            caption: None,
        }
    }

    pub fn with_caption(reference: impl Into<String>, caption: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
            caption: Some(caption.into()),
        }
    }
}

/// The fuzzy image-search collaborator:
/// `search(keyword, download, max_results) -> ordered candidates`.
#[async_trait]
pub trait ImageSearch: Send + Sync {
    async fn search(
        &self,
        keyword: &str,
        download: bool,
        max_results: usize,
    ) -> Result<Vec<ImageCandidate>, SearchError>;
}

/// Image search configuration
#[derive(Debug, Clone, PartialEq)]
pub struct SearchConfig {
    /// JSON index file or image directory
    pub index_path: PathBuf,
    /// Where `download = true` searches copy their matches
    pub download_dir: Option<PathBuf>,
    /// Minimum normalized similarity for a fuzzy match
    pub min_similarity: f64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            index_path: PathBuf::from(DEFAULT_INDEX_PATH),
            download_dir: None,
            min_similarity: 0.5,
        }
    }
}

impl SearchConfig {
    pub fn validate(&self) -> AppResult<()> {
        if !(0.0..=1.0).contains(&self.min_similarity) {
            return Err(AppError::Config(format!(
                "min_similarity must be between 0.0 and 1.0, got {}",
                self.min_similarity
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
struct IndexEntry {
    caption: String,
    path: PathBuf,
}

/// In-process caption index
#[derive(Debug, Clone)]
pub struct LocalImageIndex {
    entries: Vec<IndexEntry>,
    min_similarity: f64,
    download_dir: Option<PathBuf>,
}

impl LocalImageIndex {
    /// Build an index from `(caption, path)` pairs
    pub fn from_entries<C, P>(entries: impl IntoIterator<Item = (C, P)>) -> Self
    where
        C: Into<String>,
        P: Into<PathBuf>,
    {
        Self {
            entries: entries
                .into_iter()
                .map(|(caption, path)| IndexEntry {
                    caption: caption.into(),
                    path: path.into(),
                })
                .collect(),
            min_similarity: SearchConfig::default().min_similarity,
            download_dir: None,
        }
    }

    pub fn with_min_similarity(mut self, min_similarity: f64) -> Self {
        self.min_similarity = min_similarity;
        self
    }

    pub fn with_download_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.download_dir = Some(dir.into());
        self
    }

    /// Load a JSON index (`[{"caption": "...", "path": "..."}]`)
    ///
    /// Relative image paths are resolved against the index file's directory.
    pub fn from_index_file(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            error_logging::log_filesystem_error(&e, "read_image_index", path.to_str(), None);
            AppError::Config(format!("cannot read image index '{}': {}", path.display(), e))
        })?;

        let mut entries: Vec<IndexEntry> = serde_json::from_str(&json).map_err(|e| {
            AppError::Config(format!("image index '{}' is malformed: {}", path.display(), e))
        })?;

        let base = path.parent().unwrap_or_else(|| Path::new(""));
        for entry in &mut entries {
            if entry.path.is_relative() {
                entry.path = base.join(&entry.path);
            }
        }
        entries.retain(|entry| !entry.caption.trim().is_empty());

        info!(path = %path.display(), entries = entries.len(), "Loaded image index");
        Ok(Self {
            entries,
            min_similarity: SearchConfig::default().min_similarity,
            download_dir: None,
        })
    }

    /// Index every image in `dir`, captioned by file stem
    pub fn from_directory(dir: impl AsRef<Path>) -> AppResult<Self> {
        let dir = dir.as_ref();
        let read_dir = std::fs::read_dir(dir).map_err(|e| {
            error_logging::log_filesystem_error(&e, "read_image_directory", dir.to_str(), None);
            AppError::Config(format!("cannot read image directory '{}': {}", dir.display(), e))
        })?;

        let mut entries = Vec::new();
        for dir_entry in read_dir {
            let path = dir_entry
                .map_err(|e| AppError::Config(format!("cannot list '{}': {}", dir.display(), e)))?
                .path();

            let is_image = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()));
            if !is_image {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                entries.push(IndexEntry {
                    caption: stem.to_string(),
                    path: path.clone(),
                });
            }
        }
        // read_dir order is platform dependent
        entries.sort_by(|a, b| a.path.cmp(&b.path));

        info!(dir = %dir.display(), entries = entries.len(), "Indexed image directory");
        Ok(Self {
            entries,
            min_similarity: SearchConfig::default().min_similarity,
            download_dir: None,
        })
    }

    /// Open the index described by a [`SearchConfig`]
    pub fn from_config(config: &SearchConfig) -> AppResult<Self> {
        config.validate()?;
        let index = if config.index_path.is_dir() {
            Self::from_directory(&config.index_path)?
        } else {
            Self::from_index_file(&config.index_path)?
        };

        let index = index.with_min_similarity(config.min_similarity);
        Ok(match &config.download_dir {
            Some(dir) => index.with_download_dir(dir),
            None => index,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Ranked entries for `keyword`, without truncation
    fn rank(&self, keyword: &str) -> Vec<&IndexEntry> {
        let needle = normalize(keyword);
        if needle.is_empty() {
            return Vec::new();
        }

        let mut contained = Vec::new();
        let mut similar: Vec<(f64, &IndexEntry)> = Vec::new();

        for entry in &self.entries {
            let caption = normalize(&entry.caption);
            if caption.contains(&needle) {
                contained.push(entry);
                continue;
            }
            let score = similarity(&needle, &caption);
            if score >= self.min_similarity {
                similar.push((score, entry));
            }
        }

        // sort_by is stable, ties keep index order
        similar.sort_by(|a, b| b.0.total_cmp(&a.0));
        contained.extend(similar.into_iter().map(|(_, entry)| entry));
        contained
    }

    fn copy_to_download_dir(&self, entry: &IndexEntry, dir: &Path) -> Result<PathBuf, SearchError> {
        std::fs::create_dir_all(dir).map_err(|e| {
            SearchError::Backend(format!("cannot create download directory '{}': {}", dir.display(), e))
        })?;

        let file_name = entry.path.file_name().ok_or_else(|| {
            SearchError::Backend(format!("image path '{}' has no file name", entry.path.display()))
        })?;
        let target = dir.join(file_name);

        std::fs::copy(&entry.path, &target).map_err(|e| {
            error_logging::log_filesystem_error(&e, "copy_reaction_image", entry.path.to_str(), None);
            SearchError::Backend(format!("cannot copy '{}': {}", entry.path.display(), e))
        })?;
        Ok(target)
    }
}

#[async_trait]
impl ImageSearch for LocalImageIndex {
    async fn search(
        &self,
        keyword: &str,
        download: bool,
        max_results: usize,
    ) -> Result<Vec<ImageCandidate>, SearchError> {
        if max_results == 0 {
            return Ok(Vec::new());
        }

        let ranked = self.rank(keyword);
        debug!(keyword = %keyword, matches = ranked.len(), "Ranked index entries");

        let download_dir = match (download, &self.download_dir) {
            (true, Some(dir)) => Some(dir.as_path()),
            (true, None) => {
                warn!("Download requested but no download directory is configured, returning references only");
                None
            }
            (false, _) => None,
        };

        ranked
            .into_iter()
            .take(max_results)
            .map(|entry| -> Result<ImageCandidate, SearchError> {
                let path = match download_dir {
                    Some(dir) => self.copy_to_download_dir(entry, dir)?,
                    None => entry.path.clone(),
                };
                Ok(ImageCandidate::with_caption(
                    path.to_string_lossy(),
                    entry.caption.clone(),
                ))
            })
            .collect()
    }
}

/// Lowercase and drop whitespace so "Good  Job" matches "goodjob"
fn normalize(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Normalized similarity in `[0, 1]`: `1 - distance / max(len)`
pub fn similarity(a: &str, b: &str) -> f64 {
    let longest = a.chars().count().max(b.chars().count());
    if longest == 0 {
        return 1.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let score = 1.0 - levenshtein_distance(a, b) as f64 / longest as f64;
    score
}

/// Calculate Levenshtein distance between two strings, counted in chars
pub fn levenshtein_distance(s1: &str, s2: &str) -> usize {
    let s1_chars: Vec<char> = s1.chars().collect();
    let s2_chars: Vec<char> = s2.chars().collect();

    let len2 = s2_chars.len();
    let mut previous: Vec<usize> = (0..=len2).collect();
    let mut current = vec![0; len2 + 1];

    for (i, c1) in s1_chars.iter().enumerate() {
        current[0] = i + 1;
        for (j, c2) in s2_chars.iter().enumerate() {
            let cost = usize::from(c1 != c2);
            current[j + 1] = (previous[j + 1] + 1)
                .min(current[j] + 1)
                .min(previous[j] + cost);
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous[len2]
}
