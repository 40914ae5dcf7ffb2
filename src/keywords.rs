//! # Keyword Resolution Module
//!
//! Maps tone tags to image search keywords through a static mapping table.
//!
//! The table is a JSON object of tag → ordered keyword list, loaded once at
//! startup and never mutated afterwards, so it can be shared between
//! concurrent requests behind an `Arc` without locking.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info};

use crate::errors::{error_logging, AppError, AppResult};
use crate::tone::ToneProfile;

pub const DEFAULT_MAPPING_PATH: &str = "config/keyword_mapping.json";
/// "Smile": the keyword searched when no tag maps to anything
pub const DEFAULT_FALLBACK_KEYWORD: &str = "笑";

/// Keyword table configuration
#[derive(Debug, Clone, PartialEq)]
pub struct KeywordConfig {
    pub mapping_path: PathBuf,
    pub fallback_keyword: String,
}

impl Default for KeywordConfig {
    fn default() -> Self {
        Self {
            mapping_path: PathBuf::from(DEFAULT_MAPPING_PATH),
            fallback_keyword: DEFAULT_FALLBACK_KEYWORD.to_string(),
        }
    }
}

impl KeywordConfig {
    pub fn validate(&self) -> AppResult<()> {
        if self.fallback_keyword.trim().is_empty() {
            return Err(AppError::Config("fallback keyword cannot be empty".to_string()));
        }
        if self.mapping_path.as_os_str().is_empty() {
            return Err(AppError::Config("keyword mapping path cannot be empty".to_string()));
        }
        Ok(())
    }
}

/// Ordered keyword collection without duplicates, first occurrence wins
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(transparent)]
pub struct KeywordSet {
    keywords: Vec<String>,
}

impl KeywordSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `keyword` unless it is already present; returns whether it was added
    pub fn insert(&mut self, keyword: impl Into<String>) -> bool {
        let keyword = keyword.into();
        if self.keywords.contains(&keyword) {
            return false;
        }
        self.keywords.push(keyword);
        true
    }

    pub fn len(&self) -> usize {
        self.keywords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.keywords.iter().map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.keywords
    }
}

impl<S: Into<String>> FromIterator<S> for KeywordSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = KeywordSet::new();
        for keyword in iter {
            set.insert(keyword);
        }
        set
    }
}

impl<'a> IntoIterator for &'a KeywordSet {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.keywords.iter()
    }
}

/// Immutable tag → keywords table
#[derive(Debug, Clone, PartialEq)]
pub struct KeywordTable {
    mapping: HashMap<String, Vec<String>>,
    fallback: String,
}

impl KeywordTable {
    /// Build a table from an in-memory mapping
    ///
    /// Tags and keywords are trimmed. A blank keyword, or two tags that trim
    /// to the same text, is a configuration error.
    pub fn from_map(
        mapping: HashMap<String, Vec<String>>,
        fallback: impl Into<String>,
    ) -> AppResult<Self> {
        let fallback: String = fallback.into();
        let fallback = fallback.trim().to_string();
        if fallback.is_empty() {
            return Err(AppError::Config("fallback keyword cannot be empty".to_string()));
        }

        let mut cleaned = HashMap::with_capacity(mapping.len());
        for (tag, keywords) in mapping {
            let tag = tag.trim().to_string();
            if tag.is_empty() {
                continue;
            }
            let mut list = Vec::with_capacity(keywords.len());
            for keyword in keywords {
                let keyword = keyword.trim();
                if keyword.is_empty() {
                    return Err(AppError::Config(format!(
                        "keyword mapping for tag '{}' contains an empty keyword",
                        tag
                    )));
                }
                list.push(keyword.to_string());
            }
            if cleaned.contains_key(&tag) {
                return Err(AppError::Config(format!(
                    "keyword mapping defines tag '{}' more than once after trimming",
                    tag
                )));
            }
            cleaned.insert(tag, list);
        }

        Ok(Self {
            mapping: cleaned,
            fallback,
        })
    }

    /// Parse a table from JSON text
    pub fn from_json(json: &str, fallback: impl Into<String>) -> AppResult<Self> {
        let mapping: HashMap<String, Vec<String>> = serde_json::from_str(json)
            .map_err(|e| AppError::Config(format!("keyword mapping is not a tag → [keywords] object: {}", e)))?;
        Self::from_map(mapping, fallback)
    }

    /// Load the table from disk
    ///
    /// # Errors
    ///
    /// `AppError::Config` when the file is missing, unreadable or malformed.
    pub fn load(path: impl AsRef<Path>, fallback: impl Into<String>) -> AppResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            error_logging::log_filesystem_error(&e, "read_keyword_mapping", path.to_str(), None);
            AppError::Config(format!(
                "cannot read keyword mapping '{}': {}",
                path.display(),
                e
            ))
        })?;

        let table = Self::from_json(&json, fallback).map_err(|e| {
            error_logging::log_config_error(&e, "KEYWORD_MAPPING_PATH", "parse_keyword_mapping");
            e
        })?;

        info!(
            path = %path.display(),
            tags = table.len(),
            "Loaded keyword mapping"
        );
        Ok(table)
    }

    /// Load using a [`KeywordConfig`]
    pub fn from_config(config: &KeywordConfig) -> AppResult<Self> {
        config.validate()?;
        Self::load(&config.mapping_path, config.fallback_keyword.clone())
    }

    pub fn get(&self, tag: &str) -> Option<&[String]> {
        self.mapping.get(tag.trim()).map(Vec::as_slice)
    }

    pub fn fallback(&self) -> &str {
        &self.fallback
    }

    /// Number of tags
    pub fn len(&self) -> usize {
        self.mapping.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mapping.is_empty()
    }
}

/// Keyword Resolver
#[derive(Debug, Clone, Copy)]
pub struct KeywordResolver<'a> {
    table: &'a KeywordTable,
}

impl<'a> KeywordResolver<'a> {
    pub fn new(table: &'a KeywordTable) -> Self {
        Self { table }
    }

    /// Resolve a profile to keywords
    ///
    /// Emotion, then tone, then intent contribute their mapped keywords in
    /// table order. When nothing matches, the set is the single fallback
    /// keyword.
    pub fn resolve(&self, profile: &ToneProfile) -> KeywordSet {
        let mut keywords = KeywordSet::new();

        for tag in profile.tags() {
            if tag.trim().is_empty() {
                continue;
            }
            if let Some(mapped) = self.table.get(tag) {
                for keyword in mapped {
                    keywords.insert(keyword.as_str());
                }
            }
        }

        if keywords.is_empty() {
            debug!(
                emotion = %profile.emotion,
                tone = %profile.tone,
                intent = %profile.intent,
                fallback = %self.table.fallback(),
                "No tag matched the keyword mapping, using fallback"
            );
            keywords.insert(self.table.fallback());
        }

        keywords
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn table(json: &str) -> KeywordTable {
        KeywordTable::from_json(json, DEFAULT_FALLBACK_KEYWORD).unwrap()
    }

    fn profile(emotion: &str, tone: &str, intent: &str) -> ToneProfile {
        ToneProfile {
            emotion: emotion.into(),
            tone: tone.into(),
            intent: intent.into(),
            confidence: 0.5,
        }
    }

    #[test]
    fn test_single_tag_lookup() {
        let table = table(r#"{"angry": ["annoyed", "rage"]}"#);
        let keywords = KeywordResolver::new(&table).resolve(&profile("angry", "", ""));
        assert_eq!(keywords.as_slice(), ["annoyed", "rage"]);
    }

    #[test]
    fn test_priority_and_first_seen_wins() {
        let table = table(
            r#"{
                "生氣": ["崩潰", "不爽"],
                "諷刺": ["不爽", "白眼"],
                "拒絕": ["不要", "崩潰"]
            }"#,
        );
        let keywords = KeywordResolver::new(&table).resolve(&profile("生氣", "諷刺", "拒絕"));
        assert_eq!(keywords.as_slice(), ["崩潰", "不爽", "白眼", "不要"]);
    }

    #[test]
    fn test_intent_only_match() {
        let table = table(r#"{"詢問": ["疑問"]}"#);
        let keywords = KeywordResolver::new(&table).resolve(&profile("冷淡", "敷衍", "詢問"));
        assert_eq!(keywords.as_slice(), ["疑問"]);
    }

    #[test]
    fn test_fallback_when_nothing_matches() {
        let table = table(r#"{"angry": ["rage"]}"#);
        let resolver = KeywordResolver::new(&table);

        for p in [
            ToneProfile::default(),
            profile("happy", "casual", "share"),
            profile("ANGRY", "", ""),
        ] {
            assert_eq!(resolver.resolve(&p).as_slice(), [DEFAULT_FALLBACK_KEYWORD]);
        }
    }

    #[test]
    fn test_tags_are_trimmed() {
        let table = table(r#"{" angry ": ["rage"]}"#);
        let keywords = KeywordResolver::new(&table).resolve(&profile("angry ", "", ""));
        assert_eq!(keywords.as_slice(), ["rage"]);
    }

    #[test]
    fn test_tags_colliding_after_trim_are_rejected() {
        let result = KeywordTable::from_json(r#"{"angry": ["rage"], " angry": ["annoyed"]}"#, "笑");
        assert!(matches!(result, Err(AppError::Config(msg)) if msg.contains("angry")));

        let result = KeywordTable::from_map(
            HashMap::from([
                ("生氣 ".to_string(), vec!["翻桌".to_string()]),
                ("\t生氣".to_string(), vec!["崩潰".to_string()]),
            ]),
            "笑",
        );
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn test_duplicate_tags_in_profile() {
        let table = table(r#"{"開心": ["笑", "開心"]}"#);
        let keywords = KeywordResolver::new(&table).resolve(&profile("開心", "開心", "開心"));
        assert_eq!(keywords.as_slice(), ["笑", "開心"]);
    }

    #[test]
    fn test_malformed_mapping_is_config_error() {
        for json in [
            "not json",
            r#"["angry"]"#,
            r#"{"angry": "rage"}"#,
            r#"{"angry": ["rage", "  "]}"#,
        ] {
            assert!(
                matches!(KeywordTable::from_json(json, "笑"), Err(AppError::Config(_))),
                "accepted {json}"
            );
        }
        assert!(matches!(
            KeywordTable::from_json("{}", " "),
            Err(AppError::Config(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"傲嬌": ["哼", "才不是"]}}"#).unwrap();

        let table = KeywordTable::load(file.path(), "笑").unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.get("傲嬌"), Some(&["哼".to_string(), "才不是".to_string()][..]));
        assert_eq!(table.fallback(), "笑");
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = KeywordTable::load(dir.path().join("missing.json"), "笑");
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn test_keyword_set_deduplicates() {
        let set: KeywordSet = ["a", "b", "a", "c", "b"].into_iter().collect();
        assert_eq!(set.as_slice(), ["a", "b", "c"]);
        assert_eq!(set.len(), 3);
        assert_eq!(serde_json::to_string(&set).unwrap(), r#"["a","b","c"]"#);
    }

    #[test]
    fn test_shipped_mapping_parses() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join(DEFAULT_MAPPING_PATH);
        let table = KeywordTable::load(path, DEFAULT_FALLBACK_KEYWORD).unwrap();
        assert!(!table.is_empty());
    }
}
