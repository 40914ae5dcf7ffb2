//! # OCR Instance Manager Module
//!
//! Thread-safe pool of Tesseract instances, one per language/model
//! combination. Creating a Tesseract instance loads the trained data for every
//! language in the hint, which is far slower than a recognition pass.

use std::collections::HashMap;
use std::sync::Arc;

use leptess::LepTess;
use parking_lot::Mutex;
use tracing::info;

use crate::ocr_config::{ModelType, OcrConfig};

/// Shared handle to one Tesseract instance.
pub type SharedTesseract = Arc<Mutex<LepTess>>;

/// Thread-safe OCR instance manager for reusing Tesseract instances
///
/// - Instances are created on first request for a language combination
/// - Instances are reused for subsequent requests with the same configuration
/// - An instance that failed mid-recognition can be evicted with [`remove_instance`]
///
/// [`remove_instance`]: OcrInstanceManager::remove_instance
pub struct OcrInstanceManager {
    instances: Mutex<HashMap<String, SharedTesseract>>,
}

impl OcrInstanceManager {
    /// Create a new, empty OCR instance manager
    pub fn new() -> Self {
        Self {
            instances: Mutex::new(HashMap::new()),
        }
    }

    fn instance_key(config: &OcrConfig) -> String {
        format!("{}:{}", config.languages, config.model_type.tessdata_dir())
    }

    /// Get or create an OCR instance for the given configuration
    ///
    /// # Errors
    ///
    /// Returns error if Tesseract instance creation fails (e.g., trained data
    /// for one of the languages is not installed)
    pub fn get_instance(&self, config: &OcrConfig) -> anyhow::Result<SharedTesseract> {
        let key = Self::instance_key(config);

        if let Some(instance) = self.instances.lock().get(&key) {
            return Ok(Arc::clone(instance));
        }

        info!(
            "Creating new OCR instance for languages: {} with model: {}",
            config.languages,
            config.model_type.tessdata_dir()
        );

        let tessdata_path = config
            .tessdata_path
            .clone()
            .or_else(|| Self::get_tessdata_path(config.model_type));

        let mut tess = LepTess::new(tessdata_path.as_deref(), &config.languages)
            .map_err(|e| anyhow::anyhow!("Failed to initialize Tesseract OCR instance: {}", e))?;

        tess.set_variable(
            leptess::Variable::TesseditPagesegMode,
            config.psm_mode.as_str(),
        )
        .map_err(|e| anyhow::anyhow!("Failed to set PSM mode: {}", e))?;

        // CJK text has no spaces between words; keep Tesseract from inventing them
        if config.language_codes().iter().any(|code| code.starts_with("chi")) {
            tess.set_variable(leptess::Variable::PreserveInterwordSpaces, "1")
                .map_err(|e| anyhow::anyhow!("Failed to set preserve_interword_spaces: {}", e))?;
        }

        let instance = Arc::new(Mutex::new(tess));
        self.instances.lock().insert(key, Arc::clone(&instance));

        Ok(instance)
    }

    /// Get the tessdata path for the specified model type
    ///
    /// Falls back to Tesseract's compiled-in default if no model-specific
    /// directory is installed.
    fn get_tessdata_path(model_type: ModelType) -> Option<String> {
        let possible_paths = match model_type {
            ModelType::Fast => [
                "/usr/share/tesseract-ocr/5/tessdata_fast",
                "/usr/share/tesseract-ocr/4.00/tessdata_fast",
                "/usr/share/tessdata_fast",
                "/usr/local/share/tessdata_fast",
            ],
            ModelType::Best => [
                "/usr/share/tesseract-ocr/5/tessdata_best",
                "/usr/share/tesseract-ocr/4.00/tessdata_best",
                "/usr/share/tessdata_best",
                "/usr/local/share/tessdata_best",
            ],
        };

        for path in possible_paths {
            if std::path::Path::new(path).exists() {
                info!("Using tessdata path: {}", path);
                return Some(path.to_string());
            }
        }

        info!(
            "No specific tessdata path found for model type {:?}, using default",
            model_type
        );
        None
    }

    /// Drop the instance for a configuration so the next request builds a fresh one
    pub fn remove_instance(&self, config: &OcrConfig) {
        let key = Self::instance_key(config);
        if self.instances.lock().remove(&key).is_some() {
            info!(
                "Removed OCR instance for languages: {} with model: {}",
                config.languages,
                config.model_type.tessdata_dir()
            );
        }
    }

    /// Get the number of cached instances
    pub fn instance_count(&self) -> usize {
        self.instances.lock().len()
    }
}

impl Default for OcrInstanceManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_manager_is_empty() {
        let manager = OcrInstanceManager::new();
        assert_eq!(manager.instance_count(), 0);

        // removing an unknown configuration is a no-op
        manager.remove_instance(&OcrConfig::default());
        assert_eq!(manager.instance_count(), 0);
    }

    #[test]
    fn test_instance_key_includes_model() {
        let fast = OcrConfig::default();
        let best = OcrConfig {
            model_type: ModelType::Best,
            ..Default::default()
        };
        assert_ne!(
            OcrInstanceManager::instance_key(&fast),
            OcrInstanceManager::instance_key(&best)
        );
    }
}
