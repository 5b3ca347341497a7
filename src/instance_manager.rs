//! # OCR Instance Manager Module
//!
//! This module provides thread-safe OCR instance management for reusing Tesseract instances.
//! A strategy sweep calls OCR once per (image, strategy) pair, so reusing instances avoids
//! paying the Tesseract initialization cost on every call.

use leptess::LepTess;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use crate::ocr_config::{ModelType, OcrConfig};

/// Thread-safe OCR instance manager for reusing Tesseract instances
///
/// Manages a pool of Tesseract OCR instances keyed by language and model
/// configuration. Instances are created on first request and reused afterwards.
///
/// # Thread Safety
///
/// Each instance sits behind its own mutex, so parallel image processing
/// serializes on the engine while transforms still run concurrently.
pub struct OcrInstanceManager {
    instances: Mutex<HashMap<String, Arc<Mutex<LepTess>>>>,
}

impl OcrInstanceManager {
    /// Create a new OCR instance manager
    ///
    /// # Examples
    ///
    /// ```rust
    /// use ocr_strategy_eval::instance_manager::OcrInstanceManager;
    ///
    /// let manager = OcrInstanceManager::new();
    /// assert_eq!(manager.instance_count(), 0);
    /// ```
    pub fn new() -> Self {
        Self {
            instances: Mutex::new(HashMap::new()),
        }
    }

    fn instance_key(languages: &str, model_type: ModelType) -> String {
        format!("{}:{}", languages, model_type.tessdata_dir())
    }

    /// Get or create an OCR instance for the given configuration
    ///
    /// # Errors
    ///
    /// Returns error if Tesseract instance creation fails (e.g., invalid language codes
    /// or missing traineddata files)
    pub fn get_instance(&self, config: &OcrConfig) -> anyhow::Result<Arc<Mutex<LepTess>>> {
        let key = Self::instance_key(&config.languages, config.model_type);

        if let Some(instance) = self.instances.lock().get(&key) {
            return Ok(Arc::clone(instance));
        }

        info!(
            languages = %config.languages,
            model = config.model_type.tessdata_dir(),
            psm = config.psm_mode.as_str(),
            "Initializing Tesseract instance"
        );

        let tessdata_path = Self::find_tessdata_dir(config.model_type);
        let mut tess = LepTess::new(tessdata_path.as_deref(), &config.languages).map_err(|e| {
            anyhow::anyhow!("Tesseract could not load '{}': {}", config.languages, e)
        })?;

        tess.set_variable(leptess::Variable::TesseditPagesegMode, config.psm_mode.as_str())
            .map_err(|e| anyhow::anyhow!("Tesseract rejected page segmentation mode: {}", e))?;
        if let Some(whitelist) = &config.character_whitelist {
            tess.set_variable(leptess::Variable::TesseditCharWhitelist, whitelist)
                .map_err(|e| anyhow::anyhow!("Tesseract rejected character whitelist: {}", e))?;
        }

        let instance = Arc::new(Mutex::new(tess));

        // Another thread may have raced us here; keep whichever instance landed first
        let mut instances = self.instances.lock();
        let stored = instances
            .entry(key)
            .or_insert_with(|| Arc::clone(&instance));
        Ok(Arc::clone(stored))
    }

    /// Locate the tessdata directory of `model_type` under the usual install roots.
    ///
    /// `None` lets Tesseract use its compiled-in default.
    fn find_tessdata_dir(model_type: ModelType) -> Option<String> {
        const ROOTS: [&str; 4] = [
            "/usr/share/tesseract-ocr/5",
            "/usr/share/tesseract-ocr/4.00",
            "/usr/share",
            "/usr/local/share",
        ];

        let found = ROOTS
            .iter()
            .map(|root| Path::new(root).join(model_type.tessdata_dir()))
            .find(|dir| dir.is_dir())
            .map(|dir| dir.to_string_lossy().into_owned());

        match &found {
            Some(dir) => debug!(tessdata = %dir, "Using model-specific tessdata"),
            None => debug!(model = ?model_type, "No model-specific tessdata, using default"),
        }
        found
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
    fn test_instance_key_separates_models() {
        let fast = OcrInstanceManager::instance_key("eng", ModelType::Fast);
        let best = OcrInstanceManager::instance_key("eng", ModelType::Best);
        assert_ne!(fast, best);
        assert_eq!(fast, "eng:tessdata_fast");
    }

    #[test]
    fn test_missing_tessdata_falls_back_to_default() {
        if let Some(dir) = OcrInstanceManager::find_tessdata_dir(ModelType::Best) {
            assert!(dir.ends_with("tessdata_best"));
        }
    }
}
