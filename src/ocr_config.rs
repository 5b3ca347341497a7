//! # OCR Configuration Module
//!
//! This module defines configuration structures for the Tesseract OCR collaborator:
//! languages, page segmentation, model selection and input size limits.

// Constants for OCR configuration
pub const DEFAULT_LANGUAGES: &str = "eng";
pub const MAX_FILE_SIZE: u64 = 20 * 1024 * 1024; // 20MB limit for source images

/// Page Segmentation Mode for Tesseract OCR
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PageSegMode {
    /// Automatic page segmentation with OSD
    AutoOsd = 1,
    /// Fully automatic page segmentation
    #[default]
    Auto = 3,
    /// Assume a single column of text
    SingleColumn = 4,
    /// Assume a single uniform block of text
    SingleBlock = 6,
    /// Treat the image as a single text line
    SingleLine = 7,
    /// Treat the image as a single word
    SingleWord = 8,
    /// Find as much text as possible in no particular order
    SparseText = 11,
    /// Sparse text with OSD
    SparseTextOsd = 12,
}

impl PageSegMode {
    /// Convert PSM mode to string value for Tesseract
    pub fn as_str(&self) -> &'static str {
        match self {
            PageSegMode::AutoOsd => "1",
            PageSegMode::Auto => "3",
            PageSegMode::SingleColumn => "4",
            PageSegMode::SingleBlock => "6",
            PageSegMode::SingleLine => "7",
            PageSegMode::SingleWord => "8",
            PageSegMode::SparseText => "11",
            PageSegMode::SparseTextOsd => "12",
        }
    }

    /// Parse the numeric Tesseract value
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "1" => Some(PageSegMode::AutoOsd),
            "3" => Some(PageSegMode::Auto),
            "4" => Some(PageSegMode::SingleColumn),
            "6" => Some(PageSegMode::SingleBlock),
            "7" => Some(PageSegMode::SingleLine),
            "8" => Some(PageSegMode::SingleWord),
            "11" => Some(PageSegMode::SparseText),
            "12" => Some(PageSegMode::SparseTextOsd),
            _ => None,
        }
    }
}

/// Tesseract model type for different accuracy/speed trade-offs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModelType {
    /// Fast model (tessdata_fast) - faster processing, lower accuracy
    #[default]
    Fast,
    /// Best model (tessdata_best) - slower processing, higher accuracy
    Best,
}

impl ModelType {
    /// Get the tessdata directory name for this model type
    pub fn tessdata_dir(&self) -> &'static str {
        match self {
            ModelType::Fast => "tessdata_fast",
            ModelType::Best => "tessdata_best",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "fast" => Some(ModelType::Fast),
            "best" => Some(ModelType::Best),
            _ => None,
        }
    }
}

/// Configuration for OCR processing
#[derive(Debug, Clone, PartialEq)]
pub struct OcrConfig {
    /// OCR language codes (e.g., "eng", "eng+fra")
    pub languages: String,
    /// Page segmentation mode
    pub psm_mode: PageSegMode,
    /// Tesseract model type
    pub model_type: ModelType,
    /// Optional character whitelist passed to Tesseract
    pub character_whitelist: Option<String>,
    /// Maximum source image file size in bytes
    pub max_file_size: u64,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            languages: DEFAULT_LANGUAGES.to_string(),
            psm_mode: PageSegMode::default(),
            model_type: ModelType::default(),
            character_whitelist: None,
            max_file_size: MAX_FILE_SIZE,
        }
    }
}

impl OcrConfig {
    /// Validate OCR configuration parameters
    pub fn validate(&self) -> crate::errors::AppResult<()> {
        if self.languages.trim().is_empty() {
            return Err(crate::errors::AppError::Config(
                "OCR languages cannot be empty".to_string(),
            ));
        }
        if self
            .languages
            .split('+')
            .any(|lang| lang.is_empty() || !lang.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'))
        {
            return Err(crate::errors::AppError::Config(format!(
                "OCR languages '{}' must be '+'-separated Tesseract language codes",
                self.languages
            )));
        }
        if self.max_file_size == 0 {
            return Err(crate::errors::AppError::Config(
                "max_file_size must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ocr_config_defaults() {
        let config = OcrConfig::default();
        assert_eq!(config.languages, "eng");
        assert_eq!(config.psm_mode, PageSegMode::Auto);
        assert_eq!(config.model_type, ModelType::Fast);
        assert_eq!(config.max_file_size, 20 * 1024 * 1024);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_ocr_config_rejects_bad_languages() {
        let config = OcrConfig {
            languages: "eng++fra".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = OcrConfig {
            languages: "   ".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_page_seg_mode_round_trip_values() {
        assert_eq!(PageSegMode::parse("6"), Some(PageSegMode::SingleBlock));
        assert_eq!(PageSegMode::SingleBlock.as_str(), "6");
        assert_eq!(PageSegMode::parse("99"), None);
    }

    #[test]
    fn test_model_type_parse() {
        assert_eq!(ModelType::parse("BEST"), Some(ModelType::Best));
        assert_eq!(ModelType::parse("fast"), Some(ModelType::Fast));
        assert_eq!(ModelType::parse("medium"), None);
        assert_eq!(ModelType::Best.tessdata_dir(), "tessdata_best");
    }
}
