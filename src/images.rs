//! # Input Images Module
//!
//! Discovery, validation and loading of the source images of a batch.

use std::path::{Path, PathBuf};

use image::DynamicImage;
use tracing::{debug, info};

use crate::errors::{AppError, AppResult};
use crate::ocr_config::MAX_FILE_SIZE;
use crate::preprocessing::resize_to_max_dimension;

/// File extensions accepted as input images (compared case-insensitively)
pub const SUPPORTED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "tif", "tiff"];

/// Default longest side of a normalized source image
pub const DEFAULT_MAX_DIMENSION: u32 = 2000;

/// Limits applied when loading a source image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageLimits {
    /// Larger images are downscaled so their longest side equals this
    pub max_dimension: u32,
    /// Files larger than this are rejected before decoding
    pub max_file_size: u64,
}

impl Default for ImageLimits {
    fn default() -> Self {
        Self {
            max_dimension: DEFAULT_MAX_DIMENSION,
            max_file_size: MAX_FILE_SIZE,
        }
    }
}

/// Whether `path` has one of the [`SUPPORTED_EXTENSIONS`]
pub fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            SUPPORTED_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// List the supported image files directly inside `dir`, sorted by file name.
pub fn discover_images(dir: &Path) -> AppResult<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(AppError::Input(format!(
            "Input folder does not exist or is not a directory: {}",
            dir.display()
        )));
    }

    let mut images = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && is_supported_image(&path) {
            images.push(path);
        } else {
            debug!(path = %path.display(), "Skipping non-image entry");
        }
    }
    images.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

    info!(dir = %dir.display(), count = images.len(), "Discovered input images");
    Ok(images)
}

/// Validate the file at `path` before decoding.
pub fn validate_image_file(path: &Path, limits: &ImageLimits) -> AppResult<u64> {
    let metadata = std::fs::metadata(path).map_err(|e| {
        AppError::Input(format!("Cannot access image {}: {}", path.display(), e))
    })?;

    if !metadata.is_file() {
        return Err(AppError::Input(format!("Not a file: {}", path.display())));
    }
    let file_size = metadata.len();
    if file_size == 0 {
        return Err(AppError::Input(format!("Image file is empty: {}", path.display())));
    }
    if file_size > limits.max_file_size {
        return Err(AppError::Input(format!(
            "Image file too large: {} bytes (maximum allowed: {} bytes)",
            file_size, limits.max_file_size
        )));
    }
    Ok(file_size)
}

/// Load, decode and normalize a source image.
///
/// The result is RGBA8 with its longest side at most `limits.max_dimension`.
pub fn load_source_image(path: &Path, limits: &ImageLimits) -> AppResult<DynamicImage> {
    validate_image_file(path, limits)?;

    let decoded = image::open(path).map_err(|e| {
        AppError::Input(format!("Failed to decode image {}: {}", path.display(), e))
    })?;

    resize_to_max_dimension(&decoded, limits.max_dimension)
        .map_err(|e| AppError::Input(format!("Failed to normalize {}: {}", path.display(), e)))
}
