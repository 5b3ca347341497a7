//! # Image Preprocessing Module
//!
//! Pure image-to-image transforms used as preprocessing strategies. Every function
//! borrows its input and returns a fresh image, so one source image can be fed to
//! any number of strategies independently.
//!
//! The module is organized into focused sub-modules:
//! - `color`: grayscale conversion, saturation and contrast adjustment
//! - `thresholding`: global, Otsu and adaptive binarization
//! - `filtering`: Gaussian blur and median filtering
//! - `geometry`: translation and size normalization
//! - `deskewing`: text rotation detection and correction
//! - `types`: shared types and error definitions

pub mod color;
pub mod deskewing;
pub mod filtering;
pub mod geometry;
pub mod thresholding;
pub mod types;

pub use types::{DeskewResult, PreprocessingError};

pub use color::{adjust_contrast, adjust_saturation, convert_to_grayscale};
pub use deskewing::{apply_deskew, deskew_image};
pub use filtering::{apply_gaussian_blur, apply_median_filter};
pub use geometry::{resize_to_max_dimension, shift_image};
pub use thresholding::{apply_adaptive_threshold, apply_global_threshold, apply_otsu_threshold};
