//! # Image Filtering Module
//!
//! Noise reduction strategies: Gaussian blur and median filtering.

use image::DynamicImage;
use imageproc::filter::{gaussian_blur_f32, median_filter};

use super::types::{ensure_non_empty, PreprocessingError};

/// Applies a Gaussian blur with standard deviation `sigma`.
pub fn apply_gaussian_blur(image: &DynamicImage, sigma: f32) -> Result<DynamicImage, PreprocessingError> {
    if !sigma.is_finite() || sigma <= 0.0 {
        return Err(PreprocessingError::InvalidParameter {
            name: "sigma",
            message: format!("must be a finite positive number, got {sigma}"),
        });
    }
    ensure_non_empty(image)?;

    let rgba = image.to_rgba8();
    Ok(DynamicImage::ImageRgba8(gaussian_blur_f32(&rgba, sigma)))
}

/// Applies a median filter over a `(2 * radius + 1)` square window.
pub fn apply_median_filter(image: &DynamicImage, radius: u32) -> Result<DynamicImage, PreprocessingError> {
    if radius == 0 {
        return Err(PreprocessingError::InvalidParameter {
            name: "radius",
            message: "must be at least 1".to_string(),
        });
    }
    ensure_non_empty(image)?;

    let rgba = image.to_rgba8();
    Ok(DynamicImage::ImageRgba8(median_filter(&rgba, radius, radius)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    fn speckled_image() -> DynamicImage {
        let mut img = GrayImage::from_pixel(9, 9, Luma([255]));
        img.put_pixel(4, 4, Luma([0]));
        DynamicImage::ImageLuma8(img)
    }

    #[test]
    fn test_median_filter_removes_isolated_speck() {
        let filtered = apply_median_filter(&speckled_image(), 1).unwrap().to_luma8();
        assert_eq!(filtered.get_pixel(4, 4)[0], 255);
        assert_eq!(filtered.dimensions(), (9, 9));
    }

    #[test]
    fn test_gaussian_blur_softens_speck() {
        let blurred = apply_gaussian_blur(&speckled_image(), 1.5).unwrap().to_luma8();
        let center = blurred.get_pixel(4, 4)[0];
        assert!(center > 0 && center < 255);
    }

    #[test]
    fn test_filters_reject_bad_parameters() {
        assert!(apply_gaussian_blur(&speckled_image(), 0.0).is_err());
        assert!(apply_median_filter(&speckled_image(), 0).is_err());
    }
}
