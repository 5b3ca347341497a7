//! # Geometric Transforms Module
//!
//! Translation and size normalization.

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, Rgba, RgbaImage};

use super::types::{ensure_non_empty, PreprocessingError};

const BACKGROUND: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Translates the image content by `(shift_x, shift_y)` pixels.
///
/// The canvas keeps its size; uncovered pixels are filled white and content pushed
/// past the border is discarded.
pub fn shift_image(
    image: &DynamicImage,
    shift_x: i32,
    shift_y: i32,
) -> Result<DynamicImage, PreprocessingError> {
    ensure_non_empty(image)?;
    let source = image.to_rgba8();
    let (width, height) = source.dimensions();

    let shifted = RgbaImage::from_fn(width, height, |x, y| {
        let src_x = i64::from(x) - i64::from(shift_x);
        let src_y = i64::from(y) - i64::from(shift_y);
        if src_x < 0 || src_y < 0 || src_x >= i64::from(width) || src_y >= i64::from(height) {
            BACKGROUND
        } else {
            *source.get_pixel(src_x as u32, src_y as u32)
        }
    });

    Ok(DynamicImage::ImageRgba8(shifted))
}

/// Downscales so that neither side exceeds `max_dimension`, preserving aspect ratio.
///
/// Images already within bounds are returned as an RGBA copy without resampling.
pub fn resize_to_max_dimension(
    image: &DynamicImage,
    max_dimension: u32,
) -> Result<DynamicImage, PreprocessingError> {
    if max_dimension == 0 {
        return Err(PreprocessingError::InvalidParameter {
            name: "max_dimension",
            message: "must be greater than 0".to_string(),
        });
    }
    ensure_non_empty(image)?;

    let (width, height) = image.dimensions();
    if width <= max_dimension && height <= max_dimension {
        return Ok(DynamicImage::ImageRgba8(image.to_rgba8()));
    }

    let resized = image.resize(max_dimension, max_dimension, FilterType::Lanczos3);
    tracing::debug!(
        target: "ocr_preprocessing",
        "Resized source from {}x{} to {}x{}",
        width,
        height,
        resized.width(),
        resized.height()
    );
    Ok(DynamicImage::ImageRgba8(resized.to_rgba8()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn marked_image() -> DynamicImage {
        let mut img = RgbaImage::from_pixel(10, 10, BACKGROUND);
        img.put_pixel(0, 0, Rgba([0, 0, 0, 255]));
        DynamicImage::ImageRgba8(img)
    }

    #[test]
    fn test_shift_moves_content_and_fills_white() {
        let shifted = shift_image(&marked_image(), 5, 5).unwrap().to_rgba8();
        assert_eq!(shifted.get_pixel(5, 5), &Rgba([0, 0, 0, 255]));
        assert_eq!(shifted.get_pixel(0, 0), &BACKGROUND);
        assert_eq!(shifted.dimensions(), (10, 10));
    }

    #[test]
    fn test_shift_negative_discards_overflow() {
        let shifted = shift_image(&marked_image(), -1, 0).unwrap().to_rgba8();
        assert!(shifted.pixels().all(|p| *p == BACKGROUND));
    }

    #[test]
    fn test_resize_preserves_aspect_ratio() {
        let img = DynamicImage::new_rgb8(400, 200);
        let resized = resize_to_max_dimension(&img, 100).unwrap();
        assert_eq!(resized.dimensions(), (100, 50));
    }

    #[test]
    fn test_resize_keeps_small_images() {
        let img = DynamicImage::new_rgb8(40, 20);
        let resized = resize_to_max_dimension(&img, 100).unwrap();
        assert_eq!(resized.dimensions(), (40, 20));
        assert!(matches!(resized, DynamicImage::ImageRgba8(_)));
    }
}
