//! # Color Adjustment Module
//!
//! Grayscale conversion, saturation and contrast adjustment.

use image::{DynamicImage, Rgba, RgbaImage};

use super::types::{ensure_non_empty, PreprocessingError};

/// Luminance weights used for saturation adjustment (linear-light approximation).
const LUMA_R: f32 = 0.3086;
const LUMA_G: f32 = 0.6094;
const LUMA_B: f32 = 0.0820;

/// Converts an image to 8-bit grayscale.
pub fn convert_to_grayscale(image: &DynamicImage) -> Result<DynamicImage, PreprocessingError> {
    ensure_non_empty(image)?;
    Ok(DynamicImage::ImageLuma8(image.to_luma8()))
}

/// Scales the saturation of every pixel by `factor`.
///
/// `1.0` keeps the image unchanged, `0.0` produces gray, values above `1.0`
/// intensify colors. Alpha is preserved.
pub fn adjust_saturation(
    image: &DynamicImage,
    factor: f32,
) -> Result<DynamicImage, PreprocessingError> {
    if !factor.is_finite() || factor < 0.0 {
        return Err(PreprocessingError::InvalidParameter {
            name: "saturation_factor",
            message: format!("must be a finite, non-negative number, got {factor}"),
        });
    }
    ensure_non_empty(image)?;

    let rgba = image.to_rgba8();
    let inv = 1.0 - factor;
    let (lr, lg, lb) = (LUMA_R * inv, LUMA_G * inv, LUMA_B * inv);

    let adjusted = RgbaImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let Rgba([r, g, b, a]) = *rgba.get_pixel(x, y);
        let (r, g, b) = (f32::from(r), f32::from(g), f32::from(b));

        let nr = (lr + factor) * r + lg * g + lb * b;
        let ng = lr * r + (lg + factor) * g + lb * b;
        let nb = lr * r + lg * g + (lb + factor) * b;

        Rgba([clamp_channel(nr), clamp_channel(ng), clamp_channel(nb), a])
    });

    Ok(DynamicImage::ImageRgba8(adjusted))
}

/// Adjusts contrast; positive values increase contrast, negative values decrease it.
pub fn adjust_contrast(image: &DynamicImage, contrast: f32) -> Result<DynamicImage, PreprocessingError> {
    if !contrast.is_finite() || contrast <= -100.0 {
        return Err(PreprocessingError::InvalidParameter {
            name: "contrast",
            message: format!("must be a finite number greater than -100, got {contrast}"),
        });
    }
    ensure_non_empty(image)?;
    Ok(image.adjust_contrast(contrast))
}

fn clamp_channel(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn colored_image() -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, 4, Rgba([200, 40, 90, 255])))
    }

    #[test]
    fn test_grayscale_has_single_channel() {
        let gray = convert_to_grayscale(&colored_image()).unwrap();
        assert!(matches!(gray, DynamicImage::ImageLuma8(_)));
        assert_eq!(gray.width(), 4);
    }

    #[test]
    fn test_saturation_identity_factor() {
        let img = colored_image();
        let adjusted = adjust_saturation(&img, 1.0).unwrap();
        assert_eq!(adjusted.to_rgba8().get_pixel(0, 0), &Rgba([200, 40, 90, 255]));
    }

    #[test]
    fn test_saturation_zero_is_gray() {
        let adjusted = adjust_saturation(&colored_image(), 0.0).unwrap().to_rgba8();
        let Rgba([r, g, b, a]) = *adjusted.get_pixel(1, 1);
        assert_eq!(r, g);
        assert_eq!(g, b);
        assert_eq!(a, 255);
    }

    #[test]
    fn test_saturation_increase_spreads_channels() {
        let adjusted = adjust_saturation(&colored_image(), 1.2).unwrap().to_rgba8();
        let Rgba([r, g, _, _]) = *adjusted.get_pixel(0, 0);
        assert!(r > 200);
        assert!(g < 40);
    }

    #[test]
    fn test_saturation_rejects_negative_factor() {
        assert!(adjust_saturation(&colored_image(), -0.5).is_err());
        assert!(adjust_saturation(&colored_image(), f32::NAN).is_err());
    }

    #[test]
    fn test_contrast_rejects_out_of_range() {
        assert!(adjust_contrast(&colored_image(), -100.0).is_err());
        assert!(adjust_contrast(&colored_image(), 20.0).is_ok());
    }
}
