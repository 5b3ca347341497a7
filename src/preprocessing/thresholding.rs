//! # Image Thresholding Module
//!
//! Binary thresholding strategies: a fixed global threshold, Otsu's automatic
//! threshold, and a mean-based adaptive threshold over a local block.

use image::{DynamicImage, GrayImage, Luma};

use super::types::{ensure_non_empty, PreprocessingError};

/// Binarizes an image against a fixed threshold.
///
/// Pixels whose luminance is greater than or equal to `threshold` become white,
/// everything else black.
///
/// # Examples
///
/// ```
/// use image::{DynamicImage, GrayImage, Luma};
/// use ocr_strategy_eval::preprocessing::apply_global_threshold;
///
/// let img = DynamicImage::ImageLuma8(GrayImage::from_pixel(2, 2, Luma([130])));
/// let binary = apply_global_threshold(&img, 128).unwrap();
/// assert_eq!(binary.to_luma8().get_pixel(0, 0)[0], 255);
/// ```
pub fn apply_global_threshold(
    image: &DynamicImage,
    threshold: u8,
) -> Result<DynamicImage, PreprocessingError> {
    ensure_non_empty(image)?;
    let gray = image.to_luma8();
    Ok(DynamicImage::ImageLuma8(binarize(&gray, |_, _, value| {
        value >= threshold
    })))
}

/// Applies Otsu's thresholding algorithm to convert an image to binary (black/white).
///
/// The threshold maximizes the between-class variance of the luminance histogram.
/// Returns the binary image together with the threshold that was selected.
pub fn apply_otsu_threshold(
    image: &DynamicImage,
) -> Result<(DynamicImage, u8), PreprocessingError> {
    ensure_non_empty(image)?;
    let gray = image.to_luma8();

    let mut histogram = [0u32; 256];
    for pixel in gray.pixels() {
        histogram[pixel[0] as usize] += 1;
    }
    let total_pixels = f64::from(gray.width()) * f64::from(gray.height());

    let optimal_threshold = find_otsu_threshold(&histogram, total_pixels);

    tracing::debug!(
        target: "ocr_preprocessing",
        "Otsu thresholding selected threshold={} for {}x{}",
        optimal_threshold,
        gray.width(),
        gray.height()
    );

    let binary = binarize(&gray, |_, _, value| value > optimal_threshold);
    Ok((DynamicImage::ImageLuma8(binary), optimal_threshold))
}

/// Finds the optimal threshold using Otsu's method by maximizing between-class variance.
///
/// Falls back to 128 when the histogram has a single populated class.
fn find_otsu_threshold(histogram: &[u32; 256], total_pixels: f64) -> u8 {
    let mut cumulative_sums = [0f64; 256];
    let mut cumulative_weighted_sums = [0f64; 256];

    let mut cumulative_sum = 0f64;
    let mut cumulative_weighted_sum = 0f64;
    for (i, &count) in histogram.iter().enumerate() {
        let pixel_count = f64::from(count);
        cumulative_sum += pixel_count;
        cumulative_weighted_sum += (i as f64) * pixel_count;
        cumulative_sums[i] = cumulative_sum;
        cumulative_weighted_sums[i] = cumulative_weighted_sum;
    }

    let total_weighted_sum = cumulative_weighted_sums[255];
    let mut max_variance = 0f64;
    let mut optimal_threshold = 128u8;

    for threshold in 1..255usize {
        let w0 = cumulative_sums[threshold] / total_pixels;
        let w1 = 1.0 - w0;
        if w0 == 0.0 || w1 == 0.0 {
            continue;
        }

        let background = cumulative_sums[threshold];
        let foreground = cumulative_sums[255] - background;
        let mu0 = cumulative_weighted_sums[threshold] / background;
        let mu1 = (total_weighted_sum - cumulative_weighted_sums[threshold]) / foreground;

        let variance = w0 * w1 * (mu0 - mu1).powi(2);
        if variance > max_variance {
            max_variance = variance;
            optimal_threshold = threshold as u8;
        }
    }

    optimal_threshold
}

/// Mean-based adaptive threshold.
///
/// Each pixel is compared against the mean luminance of the `block_size` x `block_size`
/// neighbourhood around it (clipped at the borders) minus `offset`; pixels darker than
/// that local threshold become black. Uses an integral image so the cost is
/// independent of the block size.
pub fn apply_adaptive_threshold(
    image: &DynamicImage,
    block_size: u32,
    offset: f64,
) -> Result<DynamicImage, PreprocessingError> {
    if block_size == 0 || block_size % 2 == 0 {
        return Err(PreprocessingError::InvalidParameter {
            name: "block_size",
            message: format!("must be a positive odd number, got {block_size}"),
        });
    }
    ensure_non_empty(image)?;

    let gray = image.to_luma8();
    let (width, height) = gray.dimensions();
    let integral = integral_image(&gray);
    let stride = width as usize + 1;
    let half = block_size / 2;

    let binary = binarize(&gray, |x, y, value| {
        let x1 = x.saturating_sub(half) as usize;
        let y1 = y.saturating_sub(half) as usize;
        let x2 = (x + half).min(width - 1) as usize + 1;
        let y2 = (y + half).min(height - 1) as usize + 1;

        let sum = integral[y2 * stride + x2] + integral[y1 * stride + x1]
            - integral[y1 * stride + x2]
            - integral[y2 * stride + x1];
        let area = ((x2 - x1) * (y2 - y1)) as f64;
        let local_threshold = sum as f64 / area - offset;

        f64::from(value) >= local_threshold
    });

    Ok(DynamicImage::ImageLuma8(binary))
}

/// Summed-area table with a zero row and column prepended.
fn integral_image(gray: &GrayImage) -> Vec<u64> {
    let (width, height) = gray.dimensions();
    let stride = width as usize + 1;
    let mut integral = vec![0u64; stride * (height as usize + 1)];

    for y in 0..height as usize {
        let mut row_sum = 0u64;
        for x in 0..width as usize {
            row_sum += u64::from(gray.get_pixel(x as u32, y as u32)[0]);
            integral[(y + 1) * stride + x + 1] = integral[y * stride + x + 1] + row_sum;
        }
    }

    integral
}

/// Map every pixel to white when `is_white` holds, black otherwise.
fn binarize(gray: &GrayImage, is_white: impl Fn(u32, u32, u8) -> bool) -> GrayImage {
    GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        let value = gray.get_pixel(x, y)[0];
        if is_white(x, y, value) {
            Luma([255u8])
        } else {
            Luma([0u8])
        }
    })
}
