//! # Image Deskewing Module
//!
//! Detects text skew with projection profile analysis and rotates the image so
//! text lines run horizontally. Intended for the small rotations (±10°) typical
//! of photographed or scanned pages.

use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, Luma, Rgba};
use imageproc::geometric_transformations::{rotate_about_center, Interpolation};

use super::types::{ensure_non_empty, DeskewResult, PreprocessingError};

/// Skew angles below this magnitude are left uncorrected.
const MIN_CORRECTION_DEGREES: f32 = 0.5;

/// Search range for skew detection, in degrees either side of horizontal.
const MAX_SKEW_DEGREES: f32 = 10.0;

/// Side length the analysis copy is reduced to before the angle search.
const ANALYSIS_MAX_DIMENSION: u32 = 400;

/// Detects and corrects text skew.
///
/// # Examples
///
/// ```no_run
/// use ocr_strategy_eval::preprocessing::deskew_image;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let img = image::open("rotated_page.png")?;
/// let result = deskew_image(&img)?;
/// println!("Detected skew: {:.2}°", result.skew_angle_degrees);
/// # Ok(())
/// # }
/// ```
pub fn deskew_image(image: &DynamicImage) -> Result<DeskewResult, PreprocessingError> {
    ensure_non_empty(image)?;
    let start_time = std::time::Instant::now();

    let analysis = image
        .resize(
            ANALYSIS_MAX_DIMENSION,
            ANALYSIS_MAX_DIMENSION,
            FilterType::Triangle,
        )
        .to_luma8();
    let skew_angle = detect_skew_angle(&analysis)?;

    if skew_angle.abs() < MIN_CORRECTION_DEGREES {
        tracing::debug!(
            target: "ocr_preprocessing",
            "Skew angle {:.2}° is below threshold, skipping deskewing",
            skew_angle
        );
        return Ok(DeskewResult {
            image: image.clone(),
            skew_angle_degrees: skew_angle,
            rotated: false,
        });
    }

    let rotated = rotate_image(image, -skew_angle);

    tracing::debug!(
        target: "ocr_preprocessing",
        "Deskewing completed in {}ms: corrected {:.2}° skew",
        start_time.elapsed().as_millis(),
        skew_angle
    );

    Ok(DeskewResult {
        image: rotated,
        skew_angle_degrees: skew_angle,
        rotated: true,
    })
}

/// Deskew transform returning only the corrected image.
pub fn apply_deskew(image: &DynamicImage) -> Result<DynamicImage, PreprocessingError> {
    deskew_image(image).map(|result| result.image)
}

/// Finds the angle whose horizontal projection profile is the most peaked.
///
/// Aligned text lines produce rows that are either dense or empty, which maximizes
/// the variance of the per-row dark pixel counts. A coarse 0.5° sweep over the
/// full range is refined with 0.1° steps around the best candidate.
fn detect_skew_angle(gray: &GrayImage) -> Result<f32, PreprocessingError> {
    let binary = binarize_by_median(gray)?;

    let steps = (MAX_SKEW_DEGREES * 2.0) as i32;
    let coarse = (-steps..=steps).map(|i| i as f32 * 0.5);
    let (mut best_angle, mut best_variance) = best_of(&binary, coarse, (0.0, f32::MIN));

    let refined = (0..=10).map(|i| best_angle - 0.5 + i as f32 * 0.1);
    (best_angle, best_variance) = best_of(&binary, refined, (best_angle, best_variance));

    tracing::trace!(
        target: "ocr_preprocessing",
        "Skew search settled on {:.2}° (variance {:.2})",
        best_angle,
        best_variance
    );
    Ok(best_angle.clamp(-MAX_SKEW_DEGREES, MAX_SKEW_DEGREES))
}

fn best_of(
    binary: &GrayImage,
    angles: impl Iterator<Item = f32>,
    initial: (f32, f32),
) -> (f32, f32) {
    angles.fold(initial, |(best_angle, best_variance), angle| {
        let variance = projection_variance(binary, angle);
        if variance > best_variance {
            (angle, variance)
        } else {
            (best_angle, best_variance)
        }
    })
}

/// Variance of the row-wise dark pixel counts after sampling the image rotated by
/// `angle_degrees` around its center.
fn projection_variance(binary: &GrayImage, angle_degrees: f32) -> f32 {
    let (width, height) = binary.dimensions();
    let (sin_a, cos_a) = angle_degrees.to_radians().sin_cos();
    let cx = width as f32 / 2.0;
    let cy = height as f32 / 2.0;

    let mut projections = vec![0u32; height as usize];
    for y in 0..height {
        let dy = y as f32 - cy;
        for x in 0..width {
            let dx = x as f32 - cx;
            let sample_x = dx * cos_a - dy * sin_a + cx;
            let sample_y = dx * sin_a + dy * cos_a + cy;

            if sample_x >= 0.0
                && sample_y >= 0.0
                && sample_x < width as f32
                && sample_y < height as f32
                && binary.get_pixel(sample_x as u32, sample_y as u32)[0] == 0
            {
                projections[y as usize] += 1;
            }
        }
    }

    let count = projections.len() as f32;
    let mean = projections.iter().map(|&p| p as f32).sum::<f32>() / count;
    projections
        .iter()
        .map(|&p| (p as f32 - mean).powi(2))
        .sum::<f32>()
        / count
}

/// Median-based binarization used only for skew analysis.
fn binarize_by_median(gray: &GrayImage) -> Result<GrayImage, PreprocessingError> {
    let mut values: Vec<u8> = gray.pixels().map(|p| p[0]).collect();
    if values.is_empty() {
        return Err(PreprocessingError::EmptyImage);
    }
    let mid = values.len() / 2;
    let (_, median, _) = values.select_nth_unstable(mid);
    let threshold = *median;

    Ok(GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        if gray.get_pixel(x, y)[0] < threshold {
            Luma([0])
        } else {
            Luma([255])
        }
    }))
}

/// Rotates around the center keeping the canvas size; uncovered corners are white.
fn rotate_image(image: &DynamicImage, angle_degrees: f32) -> DynamicImage {
    let rgba = image.to_rgba8();
    DynamicImage::ImageRgba8(rotate_about_center(
        &rgba,
        angle_degrees.to_radians(),
        Interpolation::Bilinear,
        Rgba([255, 255, 255, 255]),
    ))
}
