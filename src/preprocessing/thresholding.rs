//! # Image Thresholding Module
//!
//! This module provides binary thresholding for OCR preprocessing.
//! Thresholds are computed per pixel from a Gaussian-weighted neighbourhood,
//! so light-mode and dark-mode chat backgrounds, gradients and shadows do not
//! clip text the way a single global threshold would.

use image::GrayImage;
use tracing;

use super::types::{PreprocessingError, ThresholdedImageResult};

/// Default neighbourhood size for the local mean.
pub const DEFAULT_BLOCK_SIZE: u32 = 31;

/// Default constant subtracted from the local mean.
pub const DEFAULT_OFFSET: f32 = 2.0;

/// Gaussian sigma for a square kernel of `block_size` pixels, using the same
/// derivation as OpenCV's `getGaussianKernel` with sigma left at zero.
pub fn sigma_for_block(block_size: u32) -> f32 {
    0.3 * ((block_size as f32 - 1.0) * 0.5 - 1.0) + 0.8
}

/// Applies adaptive Gaussian thresholding.
///
/// A pixel becomes white (255) when it is brighter than the Gaussian-weighted
/// mean of its `block_size` neighbourhood minus `offset`, black (0) otherwise.
///
/// # Arguments
///
/// * `image` - The grayscale input image
/// * `block_size` - Odd neighbourhood size, at least 3
/// * `offset` - Constant subtracted from the local mean
///
/// # Examples
///
/// ```
/// use reaction_finder::preprocessing::apply_adaptive_threshold;
///
/// let gray = image::GrayImage::from_pixel(40, 40, image::Luma([180]));
/// let binary = apply_adaptive_threshold(&gray, 31, 2.0).unwrap();
/// assert!(binary.image.pixels().all(|p| p[0] == 255));
/// ```
pub fn apply_adaptive_threshold(
    image: &GrayImage,
    block_size: u32,
    offset: f32,
) -> Result<ThresholdedImageResult, PreprocessingError> {
    let start_time = std::time::Instant::now();

    if block_size < 3 || block_size % 2 == 0 {
        return Err(PreprocessingError::InvalidParameter {
            message: format!(
                "Block size must be an odd number >= 3, got {}",
                block_size
            ),
        });
    }

    let local_mean = imageproc::filter::gaussian_blur_f32(image, sigma_for_block(block_size));

    let mut binary_img = GrayImage::new(image.width(), image.height());
    for (x, y, pixel) in image.enumerate_pixels() {
        let threshold = local_mean.get_pixel(x, y)[0] as f32 - offset;
        let binary_value = if pixel[0] as f32 > threshold { 255u8 } else { 0u8 };
        binary_img.put_pixel(x, y, image::Luma([binary_value]));
    }

    let processing_time = start_time.elapsed();

    tracing::debug!(
        target: "ocr_preprocessing",
        "Adaptive thresholding completed in {:.2}ms: block_size={}, offset={:.1}, dimensions={}x{}",
        processing_time.as_millis(),
        block_size,
        offset,
        image.width(),
        image.height()
    );

    Ok(ThresholdedImageResult {
        image: binary_img,
        block_size,
        offset,
        processing_time_ms: processing_time.as_millis() as u32,
    })
}

/// Mean intensity of a grayscale image (0.0 for an empty image).
pub fn mean_intensity(image: &GrayImage) -> f32 {
    let total_pixels = (image.width() as u64) * (image.height() as u64);
    if total_pixels == 0 {
        return 0.0;
    }
    let sum: u64 = image.pixels().map(|p| p[0] as u64).sum();
    sum as f32 / total_pixels as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sigma_for_block_matches_reference_values() {
        assert!((sigma_for_block(3) - 0.8).abs() < 1e-6);
        assert!((sigma_for_block(31) - 5.0).abs() < 1e-5);
    }

    #[test]
    fn test_rejects_invalid_block_size() {
        let img = GrayImage::new(10, 10);
        assert!(apply_adaptive_threshold(&img, 4, 2.0).is_err());
        assert!(apply_adaptive_threshold(&img, 1, 2.0).is_err());
    }

    #[test]
    fn test_output_is_binary() {
        let mut img = GrayImage::new(30, 30);
        for (x, y, pixel) in img.enumerate_pixels_mut() {
            pixel[0] = ((x * 7 + y * 13) % 256) as u8;
        }

        let result = apply_adaptive_threshold(&img, 11, 2.0).unwrap();
        assert!(result.image.pixels().all(|p| p[0] == 0 || p[0] == 255));
        assert_eq!(result.block_size, 11);
    }

    #[test]
    fn test_dark_text_survives_uneven_lighting() {
        // Horizontal lighting gradient from 100 to 200 with dark glyph blocks
        // that are darker than their surroundings but brighter than the far
        // left background.
        let width = 100;
        let height = 40;
        let mut img = GrayImage::new(width, height);
        for (x, _, pixel) in img.enumerate_pixels_mut() {
            pixel[0] = (100 + x) as u8;
        }
        let glyph_columns = [20u32, 45, 70];
        for &gx in &glyph_columns {
            for y in 17..23 {
                for x in gx..gx + 6 {
                    let background = 100 + x;
                    img.put_pixel(x, y, image::Luma([(background - 60) as u8]));
                }
            }
        }

        let result = apply_adaptive_threshold(&img, DEFAULT_BLOCK_SIZE, DEFAULT_OFFSET).unwrap();

        for &gx in &glyph_columns {
            assert_eq!(result.image.get_pixel(gx + 3, 20)[0], 0, "glyph at x={gx} lost");
        }
        for x in 20..80 {
            assert_eq!(result.image.get_pixel(x, 2)[0], 255, "background at x={x} clipped");
        }
    }

    #[test]
    fn test_mean_intensity() {
        let img = GrayImage::from_pixel(4, 4, image::Luma([64]));
        assert!((mean_intensity(&img) - 64.0).abs() < f32::EPSILON);
        assert_eq!(mean_intensity(&GrayImage::new(0, 0)), 0.0);
    }
}
