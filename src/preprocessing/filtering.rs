//! # Image Filtering Module
//!
//! This module provides noise reduction and morphological operations for OCR preprocessing.
//! It includes Gaussian blur for noise reduction and morphological operations for cleaning binary images.

use image::GrayImage;
use tracing;

use super::types::{
    DenoisedImageResult, MorphologicalImageResult, MorphologicalOperation, PreprocessingError,
};

/// Pixel value treated as text (foreground) in binary images.
const FOREGROUND: u8 = 0;

/// Sigma OpenCV derives for a 3x3 Gaussian kernel when sigma is left at zero.
pub const SMALL_KERNEL_SIGMA: f32 = 0.8;

/// Applies Gaussian blur to reduce image noise while preserving text edges.
///
/// The blur is applied before thresholding so that JPEG artefacts and subpixel
/// font smoothing do not turn into isolated specks in the binary image.
///
/// # Arguments
///
/// * `image` - The grayscale input image
/// * `sigma` - Standard deviation for Gaussian kernel (0.8 matches a 3x3 kernel)
///
/// # Examples
///
/// ```
/// use reaction_finder::preprocessing::reduce_noise;
///
/// let gray = image::GrayImage::new(32, 32);
/// let denoised = reduce_noise(&gray, 0.8).unwrap();
/// assert_eq!(denoised.image.dimensions(), (32, 32));
/// ```
pub fn reduce_noise(
    image: &GrayImage,
    sigma: f32,
) -> Result<DenoisedImageResult, PreprocessingError> {
    let start_time = std::time::Instant::now();

    if sigma <= 0.0 || sigma > 5.0 {
        return Err(PreprocessingError::InvalidParameter {
            message: format!(
                "Invalid sigma value: {}. Must be in (0.0, 5.0]",
                sigma
            ),
        });
    }

    let blurred = imageproc::filter::gaussian_blur_f32(image, sigma);

    let processing_time = start_time.elapsed();

    tracing::debug!(
        target: "ocr_preprocessing",
        "Noise reduction completed in {:.2}ms: sigma={:.2}, dimensions={}x{}",
        processing_time.as_millis(),
        sigma,
        blurred.width(),
        blurred.height()
    );

    Ok(DenoisedImageResult {
        image: blurred,
        sigma,
        processing_time_ms: processing_time.as_millis() as u32,
    })
}

/// Applies morphological operations to clean up binary images.
///
/// Dark pixels are the foreground (text on a light background after
/// thresholding). A `kernel_size` of 1 leaves the image untouched; 3 removes
/// isolated specks up to 2 pixels wide.
///
/// # Arguments
///
/// * `image` - The binary input image
/// * `operation` - The morphological operation to apply
/// * `kernel_size` - Side of the square structuring element, must be odd
pub fn apply_morphological_operation(
    image: &GrayImage,
    operation: MorphologicalOperation,
    kernel_size: u32,
) -> Result<MorphologicalImageResult, PreprocessingError> {
    let start_time = std::time::Instant::now();

    if kernel_size == 0 || kernel_size % 2 == 0 {
        return Err(PreprocessingError::InvalidParameter {
            message: format!("Kernel size must be a positive odd number, got {}", kernel_size),
        });
    }
    let radius = kernel_size / 2;

    let processed = match operation {
        MorphologicalOperation::Erosion => erode_foreground(image, radius),
        MorphologicalOperation::Dilation => dilate_foreground(image, radius),
        MorphologicalOperation::Opening => {
            let eroded = erode_foreground(image, radius);
            dilate_foreground(&eroded, radius)
        }
        MorphologicalOperation::Closing => {
            let dilated = dilate_foreground(image, radius);
            erode_foreground(&dilated, radius)
        }
    };

    let processing_time = start_time.elapsed();

    tracing::debug!(
        target: "ocr_preprocessing",
        "Morphological operation completed in {:.2}ms: operation={:?}, kernel={}x{}, dimensions={}x{}",
        processing_time.as_millis(),
        operation,
        kernel_size,
        kernel_size,
        processed.width(),
        processed.height()
    );

    Ok(MorphologicalImageResult {
        image: processed,
        operation,
        kernel_size,
        processing_time_ms: processing_time.as_millis() as u32,
    })
}

/// Shrinks the dark foreground: a pixel stays dark only if its whole
/// neighbourhood is dark (brightness maximum).
fn erode_foreground(image: &GrayImage, radius: u32) -> GrayImage {
    neighbourhood_fold(image, radius, 0u8, u8::max)
}

/// Grows the dark foreground (brightness minimum).
fn dilate_foreground(image: &GrayImage, radius: u32) -> GrayImage {
    neighbourhood_fold(image, radius, 255u8, u8::min)
}

/// Folds every square neighbourhood with `op`, clamping at the borders.
fn neighbourhood_fold(image: &GrayImage, radius: u32, init: u8, op: fn(u8, u8) -> u8) -> GrayImage {
    if radius == 0 {
        return image.clone();
    }

    let (width, height) = image.dimensions();
    let mut result = GrayImage::new(width, height);
    let r = radius as i64;

    for y in 0..height {
        for x in 0..width {
            let mut acc = init;
            for ky in -r..=r {
                for kx in -r..=r {
                    let nx = (x as i64 + kx).clamp(0, width as i64 - 1) as u32;
                    let ny = (y as i64 + ky).clamp(0, height as i64 - 1) as u32;
                    acc = op(acc, image.get_pixel(nx, ny)[0]);
                }
            }
            result.put_pixel(x, y, image::Luma([acc]));
        }
    }

    result
}

/// Counts dark pixels, handy for asserting on speck removal.
pub fn count_foreground(image: &GrayImage) -> usize {
    image.pixels().filter(|p| p[0] == FOREGROUND).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn white_image(width: u32, height: u32) -> GrayImage {
        GrayImage::from_pixel(width, height, image::Luma([255]))
    }

    #[test]
    fn test_reduce_noise_basic() {
        let img = white_image(100, 100);
        let result = reduce_noise(&img, 1.0).unwrap();

        assert_eq!(result.sigma, 1.0);
        assert_eq!(result.image.width(), 100);
        assert_eq!(result.image.height(), 100);
    }

    #[test]
    fn test_reduce_noise_invalid_sigma() {
        let img = white_image(50, 50);

        assert!(reduce_noise(&img, 0.0).is_err());
        assert!(reduce_noise(&img, 6.0).is_err());
    }

    #[test]
    fn test_reduce_noise_keeps_uniform_image_uniform() {
        let img = GrayImage::from_pixel(20, 20, image::Luma([200]));
        let result = reduce_noise(&img, SMALL_KERNEL_SIGMA).unwrap();

        assert!(result.image.pixels().all(|p| (199..=200).contains(&p[0])));
    }

    #[test]
    fn test_morphology_rejects_even_kernel() {
        let img = white_image(10, 10);
        assert!(apply_morphological_operation(&img, MorphologicalOperation::Opening, 2).is_err());
        assert!(apply_morphological_operation(&img, MorphologicalOperation::Opening, 0).is_err());
    }

    #[test]
    fn test_opening_with_unit_kernel_is_identity() {
        let mut img = white_image(9, 9);
        img.put_pixel(4, 4, image::Luma([0]));

        let result = apply_morphological_operation(&img, MorphologicalOperation::Opening, 1).unwrap();
        assert_eq!(result.image, img);
        assert_eq!(result.kernel_size, 1);
    }

    #[test]
    fn test_opening_removes_isolated_speck() {
        let mut img = white_image(9, 9);
        img.put_pixel(4, 4, image::Luma([0]));

        let result = apply_morphological_operation(&img, MorphologicalOperation::Opening, 3).unwrap();
        assert_eq!(count_foreground(&result.image), 0);
    }

    #[test]
    fn test_opening_preserves_thick_stroke() {
        let mut img = white_image(12, 12);
        for y in 2..10 {
            for x in 4..8 {
                img.put_pixel(x, y, image::Luma([0]));
            }
        }

        let result = apply_morphological_operation(&img, MorphologicalOperation::Opening, 3).unwrap();
        assert_eq!(count_foreground(&result.image), count_foreground(&img));
    }

    #[test]
    fn test_dilation_grows_foreground() {
        let mut img = white_image(5, 5);
        img.put_pixel(2, 2, image::Luma([0]));

        let result = apply_morphological_operation(&img, MorphologicalOperation::Dilation, 3).unwrap();
        for (x, y) in [(1, 2), (3, 2), (2, 1), (2, 3)] {
            assert_eq!(result.image.get_pixel(x, y)[0], 0);
        }
    }

    #[test]
    fn test_closing_fills_single_pixel_gap() {
        let mut img = white_image(7, 3);
        for x in 0..7 {
            if x != 3 {
                img.put_pixel(x, 1, image::Luma([0]));
            }
        }
        let result = apply_morphological_operation(&img, MorphologicalOperation::Closing, 3).unwrap();
        assert_eq!(result.image.get_pixel(3, 1)[0], 0);
    }
}
