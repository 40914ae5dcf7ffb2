//! # Image Normalizer
//!
//! Turns a chat screenshot into a clean binary bitmap for OCR. The steps run in
//! a fixed order: decode, grayscale, Gaussian blur, adaptive threshold,
//! morphological opening. Everything after the decode is a pure function of
//! the decoded pixels.

use image::GrayImage;
use tracing::{debug, info};

use super::filtering::{apply_morphological_operation, reduce_noise, SMALL_KERNEL_SIGMA};
use super::thresholding::{apply_adaptive_threshold, mean_intensity, DEFAULT_BLOCK_SIZE, DEFAULT_OFFSET};
use super::types::{ImageSource, MorphologicalOperation, NormalizedBitmap, PreprocessingError, RawImage};

/// Tunables for the normalization pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizerConfig {
    /// Sigma of the denoising blur (0.8 is a 3x3 kernel)
    pub blur_sigma: f32,
    /// Neighbourhood size for adaptive thresholding
    pub threshold_block_size: u32,
    /// Constant subtracted from the local mean
    pub threshold_offset: f32,
    /// Structuring element size for the final opening; 1 keeps every pixel
    pub opening_kernel_size: u32,
    /// Invert dark-mode screenshots so text ends up dark on light
    pub invert_dark_background: bool,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            blur_sigma: SMALL_KERNEL_SIGMA,
            threshold_block_size: DEFAULT_BLOCK_SIZE,
            threshold_offset: DEFAULT_OFFSET,
            opening_kernel_size: 1,
            invert_dark_background: true,
        }
    }
}

impl NormalizerConfig {
    /// Validate normalizer parameters
    pub fn validate(&self) -> crate::errors::AppResult<()> {
        if self.blur_sigma <= 0.0 || self.blur_sigma > 5.0 {
            return Err(crate::errors::AppError::Config(format!(
                "blur_sigma must be in (0.0, 5.0], got {}",
                self.blur_sigma
            )));
        }
        if self.threshold_block_size < 3 || self.threshold_block_size % 2 == 0 {
            return Err(crate::errors::AppError::Config(format!(
                "threshold_block_size must be an odd number >= 3, got {}",
                self.threshold_block_size
            )));
        }
        if self.opening_kernel_size == 0 || self.opening_kernel_size % 2 == 0 {
            return Err(crate::errors::AppError::Config(format!(
                "opening_kernel_size must be a positive odd number, got {}",
                self.opening_kernel_size
            )));
        }
        Ok(())
    }
}

/// Stateless image normalizer; safe to share across requests.
#[derive(Debug, Clone, Default)]
pub struct ImageNormalizer {
    config: NormalizerConfig,
}

impl ImageNormalizer {
    pub fn new(config: NormalizerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &NormalizerConfig {
        &self.config
    }

    /// Decodes the source into a [`RawImage`].
    ///
    /// # Errors
    ///
    /// Returns `PreprocessingError::NotFound` if the source cannot be opened or decoded.
    pub fn load(&self, source: &ImageSource) -> Result<RawImage, PreprocessingError> {
        let decoded = match source {
            ImageSource::Path(path) => {
                if !path.is_file() {
                    return Err(PreprocessingError::NotFound {
                        source: source.describe(),
                        message: "file does not exist or is not a regular file".to_string(),
                    });
                }
                image::open(path)
            }
            ImageSource::Bytes(bytes) => image::load_from_memory(bytes),
        }
        .map_err(|e| PreprocessingError::NotFound {
            source: source.describe(),
            message: e.to_string(),
        })?;

        let raw = RawImage::new(decoded);
        info!(
            source = %source.describe(),
            width = raw.width(),
            height = raw.height(),
            channels = raw.channel_count(),
            "Decoded screenshot"
        );
        Ok(raw)
    }

    /// Runs grayscale, blur, adaptive threshold and opening on a decoded image.
    pub fn normalize(&self, raw: &RawImage) -> Result<NormalizedBitmap, PreprocessingError> {
        let start_time = std::time::Instant::now();

        let mut gray: GrayImage = raw.as_dynamic().to_luma8();

        if self.config.invert_dark_background && mean_intensity(&gray) < 128.0 {
            debug!("Dark background detected, inverting before thresholding");
            image::imageops::invert(&mut gray);
        }

        let denoised = reduce_noise(&gray, self.config.blur_sigma)?;
        let thresholded = apply_adaptive_threshold(
            &denoised.image,
            self.config.threshold_block_size,
            self.config.threshold_offset,
        )?;
        let opened = apply_morphological_operation(
            &thresholded.image,
            MorphologicalOperation::Opening,
            self.config.opening_kernel_size,
        )?;

        debug!(
            "Normalization completed in {}ms for {}x{} image",
            start_time.elapsed().as_millis(),
            raw.width(),
            raw.height()
        );

        Ok(NormalizedBitmap::from_gray(opened.image))
    }

    /// Decodes and normalizes in one step.
    pub fn normalize_source(&self, source: &ImageSource) -> Result<NormalizedBitmap, PreprocessingError> {
        let raw = self.load(source)?;
        self.normalize(&raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, Rgb, RgbImage};

    fn chat_like_image(background: u8, text: u8) -> RawImage {
        let mut img = RgbImage::from_pixel(120, 60, Rgb([background, background, background]));
        for y in 20..32 {
            for x in (10..110).step_by(12) {
                for dx in 0..6 {
                    img.put_pixel(x + dx, y, Rgb([text, text, text]));
                }
            }
        }
        RawImage::new(DynamicImage::ImageRgb8(img))
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(NormalizerConfig::default().validate().is_ok());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = NormalizerConfig {
            threshold_block_size: 30,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = NormalizerConfig {
            opening_kernel_size: 2,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_normalize_keeps_dimensions_and_is_binary() {
        let normalizer = ImageNormalizer::default();
        let raw = chat_like_image(240, 30);

        let bitmap = normalizer.normalize(&raw).unwrap();
        assert_eq!(bitmap.dimensions(), raw.dimensions());
        assert!(bitmap.is_binary());
    }

    #[test]
    fn test_normalize_is_deterministic() {
        let normalizer = ImageNormalizer::default();
        let raw = chat_like_image(235, 40);

        let first = normalizer.normalize(&raw).unwrap();
        let second = normalizer.normalize(&raw).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_light_and_dark_mode_give_dark_text() {
        let normalizer = ImageNormalizer::default();

        for raw in [chat_like_image(240, 30), chat_like_image(20, 230)] {
            let bitmap = normalizer.normalize(&raw).unwrap();
            // centre of a glyph stroke is dark, far background is white
            assert_eq!(bitmap.as_gray().get_pixel(12, 26)[0], 0);
            assert_eq!(bitmap.as_gray().get_pixel(60, 5)[0], 255);
        }
    }

    #[test]
    fn test_load_missing_path_is_not_found() {
        let normalizer = ImageNormalizer::default();
        let result = normalizer.load(&ImageSource::from("/definitely/not/here.png"));
        assert!(matches!(result, Err(PreprocessingError::NotFound { .. })));
    }

    #[test]
    fn test_load_garbage_bytes_is_not_found() {
        let normalizer = ImageNormalizer::default();
        let result = normalizer.load(&ImageSource::Bytes(b"not an image".to_vec()));
        assert!(matches!(result, Err(PreprocessingError::NotFound { .. })));
    }
}
