//! # Shared Types for Image Preprocessing
//!
//! This module contains the shared types, structs, and enums used across
//! the preprocessing sub-modules.

use std::io::Cursor;
use std::path::PathBuf;

use image::{DynamicImage, GenericImageView, GrayImage, ImageFormat};

/// Errors that can occur during image preprocessing operations.
#[derive(Debug, Clone, PartialEq)]
pub enum PreprocessingError {
    /// The image source could not be opened or decoded
    NotFound { source: String, message: String },
    /// A filter parameter was outside its valid range
    InvalidParameter { message: String },
    /// Encoding the bitmap for a downstream consumer failed
    Encoding { message: String },
}

impl std::fmt::Display for PreprocessingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PreprocessingError::NotFound { source, message } => {
                write!(f, "Image source not found or unreadable ({}): {}", source, message)
            }
            PreprocessingError::InvalidParameter { message } => {
                write!(f, "Invalid preprocessing parameter: {}", message)
            }
            PreprocessingError::Encoding { message } => {
                write!(f, "Failed to encode bitmap: {}", message)
            }
        }
    }
}

impl std::error::Error for PreprocessingError {}

/// Where a screenshot comes from.
#[derive(Debug, Clone)]
pub enum ImageSource {
    /// A file on disk
    Path(PathBuf),
    /// Encoded image bytes (PNG, JPEG, ...) already in memory
    Bytes(Vec<u8>),
}

impl ImageSource {
    /// Short human readable description used in logs and errors
    pub fn describe(&self) -> String {
        match self {
            ImageSource::Path(path) => path.display().to_string(),
            ImageSource::Bytes(bytes) => format!("<{} bytes in memory>", bytes.len()),
        }
    }
}

impl From<PathBuf> for ImageSource {
    fn from(path: PathBuf) -> Self {
        ImageSource::Path(path)
    }
}

impl From<&str> for ImageSource {
    fn from(path: &str) -> Self {
        ImageSource::Path(PathBuf::from(path))
    }
}

impl From<Vec<u8>> for ImageSource {
    fn from(bytes: Vec<u8>) -> Self {
        ImageSource::Bytes(bytes)
    }
}

/// A decoded screenshot, owned by the caller and never mutated.
#[derive(Debug, Clone)]
pub struct RawImage {
    image: DynamicImage,
}

impl RawImage {
    pub fn new(image: DynamicImage) -> Self {
        Self { image }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// Number of color channels in the decoded buffer
    pub fn channel_count(&self) -> u8 {
        self.image.color().channel_count()
    }

    pub fn as_dynamic(&self) -> &DynamicImage {
        &self.image
    }
}

/// Single-channel binary bitmap (every pixel is 0 or 255) produced by the normalizer.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedBitmap {
    bitmap: GrayImage,
}

impl NormalizedBitmap {
    /// Wraps a grayscale buffer, forcing every pixel to 0 or 255.
    pub fn from_gray(mut bitmap: GrayImage) -> Self {
        for pixel in bitmap.pixels_mut() {
            pixel[0] = if pixel[0] >= 128 { 255 } else { 0 };
        }
        Self { bitmap }
    }

    pub fn width(&self) -> u32 {
        self.bitmap.width()
    }

    pub fn height(&self) -> u32 {
        self.bitmap.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.bitmap.dimensions()
    }

    pub fn as_gray(&self) -> &GrayImage {
        &self.bitmap
    }

    /// True when the buffer holds only 0 and 255 values
    pub fn is_binary(&self) -> bool {
        self.bitmap.pixels().all(|p| p[0] == 0 || p[0] == 255)
    }

    /// Encodes the bitmap as PNG, the format handed to the OCR engine.
    pub fn to_png_bytes(&self) -> Result<Vec<u8>, PreprocessingError> {
        let mut buffer = Cursor::new(Vec::new());
        self.bitmap
            .write_to(&mut buffer, ImageFormat::Png)
            .map_err(|e| PreprocessingError::Encoding {
                message: e.to_string(),
            })?;
        Ok(buffer.into_inner())
    }
}

/// Result of a Gaussian blur pass.
#[derive(Debug, Clone)]
pub struct DenoisedImageResult {
    /// The blurred grayscale image
    pub image: GrayImage,
    /// Sigma value used for the Gaussian kernel
    pub sigma: f32,
    /// Processing time in milliseconds
    pub processing_time_ms: u32,
}

/// Result of adaptive thresholding.
#[derive(Debug, Clone)]
pub struct ThresholdedImageResult {
    /// The binary image
    pub image: GrayImage,
    /// Neighbourhood size (odd, in pixels) used for the local mean
    pub block_size: u32,
    /// Constant subtracted from the local mean
    pub offset: f32,
    /// Processing time in milliseconds
    pub processing_time_ms: u32,
}

/// Result of morphological operations on binary images.
#[derive(Debug, Clone)]
pub struct MorphologicalImageResult {
    /// The morphologically processed image
    pub image: GrayImage,
    /// Type of morphological operation applied
    pub operation: MorphologicalOperation,
    /// Kernel size used (e.g., 3 for 3x3 kernel)
    pub kernel_size: u32,
    /// Processing time in milliseconds
    pub processing_time_ms: u32,
}

/// Types of morphological operations.
///
/// Text pixels (dark) are treated as foreground.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MorphologicalOperation {
    /// Erosion operation (shrinks text strokes)
    Erosion,
    /// Dilation operation (thickens text strokes)
    Dilation,
    /// Opening operation (erosion followed by dilation - removes specks)
    Opening,
    /// Closing operation (dilation followed by erosion - fills gaps)
    Closing,
}
