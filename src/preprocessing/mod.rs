//! # Image Preprocessing Module
//!
//! This module turns chat screenshots into binary bitmaps ready for OCR.
//!
//! The module is organized into focused sub-modules:
//! - `filtering`: Gaussian noise reduction and morphological operations
//! - `thresholding`: Adaptive (locally computed) binarization
//! - `normalizer`: The fixed decode → grayscale → blur → threshold → opening pipeline
//! - `types`: Shared types and error definitions

pub mod filtering;
pub mod normalizer;
pub mod thresholding;
pub mod types;

// Re-export commonly used types and functions for convenience
pub use types::{
    DenoisedImageResult, ImageSource, MorphologicalImageResult, MorphologicalOperation,
    NormalizedBitmap, PreprocessingError, RawImage, ThresholdedImageResult,
};

pub use filtering::{apply_morphological_operation, reduce_noise};
pub use normalizer::{ImageNormalizer, NormalizerConfig};
pub use thresholding::apply_adaptive_threshold;
