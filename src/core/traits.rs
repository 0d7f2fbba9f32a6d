//! Model seams of the extraction pipeline.
//!
//! The pipeline's layout and validation rules are independent of any
//! particular network. These traits are the boundary: production code plugs
//! in ONNX-backed implementations, tests plug in scripted stand-ins and
//! exercise the whole decision tree without model files.

use image::RgbImage;

use crate::core::errors::ExtractError;
use crate::processors::geometry::Detection;

/// Detects class-labelled regions in an image.
///
/// Implementations return raw detections in model output order; ordering,
/// suppression and count checks all happen downstream.
pub trait RegionDetector: Send + Sync + std::fmt::Debug {
    /// Runs detection on one image.
    fn detect(&self, image: &RgbImage) -> Result<Vec<Detection>, ExtractError>;
}

/// Transcribes the text in a single field crop.
pub trait TextRecognizer: Send + Sync + std::fmt::Debug {
    /// Recognizes the text in `image`, returning the decoded string.
    fn recognize(&self, image: &RgbImage) -> Result<String, ExtractError>;
}
