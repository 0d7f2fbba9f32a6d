//! ONNX model wrappers.
//!
//! Models are pure inference components: they own their sessions and their
//! pre/post-processing, and they know nothing about card layouts. The
//! extraction pipeline drives them through the [`RegionDetector`] and
//! [`TextRecognizer`] traits.
//!
//! [`RegionDetector`]: crate::core::traits::RegionDetector
//! [`TextRecognizer`]: crate::core::traits::TextRecognizer

pub mod detection;
pub mod recognition;

pub use detection::{YoloDetector, YoloDetectorBuilder};
pub use recognition::{CtcRecognizer, CtcRecognizerBuilder};
