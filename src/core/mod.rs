//! The core module of the extraction pipeline.
//!
//! This module contains the fundamental components shared by every stage:
//! - Configuration management (card layout, ONNX Runtime sessions)
//! - Error handling
//! - The model traits the pipeline is generic over
//!
//! It also re-exports the commonly used types for convenience.

pub mod config;
pub mod errors;
pub mod traits;

pub use config::{
    ConfigError, ConfigValidator, CornerConfig, FieldConfig, MergeRule, OrtExecutionProvider,
    OrtGraphOptimizationLevel, OrtSessionConfig, TrailingExtension,
};
pub use errors::{ExtractError, ExtractionStage};
pub use traits::{RegionDetector, TextRecognizer};
