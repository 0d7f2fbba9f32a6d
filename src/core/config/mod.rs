//! Configuration management for the extraction pipeline.
//!
//! Everything that calibrates the pipeline lives here: the card layout
//! contract for both detection passes and the ONNX Runtime session settings.
//! All of it is plain serde data validated once at startup.

pub mod errors;
pub mod layout;
pub mod onnx;

pub use errors::{ConfigError, ConfigValidator};
pub use layout::{CornerConfig, FieldConfig, MergeRule, TrailingExtension};
pub use onnx::{OrtExecutionProvider, OrtGraphOptimizationLevel, OrtSessionConfig};
