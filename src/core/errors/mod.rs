//! Error handling for the extraction pipeline.

pub mod types;

pub use types::{ExtractError, ExtractionStage};
