//! High-level identity-document extraction pipeline.
//!
//! [`IdCardOCR`] orchestrates the full run: corner detection and resolution,
//! perspective rectification, field detection and layout resolution,
//! cropping, and text recognition. The deterministic stages between the
//! models live in [`stages`].

pub mod pipeline;
pub mod result;
pub mod stages;

pub use pipeline::{IdCardOCR, IdCardOCRBuilder};
pub use result::IdCardOCRResult;
pub use stages::{merge_optional_fields, resolve_corners, resolve_fields};
