//! Identity-document field extraction.
//!
//! This crate turns a photograph of an identity document into an ordered list
//! of recognized text fields. Two ONNX detector passes drive the pipeline: a
//! corner detector locates the four physical corners of the card, the photo is
//! perspective-rectified from those corners, and a field detector locates the
//! semantic text regions on the rectified card. The detected regions are
//! deduplicated, mapped into canonical layout positions, widened where the
//! detector is known to crop too tightly, cropped, and handed to a text
//! recognizer.
//!
//! # Modules
//!
//! - [`core`] - errors, configuration and the detector/recognizer seams
//! - [`processors`] - geometry primitives, canonical ordering, overlap
//!   suppression
//! - [`utils`] - perspective rectification, cropping, logging setup
//! - [`models`] - ONNX detector and recognizer implementations
//! - [`extractor`] - the [`IdCardOCR`] pipeline orchestrator
//!
//! # Example
//!
//! ```rust,no_run
//! use idcard_ocr::IdCardOCRBuilder;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let ocr = IdCardOCRBuilder::new(
//!     "models/corner.onnx",
//!     "models/field.onnx",
//!     "models/rec.onnx",
//!     "models/charset.txt",
//! )
//! .build()?;
//!
//! let image = image::open("card.jpg")?.to_rgb8();
//! let result = ocr.extract_fields(&image)?;
//! for field in &result.fields {
//!     println!("{field}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod core;
pub mod extractor;
pub mod models;
pub mod processors;
pub mod utils;

pub use crate::core::errors::{ExtractError, ExtractionStage};
pub use extractor::{IdCardOCR, IdCardOCRBuilder, IdCardOCRResult};
