//! Geometry primitives and detection post-processing.
//!
//! Everything in this module is pure: plain data in, plain data out, no
//! sessions and no I/O. That keeps the layout-resolution rules unit-testable
//! without model files.

pub mod geometry;
pub mod ordering;
pub mod suppression;

pub use geometry::*;
pub use ordering::*;
pub use suppression::*;
