//! Card layout configuration for the two detection passes.
//!
//! The numeric calibration here (offsets, thresholds, counts) is part of the
//! card layout contract: the defaults encode the layout the stock models
//! were trained on, and every value is validated once when the pipeline is
//! built.

use serde::{Deserialize, Serialize};

use super::errors::{ConfigError, ConfigValidator};
use crate::processors::ordering::ClassOrderTable;

/// Configuration of the corner detection pass.
///
/// The order table maps the four corner classes to canonical positions 0-3
/// (top-left, top-right, bottom-right, bottom-left). `bottom_offset_y` pulls
/// the two bottom corner centroids downward before rectification to
/// compensate for the corner markers sitting above the card's physical
/// bottom edge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CornerConfig {
    /// Class-to-position table for the corner detector.
    pub order: ClassOrderTable,
    /// Pixels added to the y coordinate of the bottom two corner centroids.
    pub bottom_offset_y: f32,
    /// Minimum length of every quad side, in pixels.
    pub min_quad_side: f32,
    /// Minimum quad area, in square pixels.
    pub min_quad_area: f32,
}

impl Default for CornerConfig {
    fn default() -> Self {
        Self {
            order: ClassOrderTable::identity(4),
            bottom_offset_y: 30.0,
            min_quad_side: 1.0,
            min_quad_area: 1.0,
        }
    }
}

impl ConfigValidator for CornerConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        self.order.validate()?;
        if self.order.len() != 4 {
            return Err(ConfigError::InvalidConfig {
                message: format!(
                    "corner order table must map exactly 4 classes, got {}",
                    self.order.len()
                ),
            });
        }
        if !self.bottom_offset_y.is_finite() {
            return Err(ConfigError::ValidationFailed {
                message: format!(
                    "bottom corner offset must be finite, got {}",
                    self.bottom_offset_y
                ),
            });
        }
        self.validate_positive("minimum quad side", self.min_quad_side)?;
        self.validate_positive("minimum quad area", self.min_quad_area)?;
        Ok(())
    }

    fn get_defaults() -> Self {
        Self::default()
    }
}

/// Widening applied to the right edge of trailing long-text fields.
///
/// Boxes whose canonical index `i` satisfies `low_exclusive < i <
/// high_exclusive` get `pixels` added to their right edge before cropping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrailingExtension {
    /// Lower exclusive bound on the canonical index.
    pub low_exclusive: usize,
    /// Upper exclusive bound on the canonical index.
    pub high_exclusive: usize,
    /// Pixels added to the right edge.
    pub pixels: f32,
}

/// Joins two entries of the recognized field list into one.
///
/// `first` and `second` address the recognized list (which excludes the
/// non-text portrait field), not canonical detector indices. The entry at
/// `second` is folded into the entry at `first` with `separator` between
/// them, shrinking the list by one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeRule {
    /// Recognized-list position that receives the joined text.
    pub first: usize,
    /// Recognized-list position that is folded into `first`.
    pub second: usize,
    /// Text placed between the two parts.
    pub separator: String,
}

/// Configuration of the field detection pass on the rectified card.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldConfig {
    /// Class-to-position table for the field detector.
    pub order: ClassOrderTable,
    /// IoU at or above which two boxes are considered duplicates.
    pub iou_threshold: f32,
    /// Minimum number of raw detections for a usable card.
    pub min_count: usize,
    /// Class whose presence raises the minimum by one and triggers the
    /// merge rule.
    pub optional_class: u32,
    /// Right-edge widening of the trailing long-text fields.
    pub extension: TrailingExtension,
    /// How the split long-text field is reassembled after recognition.
    pub merge: MergeRule,
}

impl Default for FieldConfig {
    fn default() -> Self {
        Self {
            order: ClassOrderTable::identity(10),
            iou_threshold: 0.7,
            min_count: 9,
            optional_class: 7,
            extension: TrailingExtension {
                low_exclusive: 5,
                high_exclusive: 9,
                pixels: 100.0,
            },
            merge: MergeRule {
                first: 6,
                second: 7,
                separator: ", ".to_string(),
            },
        }
    }
}

impl FieldConfig {
    /// Minimum raw detection count when the optional class was seen.
    pub fn min_count_with_optional(&self) -> usize {
        self.min_count + 1
    }
}

impl ConfigValidator for FieldConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        self.order.validate()?;
        self.validate_unit_threshold("IoU threshold", self.iou_threshold)?;

        if self.min_count == 0 {
            return Err(ConfigError::ValidationFailed {
                message: "minimum field count must be at least 1".to_string(),
            });
        }
        if self.min_count_with_optional() > self.order.len() {
            return Err(ConfigError::InvalidConfig {
                message: format!(
                    "minimum field count {} (+1 optional) exceeds the {} classes in the order table",
                    self.min_count,
                    self.order.len()
                ),
            });
        }
        if self.order.position_of(self.optional_class).is_none() {
            return Err(ConfigError::InvalidConfig {
                message: format!(
                    "optional class {} is not present in the field order table",
                    self.optional_class
                ),
            });
        }

        if self.extension.low_exclusive + 1 >= self.extension.high_exclusive {
            return Err(ConfigError::InvalidConfig {
                message: format!(
                    "trailing extension range ({}, {}) selects no indices",
                    self.extension.low_exclusive, self.extension.high_exclusive
                ),
            });
        }
        if !self.extension.pixels.is_finite() || self.extension.pixels < 0.0 {
            return Err(ConfigError::ValidationFailed {
                message: format!(
                    "trailing extension must be a non-negative number of pixels, got {}",
                    self.extension.pixels
                ),
            });
        }

        if self.merge.first == self.merge.second {
            return Err(ConfigError::InvalidConfig {
                message: format!(
                    "merge rule joins a recognized-list position with itself ({})",
                    self.merge.first
                ),
            });
        }

        Ok(())
    }

    fn get_defaults() -> Self {
        Self::default()
    }
}
