//! Result type for the extraction pipeline.

use std::fmt;
use std::sync::Arc;

use image::RgbImage;
use serde::{Deserialize, Serialize};

use crate::processors::{Detection, Point2f};

/// Result of one extraction pipeline run.
///
/// All boxes and corner points are in the coordinate system they were
/// resolved in: `corners` in the source image, `field_boxes` in the
/// rectified image. `fields` is the ordered recognized text list, portrait
/// excluded and the optional merge already applied.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdCardOCRResult {
    /// Request id the run was tagged with (also the crop dump namespace).
    pub request_id: String,
    /// Ordered recognized field texts.
    pub fields: Vec<String>,
    /// Resolved field boxes in canonical order, rectified-image coordinates.
    pub field_boxes: Vec<Detection>,
    /// Corrected corner points (top-left, top-right, bottom-right,
    /// bottom-left) in source-image coordinates.
    pub corners: [Point2f; 4],
    /// The rectified document image.
    #[serde(skip)]
    pub rectified_img: Arc<RgbImage>,
    /// Whether the optional field class survived field resolution.
    pub optional_present: bool,
}

impl IdCardOCRResult {
    /// Number of recognized fields.
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// The recognized text at a list position, if present.
    pub fn field(&self, position: usize) -> Option<&str> {
        self.fields.get(position).map(String::as_str)
    }
}

impl fmt::Display for IdCardOCRResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Request: {}", self.request_id)?;
        writeln!(
            f,
            "Rectified card: [{} x {}]",
            self.rectified_img.width(),
            self.rectified_img.height()
        )?;
        writeln!(
            f,
            "Optional field: {}",
            if self.optional_present {
                "present"
            } else {
                "absent"
            }
        )?;

        writeln!(f, "Fields ({}):", self.fields.len())?;
        for (position, text) in self.fields.iter().enumerate() {
            writeln!(f, "  {position}: '{text}'")?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> IdCardOCRResult {
        IdCardOCRResult {
            request_id: "test-request".to_string(),
            fields: vec!["Zhang San".to_string(), "Male".to_string()],
            field_boxes: Vec::new(),
            corners: [
                Point2f::new(0.0, 0.0),
                Point2f::new(100.0, 0.0),
                Point2f::new(100.0, 60.0),
                Point2f::new(0.0, 60.0),
            ],
            rectified_img: Arc::new(RgbImage::new(100, 60)),
            optional_present: false,
        }
    }

    #[test]
    fn test_field_accessors() {
        let result = sample();
        assert_eq!(result.field_count(), 2);
        assert_eq!(result.field(1), Some("Male"));
        assert_eq!(result.field(2), None);
    }

    #[test]
    fn test_display_lists_fields() {
        let rendered = sample().to_string();
        assert!(rendered.contains("test-request"));
        assert!(rendered.contains("[100 x 60]"));
        assert!(rendered.contains("0: 'Zhang San'"));
        assert!(rendered.contains("1: 'Male'"));
    }
}
