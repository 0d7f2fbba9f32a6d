//! Canonical class-to-position ordering of detector output.
//!
//! Detectors return boxes in whatever order the model emits them. Layout
//! resolution maps every box through a static `class id -> canonical
//! position` table and produces a sequence sorted by canonical position,
//! re-indexed densely from 0. The table is part of the pipeline
//! configuration and is validated once at startup, not per request.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::core::config::ConfigError;
use crate::core::errors::ExtractError;
use crate::processors::geometry::Detection;

/// A static mapping from detector class id to canonical layout position.
///
/// One table exists per detection pass (one for the corner detector, one for
/// the field detector). A valid table has unique class ids and positions that
/// densely cover `0..len`, so that sorting by position yields a well-defined
/// canonical sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassOrderTable {
    positions: HashMap<u32, usize>,
}

impl ClassOrderTable {
    /// Builds a table from `(class_id, canonical_position)` pairs.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when the table is empty, a class id or a
    /// position appears twice, or the positions do not densely cover
    /// `0..len`.
    pub fn from_pairs(pairs: &[(u32, usize)]) -> Result<Self, ConfigError> {
        let mut positions = HashMap::with_capacity(pairs.len());
        for &(class_id, position) in pairs {
            if positions.insert(class_id, position).is_some() {
                return Err(ConfigError::InvalidConfig {
                    message: format!("class id {class_id} appears twice in class order table"),
                });
            }
        }

        let table = Self { positions };
        table.validate()?;
        Ok(table)
    }

    /// Checks the table invariants: non-empty, positions unique and densely
    /// covering `0..len`.
    ///
    /// Deserialized tables have not gone through [`Self::from_pairs`], so the
    /// owning configuration re-runs this check at startup.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.positions.is_empty() {
            return Err(ConfigError::InvalidConfig {
                message: "class order table must not be empty".to_string(),
            });
        }

        let mut seen = vec![false; self.positions.len()];
        for (&class_id, &position) in &self.positions {
            if position >= seen.len() || seen[position] {
                return Err(ConfigError::InvalidConfig {
                    message: format!(
                        "class order table positions must densely cover 0..{}, position {} of class {} is out of place",
                        self.positions.len(),
                        position,
                        class_id
                    ),
                });
            }
            seen[position] = true;
        }

        Ok(())
    }

    /// Builds the identity table `class i -> position i` over `0..count`.
    ///
    /// This is the shape both stock detectors are trained with, so the
    /// default corner and field configurations use it.
    pub fn identity(count: usize) -> Self {
        Self {
            positions: (0..count).map(|i| (i as u32, i)).collect(),
        }
    }

    /// The canonical position of a class id, or `None` when the class is not
    /// part of this table.
    pub fn position_of(&self, class_id: u32) -> Option<usize> {
        self.positions.get(&class_id).copied()
    }

    /// Number of class slots in the table.
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Returns true when the table has no entries.
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

/// Reorders detections into their canonical layout positions.
///
/// Every detection is mapped through the table; the output is sorted by
/// canonical position and re-indexed densely from 0, so absent classes leave
/// no gap. When two detections claim the same class slot, the one with the
/// higher confidence wins (ties keep the earlier detection, which keeps the
/// operation deterministic). The operation is idempotent.
///
/// # Errors
///
/// A detection whose class id is missing from the table is a configuration
/// error: the table no longer matches the model that produced the batch.
pub fn order_by_class(
    detections: &[Detection],
    table: &ClassOrderTable,
) -> Result<Vec<Detection>, ExtractError> {
    let mut slots: Vec<Option<Detection>> = vec![None; table.len()];

    for detection in detections {
        let position = table.position_of(detection.class_id).ok_or_else(|| {
            ExtractError::config_error_detailed(
                "class ordering",
                format!(
                    "class id {} produced by the detector is not present in the order table",
                    detection.class_id
                ),
            )
        })?;

        match &slots[position] {
            Some(existing) if existing.confidence >= detection.confidence => {}
            _ => slots[position] = Some(*detection),
        }
    }

    Ok(slots.into_iter().flatten().collect())
}

/// Widens the right edge of the trailing long-text fields.
///
/// The field detector systematically crops variable-length text (address
/// lines and similar) too tightly on the right. Every box whose canonical
/// index `i` satisfies `low_exclusive < i < high_exclusive` gets `pixels`
/// added to its `x2`; all other boxes are returned unchanged, bit for bit.
/// Cropping clamps to the image later, so the widened edge may exceed the
/// rectified width.
pub fn extend_trailing_fields(
    detections: &[Detection],
    low_exclusive: usize,
    high_exclusive: usize,
    pixels: f32,
) -> Vec<Detection> {
    detections
        .iter()
        .enumerate()
        .map(|(index, detection)| {
            if index > low_exclusive && index < high_exclusive {
                let mut widened = *detection;
                widened.bbox.x2 += pixels;
                widened
            } else {
                *detection
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processors::geometry::BoundingBox;

    fn detection(class_id: u32, confidence: f32) -> Detection {
        let offset = class_id as f32 * 50.0;
        Detection::new(
            BoundingBox::new(offset, offset, offset + 40.0, offset + 20.0),
            class_id,
            confidence,
        )
    }

    #[test]
    fn test_identity_table_lookup() {
        let table = ClassOrderTable::identity(4);
        assert_eq!(table.len(), 4);
        assert_eq!(table.position_of(0), Some(0));
        assert_eq!(table.position_of(3), Some(3));
        assert_eq!(table.position_of(4), None);
    }

    #[test]
    fn test_from_pairs_rejects_duplicate_class() {
        let result = ClassOrderTable::from_pairs(&[(0, 0), (0, 1)]);
        assert!(result.is_err());
    }

    #[test]
    fn test_from_pairs_rejects_duplicate_position() {
        let result = ClassOrderTable::from_pairs(&[(0, 0), (1, 0)]);
        assert!(result.is_err());
    }

    #[test]
    fn test_from_pairs_rejects_sparse_positions() {
        // positions {0, 2} leave a hole at 1
        let result = ClassOrderTable::from_pairs(&[(0, 0), (1, 2)]);
        assert!(result.is_err());
    }

    #[test]
    fn test_from_pairs_rejects_empty_table() {
        assert!(ClassOrderTable::from_pairs(&[]).is_err());
    }

    #[test]
    fn test_from_pairs_accepts_permutation() {
        let table = ClassOrderTable::from_pairs(&[(2, 0), (0, 1), (1, 2)]).unwrap();
        assert_eq!(table.position_of(2), Some(0));
        assert_eq!(table.position_of(0), Some(1));
    }

    #[test]
    fn test_order_by_class_sorts_into_canonical_positions() {
        let table = ClassOrderTable::identity(4);
        let batch = vec![
            detection(2, 0.9),
            detection(0, 0.8),
            detection(3, 0.7),
            detection(1, 0.95),
        ];

        let ordered = order_by_class(&batch, &table).unwrap();
        let classes: Vec<u32> = ordered.iter().map(|d| d.class_id).collect();
        assert_eq!(classes, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_order_by_class_dense_when_classes_missing() {
        let table = ClassOrderTable::identity(10);
        // classes 0..=9 without 7: nine detections, indices stay dense
        let batch: Vec<Detection> = (0..10u32)
            .filter(|&c| c != 7)
            .map(|c| detection(c, 0.9))
            .collect();

        let ordered = order_by_class(&batch, &table).unwrap();
        assert_eq!(ordered.len(), 9);
        let classes: Vec<u32> = ordered.iter().map(|d| d.class_id).collect();
        assert_eq!(classes, vec![0, 1, 2, 3, 4, 5, 6, 8, 9]);
    }

    #[test]
    fn test_order_by_class_keeps_highest_confidence_per_slot() {
        let table = ClassOrderTable::identity(4);
        let weak = detection(1, 0.4);
        let strong = detection(1, 0.9);
        let batch = vec![detection(0, 0.8), weak, strong, detection(2, 0.7)];

        let ordered = order_by_class(&batch, &table).unwrap();
        assert_eq!(ordered.len(), 3);
        assert_eq!(ordered[1], strong);
    }

    #[test]
    fn test_order_by_class_is_idempotent() {
        let table = ClassOrderTable::identity(5);
        let batch = vec![
            detection(4, 0.6),
            detection(1, 0.9),
            detection(3, 0.8),
            detection(0, 0.7),
        ];

        let once = order_by_class(&batch, &table).unwrap();
        let twice = order_by_class(&once, &table).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_order_by_class_unknown_class_is_error() {
        let table = ClassOrderTable::identity(2);
        let batch = vec![detection(0, 0.9), detection(5, 0.9)];
        assert!(order_by_class(&batch, &table).is_err());
    }

    #[test]
    fn test_extend_trailing_fields_widens_only_target_range() {
        let batch: Vec<Detection> = (0..10u32).map(|c| detection(c, 0.9)).collect();
        let extended = extend_trailing_fields(&batch, 5, 9, 100.0);

        assert_eq!(extended.len(), batch.len());
        for (index, (before, after)) in batch.iter().zip(&extended).enumerate() {
            if index > 5 && index < 9 {
                assert_eq!(after.bbox.x2, before.bbox.x2 + 100.0, "index {index}");
                // the right edge is the only thing that moves
                assert_eq!(after.bbox.x1, before.bbox.x1);
                assert_eq!(after.bbox.y1, before.bbox.y1);
                assert_eq!(after.bbox.y2, before.bbox.y2);
                assert_eq!(after.class_id, before.class_id);
                assert_eq!(after.confidence, before.confidence);
            } else {
                assert_eq!(after, before, "index {index} must pass through unchanged");
            }
        }
    }

    #[test]
    fn test_extend_trailing_fields_short_sequence_untouched() {
        let batch: Vec<Detection> = (0..4u32).map(|c| detection(c, 0.9)).collect();
        let extended = extend_trailing_fields(&batch, 5, 9, 100.0);
        assert_eq!(extended, batch);
    }
}
