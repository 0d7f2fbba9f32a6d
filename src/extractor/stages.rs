//! Resolution stages between the detectors and the recognizer.
//!
//! Everything here is deterministic and sessionless: raw detector batches go
//! in, corner quads and canonically ordered field boxes come out. The
//! [`IdCardOCR`](crate::extractor::IdCardOCR) orchestrator wires these stages
//! to the actual models.

use crate::core::config::{CornerConfig, FieldConfig, MergeRule};
use crate::core::errors::ExtractError;
use crate::processors::{
    Detection, Point2f, extend_trailing_fields, order_by_class, quad_area, quad_side_lengths,
    suppress_overlaps,
};

/// Resolves a corner detection batch into the four corrected corner points,
/// ordered top-left, top-right, bottom-right, bottom-left.
///
/// The batch must cover exactly the configured number of distinct corner
/// classes (duplicates of a class are allowed; the highest-confidence box
/// represents it). Each corner point is the centroid of its box, with the
/// calibrated vertical offset applied to the two bottom corners. Quads that
/// cannot describe a physical card are rejected as [`DegenerateGeometry`].
///
/// [`DegenerateGeometry`]: ExtractError::DegenerateGeometry
pub fn resolve_corners(
    detections: &[Detection],
    config: &CornerConfig,
) -> Result<[Point2f; 4], ExtractError> {
    let expected = config.order.len();
    let mut classes: Vec<u32> = detections.iter().map(|d| d.class_id).collect();
    classes.sort_unstable();
    classes.dedup();
    if classes.len() != expected {
        return Err(ExtractError::corner_count_mismatch(expected, classes.len()));
    }

    let ordered = order_by_class(detections, &config.order)?;
    let centroids: Vec<Point2f> = ordered.iter().map(|d| d.bbox.center()).collect();
    let mut corners: [Point2f; 4] = centroids.try_into().map_err(|_| {
        ExtractError::config_error_detailed(
            "corner order table",
            "the corner table must map exactly 4 classes",
        )
    })?;

    // The detector centers the bottom landmarks above the true card edge;
    // push them down by the calibrated offset.
    corners[2] = corners[2].translate(0.0, config.bottom_offset_y);
    corners[3] = corners[3].translate(0.0, config.bottom_offset_y);

    screen_degenerate(&corners, config)?;

    Ok(corners)
}

/// Rejects quads with a collapsed side or a near-zero area.
fn screen_degenerate(corners: &[Point2f; 4], config: &CornerConfig) -> Result<(), ExtractError> {
    let side_names = ["top", "right", "bottom", "left"];
    for (name, length) in side_names.iter().zip(quad_side_lengths(corners)) {
        if length < config.min_quad_side {
            return Err(ExtractError::degenerate_geometry(format!(
                "{name} side {length:.2} is below the minimum {:.2}",
                config.min_quad_side
            )));
        }
    }

    let area = quad_area(corners);
    if area < config.min_quad_area {
        return Err(ExtractError::degenerate_geometry(format!(
            "quad area {area:.2} is below the minimum {:.2}",
            config.min_quad_area
        )));
    }

    Ok(())
}

/// Resolves a field detection batch into canonically ordered, extended boxes.
///
/// The minimum-count check runs on the raw batch, before duplicate
/// suppression, and the bound is raised by one when the optional class is
/// present. Survivors are ordered by canonical position and the trailing
/// text fields get their right edges extended.
pub fn resolve_fields(
    detections: &[Detection],
    config: &FieldConfig,
) -> Result<Vec<Detection>, ExtractError> {
    let found = detections.len();
    let has_optional = detections
        .iter()
        .any(|d| d.class_id == config.optional_class);

    if has_optional {
        let required = config.min_count_with_optional();
        if found < required {
            return Err(ExtractError::insufficient_fields_with_optional(
                required, found,
            ));
        }
    } else if found < config.min_count {
        return Err(ExtractError::insufficient_fields(config.min_count, found));
    }

    let surviving = suppress_overlaps(detections, config.iou_threshold);
    let ordered = order_by_class(&surviving, &config.order)?;

    Ok(extend_trailing_fields(
        &ordered,
        config.extension.low_exclusive,
        config.extension.high_exclusive,
        config.extension.pixels,
    ))
}

/// Folds the optional field's companion entry into its neighbor.
///
/// Positions address the recognized list (which excludes the reserved
/// portrait field). The entry at `rule.second` is appended to the entry at
/// `rule.first` with the configured separator and removed, so the list
/// shrinks by one. Out-of-range positions leave the list unchanged.
pub fn merge_optional_fields(mut texts: Vec<String>, rule: &MergeRule) -> Vec<String> {
    if rule.first >= texts.len() || rule.second >= texts.len() || rule.first == rule.second {
        return texts;
    }

    let folded = texts.remove(rule.second);
    let target = if rule.second < rule.first {
        rule.first - 1
    } else {
        rule.first
    };
    let entry = &mut texts[target];
    entry.push_str(&rule.separator);
    entry.push_str(&folded);

    texts
}
