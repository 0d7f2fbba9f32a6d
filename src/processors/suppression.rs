//! Greedy overlap suppression for detector output.
//!
//! Field detectors routinely emit several boxes for the same printed line.
//! Before layout resolution the batch is reduced so that no two surviving
//! boxes overlap above a configured IoU threshold, keeping the most
//! confident box of every overlapping cluster.

use crate::processors::geometry::Detection;

/// Suppresses overlapping detections, class-agnostically.
///
/// Detections are visited in descending confidence order; each survivor
/// discards every remaining box whose IoU with it reaches `iou_threshold`.
/// Survivors are returned in pick order, i.e. sorted by descending
/// confidence. Overlap is compared across class boundaries: two boxes of
/// different classes on the same printed line still compete.
pub fn suppress_overlaps(detections: &[Detection], iou_threshold: f32) -> Vec<Detection> {
    let mut candidates: Vec<Detection> = detections.to_vec();
    candidates.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut survivors: Vec<Detection> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let suppressed = survivors
            .iter()
            .any(|kept| kept.bbox.iou(&candidate.bbox) >= iou_threshold);
        if !suppressed {
            survivors.push(candidate);
        }
    }

    survivors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processors::geometry::BoundingBox;

    fn detection(bbox: BoundingBox, class_id: u32, confidence: f32) -> Detection {
        Detection::new(bbox, class_id, confidence)
    }

    #[test]
    fn test_disjoint_boxes_all_survive() {
        let batch = vec![
            detection(BoundingBox::new(0.0, 0.0, 10.0, 10.0), 0, 0.9),
            detection(BoundingBox::new(100.0, 0.0, 110.0, 10.0), 1, 0.8),
            detection(BoundingBox::new(0.0, 100.0, 10.0, 110.0), 2, 0.7),
        ];

        let kept = suppress_overlaps(&batch, 0.7);
        assert_eq!(kept.len(), 3);
    }

    #[test]
    fn test_heavy_overlap_keeps_most_confident() {
        // two boxes with IoU well above 0.7, the stronger one must survive
        let strong = detection(BoundingBox::new(0.0, 0.0, 100.0, 40.0), 3, 0.95);
        let weak = detection(BoundingBox::new(2.0, 1.0, 102.0, 41.0), 3, 0.60);
        assert!(strong.bbox.iou(&weak.bbox) > 0.85);

        let kept = suppress_overlaps(&[weak, strong], 0.7);
        assert_eq!(kept, vec![strong]);
    }

    #[test]
    fn test_suppression_crosses_class_boundaries() {
        // same printed line claimed by two classes: only one box survives
        let first = detection(BoundingBox::new(0.0, 0.0, 200.0, 30.0), 4, 0.9);
        let second = detection(BoundingBox::new(1.0, 0.0, 201.0, 30.0), 5, 0.8);

        let kept = suppress_overlaps(&[first, second], 0.7);
        assert_eq!(kept, vec![first]);
    }

    #[test]
    fn test_no_surviving_pair_overlaps_above_threshold() {
        let batch = vec![
            detection(BoundingBox::new(0.0, 0.0, 100.0, 30.0), 0, 0.9),
            detection(BoundingBox::new(5.0, 2.0, 105.0, 32.0), 1, 0.8),
            detection(BoundingBox::new(0.0, 40.0, 100.0, 70.0), 2, 0.85),
            detection(BoundingBox::new(2.0, 41.0, 102.0, 71.0), 3, 0.7),
            detection(BoundingBox::new(0.0, 80.0, 100.0, 110.0), 4, 0.6),
        ];

        let threshold = 0.7;
        let kept = suppress_overlaps(&batch, threshold);
        for (i, a) in kept.iter().enumerate() {
            for b in kept.iter().skip(i + 1) {
                assert!(
                    a.bbox.iou(&b.bbox) < threshold,
                    "survivors {:?} and {:?} still overlap",
                    a,
                    b
                );
            }
        }
    }

    #[test]
    fn test_borderline_overlap_below_threshold_survives() {
        // IoU just under the threshold keeps both boxes
        let a = detection(BoundingBox::new(0.0, 0.0, 100.0, 100.0), 0, 0.9);
        let b = detection(BoundingBox::new(35.0, 0.0, 135.0, 100.0), 1, 0.8);
        let iou = a.bbox.iou(&b.bbox);
        assert!(iou < 0.7 && iou > 0.4);

        let kept = suppress_overlaps(&[a, b], 0.7);
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn test_survivors_sorted_by_confidence() {
        let batch = vec![
            detection(BoundingBox::new(0.0, 0.0, 10.0, 10.0), 0, 0.5),
            detection(BoundingBox::new(50.0, 0.0, 60.0, 10.0), 1, 0.9),
            detection(BoundingBox::new(0.0, 50.0, 10.0, 60.0), 2, 0.7),
        ];

        let kept = suppress_overlaps(&batch, 0.7);
        let confidences: Vec<f32> = kept.iter().map(|d| d.confidence).collect();
        assert_eq!(confidences, vec![0.9, 0.7, 0.5]);
    }

    #[test]
    fn test_empty_batch() {
        assert!(suppress_overlaps(&[], 0.7).is_empty());
    }
}
