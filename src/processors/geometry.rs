//! Geometry primitives shared by the detection and layout stages.
//!
//! Everything in this module works in image-pixel units with the origin at
//! the top-left corner and y growing downward, matching what the detectors
//! emit and what the rectifier consumes.

use serde::{Deserialize, Serialize};

/// A 2D point in image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point2f {
    /// The x coordinate.
    pub x: f32,
    /// The y coordinate.
    pub y: f32,
}

impl Point2f {
    /// Creates a new point.
    #[inline]
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Euclidean (L2) distance to another point.
    pub fn distance_to(&self, other: &Point2f) -> f32 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    /// Returns the point shifted by `(dx, dy)`.
    ///
    /// Used to apply the calibrated vertical correction to the bottom corner
    /// centroids before rectification.
    pub fn translate(&self, dx: f32, dy: f32) -> Point2f {
        Point2f::new(self.x + dx, self.y + dy)
    }
}

/// An axis-aligned bounding box with `x1 < x2` and `y1 < y2`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Left edge.
    pub x1: f32,
    /// Top edge.
    pub y1: f32,
    /// Right edge.
    pub x2: f32,
    /// Bottom edge.
    pub y2: f32,
}

impl BoundingBox {
    /// Creates a new bounding box from its corner coordinates.
    #[inline]
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Box width. Negative when the `x1 < x2` invariant is violated.
    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    /// Box height. Negative when the `y1 < y2` invariant is violated.
    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    /// Box area (width x height).
    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    /// The arithmetic center `((x1+x2)/2, (y1+y2)/2)`.
    pub fn center(&self) -> Point2f {
        Point2f::new((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
    }

    /// Area of the intersection rectangle, or 0.0 when the boxes are
    /// disjoint.
    pub fn intersection(&self, other: &BoundingBox) -> f32 {
        let x1 = self.x1.max(other.x1);
        let y1 = self.y1.max(other.y1);
        let x2 = self.x2.min(other.x2);
        let y2 = self.y2.min(other.y2);

        if x2 > x1 && y2 > y1 {
            (x2 - x1) * (y2 - y1)
        } else {
            0.0
        }
    }

    /// Intersection over union with another box.
    ///
    /// Returns a value in `[0, 1]`; 0.0 for disjoint or zero-area boxes.
    /// This is the similarity metric used by duplicate-box suppression.
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let intersection = self.intersection(other);
        let union = self.area() + other.area() - intersection;

        if union > 0.0 {
            intersection / union
        } else {
            0.0
        }
    }

    /// Clamps the box in place to `[0, width] x [0, height]`.
    pub fn clamp_to(&mut self, width: f32, height: f32) {
        self.x1 = self.x1.clamp(0.0, width);
        self.y1 = self.y1.clamp(0.0, height);
        self.x2 = self.x2.clamp(0.0, width);
        self.y2 = self.y2.clamp(0.0, height);
    }
}

/// One raw detector output: a box, the class it was assigned, and the
/// detector's confidence in `[0, 1]`.
///
/// A freshly detected batch carries no ordering guarantee; semantic order is
/// only established by canonical ordering (see
/// [`order_by_class`](crate::processors::ordering::order_by_class)).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// The detected region.
    pub bbox: BoundingBox,
    /// Detector class id.
    pub class_id: u32,
    /// Detector confidence score.
    pub confidence: f32,
}

impl Detection {
    /// Creates a new detection.
    pub fn new(bbox: BoundingBox, class_id: u32, confidence: f32) -> Self {
        Self {
            bbox,
            class_id,
            confidence,
        }
    }
}

/// Shoelace area of an ordered quadrilateral.
///
/// The corners must be given in a consistent winding order (the pipeline uses
/// top-left, top-right, bottom-right, bottom-left). The result is always
/// non-negative; near-zero values indicate a collapsed or near-collinear
/// quad, which the pipeline rejects before rectification.
pub fn quad_area(corners: &[Point2f; 4]) -> f32 {
    let mut acc = 0.0;
    for i in 0..4 {
        let a = corners[i];
        let b = corners[(i + 1) % 4];
        acc += a.x * b.y - b.x * a.y;
    }
    (acc / 2.0).abs()
}

/// Side lengths of an ordered quadrilateral, in edge order
/// `[top, right, bottom, left]` for corners ordered TL, TR, BR, BL.
pub fn quad_side_lengths(corners: &[Point2f; 4]) -> [f32; 4] {
    [
        corners[0].distance_to(&corners[1]),
        corners[1].distance_to(&corners[2]),
        corners[2].distance_to(&corners[3]),
        corners[3].distance_to(&corners[0]),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_centroid_is_arithmetic_center() {
        let bbox = BoundingBox::new(10.0, 20.0, 30.0, 60.0);
        let center = bbox.center();
        assert_eq!(center, Point2f::new(20.0, 40.0));
    }

    #[test]
    fn test_distance_is_euclidean() {
        let a = Point2f::new(0.0, 0.0);
        let b = Point2f::new(3.0, 4.0);
        assert!((a.distance_to(&b) - 5.0).abs() < 1e-6);
        assert!((b.distance_to(&a) - 5.0).abs() < 1e-6);
        assert_eq!(a.distance_to(&a), 0.0);
    }

    #[test]
    fn test_translate_shifts_both_axes() {
        let p = Point2f::new(5.0, 7.0);
        let shifted = p.translate(0.0, 30.0);
        assert_eq!(shifted, Point2f::new(5.0, 37.0));
        // original is untouched
        assert_eq!(p, Point2f::new(5.0, 7.0));
    }

    #[test]
    fn test_iou_identical_boxes() {
        let a = BoundingBox::new(0.0, 0.0, 4.0, 4.0);
        assert_eq!(a.iou(&a), 1.0);
    }

    #[test]
    fn test_iou_disjoint_boxes() {
        let a = BoundingBox::new(0.0, 0.0, 2.0, 2.0);
        let b = BoundingBox::new(3.0, 3.0, 5.0, 5.0);
        assert_eq!(a.iou(&b), 0.0);
        // edge-touching boxes have no overlapping area either
        let c = BoundingBox::new(2.0, 0.0, 4.0, 2.0);
        assert_eq!(a.iou(&c), 0.0);
    }

    #[test]
    fn test_iou_partial_overlap() {
        // intersection 2x2 = 4, union 16 + 16 - 4 = 28
        let a = BoundingBox::new(0.0, 0.0, 4.0, 4.0);
        let b = BoundingBox::new(2.0, 2.0, 6.0, 6.0);
        let expected = 4.0 / 28.0;
        assert!((a.iou(&b) - expected).abs() < 1e-6);
        assert!((b.iou(&a) - expected).abs() < 1e-6);
    }

    #[test]
    fn test_iou_zero_area_boxes() {
        let line = BoundingBox::new(0.0, 0.0, 5.0, 0.0);
        assert_eq!(line.iou(&line), 0.0);
    }

    #[test]
    fn test_clamp_to_bounds() {
        let mut bbox = BoundingBox::new(-10.0, -5.0, 650.0, 500.0);
        bbox.clamp_to(640.0, 480.0);
        assert_eq!(bbox, BoundingBox::new(0.0, 0.0, 640.0, 480.0));
    }

    #[test]
    fn test_quad_area_rectangle() {
        let corners = [
            Point2f::new(0.0, 0.0),
            Point2f::new(4.0, 0.0),
            Point2f::new(4.0, 3.0),
            Point2f::new(0.0, 3.0),
        ];
        assert!((quad_area(&corners) - 12.0).abs() < 1e-6);
    }

    #[test]
    fn test_quad_area_collinear_is_zero() {
        let corners = [
            Point2f::new(0.0, 0.0),
            Point2f::new(1.0, 1.0),
            Point2f::new(2.0, 2.0),
            Point2f::new(3.0, 3.0),
        ];
        assert!(quad_area(&corners) < 1e-6);
    }

    #[test]
    fn test_quad_area_winding_independent() {
        let cw = [
            Point2f::new(0.0, 0.0),
            Point2f::new(4.0, 0.0),
            Point2f::new(4.0, 3.0),
            Point2f::new(0.0, 3.0),
        ];
        let ccw = [cw[3], cw[2], cw[1], cw[0]];
        assert!((quad_area(&cw) - quad_area(&ccw)).abs() < 1e-6);
    }

    #[test]
    fn test_quad_side_lengths_order() {
        let corners = [
            Point2f::new(0.0, 0.0),
            Point2f::new(4.0, 0.0),
            Point2f::new(4.0, 3.0),
            Point2f::new(0.0, 3.0),
        ];
        let sides = quad_side_lengths(&corners);
        assert!((sides[0] - 4.0).abs() < 1e-6); // top
        assert!((sides[1] - 3.0).abs() < 1e-6); // right
        assert!((sides[2] - 4.0).abs() < 1e-6); // bottom
        assert!((sides[3] - 3.0).abs() < 1e-6); // left
    }
}
