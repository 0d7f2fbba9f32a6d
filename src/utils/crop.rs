//! Field cropping from the rectified document.
//!
//! Field boxes come straight from the detector (possibly widened on the
//! right), so they may poke past the image edges. Cropping clamps to the
//! image instead of failing; only a box that leaves no pixels at all is an
//! error.

use crate::core::errors::ExtractError;
use crate::processors::geometry::BoundingBox;
use image::{RgbImage, imageops};

/// Crops one field region out of `image`.
///
/// Coordinates are truncated to whole pixels and clamped to the image, so a
/// box hanging over the right or bottom edge yields the in-bounds part.
///
/// # Errors
///
/// Returns an error when the clamped region is empty, i.e. the box lies
/// entirely outside the image or collapses to a line.
pub fn crop_field(image: &RgbImage, bbox: &BoundingBox) -> Result<RgbImage, ExtractError> {
    let x1 = (bbox.x1.max(0.0) as u32).min(image.width());
    let y1 = (bbox.y1.max(0.0) as u32).min(image.height());
    let x2 = (bbox.x2.max(0.0) as u32).min(image.width());
    let y2 = (bbox.y2.max(0.0) as u32).min(image.height());

    if x2 <= x1 || y2 <= y1 {
        return Err(ExtractError::InvalidInput {
            message: format!(
                "field box ({:.1}, {:.1})-({:.1}, {:.1}) leaves no pixels after clamping to {}x{}",
                bbox.x1,
                bbox.y1,
                bbox.x2,
                bbox.y2,
                image.width(),
                image.height()
            ),
        });
    }

    Ok(imageops::crop_imm(image, x1, y1, x2 - x1, y2 - y1).to_image())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn test_image(width: u32, height: u32) -> RgbImage {
        let mut image = RgbImage::new(width, height);
        for y in 0..height {
            for x in 0..width {
                image.put_pixel(x, y, Rgb([x as u8, y as u8, 128]));
            }
        }
        image
    }

    #[test]
    fn test_crop_interior_box() {
        let image = test_image(100, 60);
        let bbox = BoundingBox::new(10.0, 20.0, 50.0, 40.0);

        let crop = crop_field(&image, &bbox).unwrap();
        assert_eq!(crop.dimensions(), (40, 20));
        assert_eq!(crop.get_pixel(0, 0), image.get_pixel(10, 20));
        assert_eq!(crop.get_pixel(39, 19), image.get_pixel(49, 39));
    }

    #[test]
    fn test_crop_clamps_widened_right_edge() {
        // a +100px widened box hanging over the right edge keeps the
        // in-bounds part
        let image = test_image(100, 60);
        let bbox = BoundingBox::new(60.0, 10.0, 190.0, 30.0);

        let crop = crop_field(&image, &bbox).unwrap();
        assert_eq!(crop.dimensions(), (40, 20));
        assert_eq!(crop.get_pixel(0, 0), image.get_pixel(60, 10));
    }

    #[test]
    fn test_crop_clamps_negative_origin() {
        let image = test_image(100, 60);
        let bbox = BoundingBox::new(-15.0, -5.0, 30.0, 25.0);

        let crop = crop_field(&image, &bbox).unwrap();
        assert_eq!(crop.dimensions(), (30, 25));
        assert_eq!(crop.get_pixel(0, 0), image.get_pixel(0, 0));
    }

    #[test]
    fn test_crop_fully_outside_is_error() {
        let image = test_image(100, 60);
        let bbox = BoundingBox::new(150.0, 80.0, 200.0, 120.0);
        assert!(crop_field(&image, &bbox).is_err());
    }

    #[test]
    fn test_crop_zero_area_box_is_error() {
        let image = test_image(100, 60);
        let bbox = BoundingBox::new(40.0, 10.0, 40.0, 30.0);
        assert!(crop_field(&image, &bbox).is_err());
    }

    #[test]
    fn test_crop_truncates_fractional_coordinates() {
        let image = test_image(100, 60);
        let bbox = BoundingBox::new(10.7, 20.9, 50.2, 40.8);

        let crop = crop_field(&image, &bbox).unwrap();
        assert_eq!(crop.dimensions(), (40, 20));
        assert_eq!(crop.get_pixel(0, 0), image.get_pixel(10, 20));
    }
}
