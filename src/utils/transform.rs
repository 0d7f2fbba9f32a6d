//! Perspective rectification of the detected card quadrilateral.
//!
//! Once the four corner centroids are resolved and ordered (top-left,
//! top-right, bottom-right, bottom-left), the card is warped into an
//! axis-aligned rectangle so that the field detector sees a flat document.
//! The warp uses inverse mapping with bilinear sampling and border
//! replication, which matches how the crops behave at the card edges.

use crate::core::errors::ExtractError;
use crate::processors::geometry::{Point2f, quad_side_lengths};
use image::{Rgb, RgbImage};
use nalgebra::{Matrix3, Vector3};
use rayon::prelude::*;
use tracing::debug;

/// Warps the quadrilateral spanned by `corners` into an axis-aligned image.
///
/// `corners` must already be in canonical order: top-left, top-right,
/// bottom-right, bottom-left. The output width is the rounded maximum of the
/// top and bottom edge lengths, the output height the rounded maximum of the
/// left and right edge lengths, so the longer pair of opposite edges sets
/// the scale and no content is squeezed below its detected size.
///
/// Geometric sanity of the quad (side lengths, area, orientation) is the
/// caller's concern; this function only rejects input it cannot produce an
/// image from.
///
/// # Errors
///
/// Returns an error when the source image is empty, either output dimension
/// rounds to zero, or the corner correspondence does not yield a solvable
/// homography.
pub fn rectify_document(
    src_image: &RgbImage,
    corners: &[Point2f; 4],
) -> Result<RgbImage, ExtractError> {
    if src_image.width() == 0 || src_image.height() == 0 {
        return Err(ExtractError::InvalidInput {
            message: "cannot rectify an empty source image".to_string(),
        });
    }

    let [top, right, bottom, left] = quad_side_lengths(corners);
    let dst_width = top.max(bottom).round() as u32;
    let dst_height = left.max(right).round() as u32;

    if dst_width == 0 || dst_height == 0 {
        return Err(ExtractError::InvalidInput {
            message: format!(
                "rectified dimensions collapsed to {dst_width}x{dst_height}, corner quad is degenerate"
            ),
        });
    }

    // Destination rectangle addresses pixel centers, hence the -1 on each
    // far edge: corner (W-1, H-1) is the last pixel, not one past it.
    let dst_points = [
        Point2f::new(0.0, 0.0),
        Point2f::new(dst_width as f32 - 1.0, 0.0),
        Point2f::new(dst_width as f32 - 1.0, dst_height as f32 - 1.0),
        Point2f::new(0.0, dst_height as f32 - 1.0),
    ];

    let matrix = perspective_matrix(corners, &dst_points)?;
    let rectified = warp_perspective(src_image, &matrix, dst_width, dst_height)?;

    debug!(
        "Rectified {}x{} source into {}x{} document",
        src_image.width(),
        src_image.height(),
        dst_width,
        dst_height
    );

    Ok(rectified)
}

/// Solves for the 3x3 homography mapping `src_points` onto `dst_points`.
///
/// The eight unknown coefficients (the ninth is fixed to 1) come from the
/// standard two-equations-per-correspondence linear system, solved by LU
/// decomposition.
fn perspective_matrix(
    src_points: &[Point2f; 4],
    dst_points: &[Point2f; 4],
) -> Result<Matrix3<f32>, ExtractError> {
    let mut a = nalgebra::DMatrix::<f32>::zeros(8, 8);
    let mut b = nalgebra::DVector::<f32>::zeros(8);

    for i in 0..4 {
        let src = &src_points[i];
        let dst = &dst_points[i];

        a.set_row(
            i * 2,
            &nalgebra::RowDVector::from_row_slice(&[
                src.x,
                src.y,
                1.0,
                0.0,
                0.0,
                0.0,
                -src.x * dst.x,
                -src.y * dst.x,
            ]),
        );
        b[i * 2] = dst.x;

        a.set_row(
            i * 2 + 1,
            &nalgebra::RowDVector::from_row_slice(&[
                0.0,
                0.0,
                0.0,
                src.x,
                src.y,
                1.0,
                -src.x * dst.y,
                -src.y * dst.y,
            ]),
        );
        b[i * 2 + 1] = dst.y;
    }

    let solution = a.lu().solve(&b).ok_or_else(|| ExtractError::InvalidInput {
        message: "corner correspondence does not define a perspective transform".to_string(),
    })?;

    Ok(Matrix3::new(
        solution[0],
        solution[1],
        solution[2],
        solution[3],
        solution[4],
        solution[5],
        solution[6],
        solution[7],
        1.0,
    ))
}

/// Applies `transform_matrix` to `src_image` by inverse mapping.
///
/// Every destination pixel is projected back through the inverted matrix and
/// sampled bilinearly; rows are filled in parallel.
fn warp_perspective(
    src_image: &RgbImage,
    transform_matrix: &Matrix3<f32>,
    dst_width: u32,
    dst_height: u32,
) -> Result<RgbImage, ExtractError> {
    let inv_matrix = transform_matrix
        .try_inverse()
        .ok_or_else(|| ExtractError::InvalidInput {
            message: "perspective transform matrix is singular".to_string(),
        })?;

    let mut dst_image = RgbImage::new(dst_width, dst_height);
    let buffer: &mut [u8] = dst_image.as_mut();

    buffer
        .par_chunks_mut((dst_width * 3) as usize)
        .enumerate()
        .for_each(|(dst_y, row_buffer)| {
            for dst_x in 0..dst_width {
                let dst_point = Vector3::new(dst_x as f32, dst_y as f32, 1.0);
                let src_point = inv_matrix * dst_point;
                let pixel = if src_point.z.abs() > f32::EPSILON {
                    bilinear_interpolate(
                        src_image,
                        src_point.x / src_point.z,
                        src_point.y / src_point.z,
                    )
                } else {
                    // Point at infinity: fall back to the nearest border pixel
                    get_pixel_replicate(src_image, 0, 0)
                };
                let index = (dst_x * 3) as usize;
                row_buffer[index..index + 3].copy_from_slice(&pixel.0);
            }
        });

    Ok(dst_image)
}

/// Reads a pixel with border replication for out-of-bounds coordinates.
#[inline]
fn get_pixel_replicate(image: &RgbImage, x: i32, y: i32) -> Rgb<u8> {
    let clamped_x = x.clamp(0, image.width() as i32 - 1) as u32;
    let clamped_y = y.clamp(0, image.height() as i32 - 1) as u32;
    *image.get_pixel(clamped_x, clamped_y)
}

/// Samples the image at a fractional coordinate with bilinear weighting.
///
/// The four neighbors are fetched with border replication, so coordinates
/// slightly outside the image resolve to the nearest edge pixel instead of
/// panicking.
fn bilinear_interpolate(image: &RgbImage, x: f32, y: f32) -> Rgb<u8> {
    let x_int = x.floor() as i32;
    let y_int = y.floor() as i32;
    let dx = x - x_int as f32;
    let dy = y - y_int as f32;

    let p11 = get_pixel_replicate(image, x_int, y_int);
    let p12 = get_pixel_replicate(image, x_int, y_int + 1);
    let p21 = get_pixel_replicate(image, x_int + 1, y_int);
    let p22 = get_pixel_replicate(image, x_int + 1, y_int + 1);

    let mut result = [0u8; 3];
    for (i, result_channel) in result.iter_mut().enumerate() {
        let val = (1.0 - dx) * (1.0 - dy) * p11.0[i] as f32
            + dx * (1.0 - dy) * p21.0[i] as f32
            + (1.0 - dx) * dy * p12.0[i] as f32
            + dx * dy * p22.0[i] as f32;
        *result_channel = val.round().clamp(0.0, 255.0) as u8;
    }

    Rgb(result)
}
