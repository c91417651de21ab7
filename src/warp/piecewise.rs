//! Piecewise-affine warp over a Delaunay mesh.

use super::triangulation::{self, doubled_area, Triangle};
use crate::{
    accel::Acceleration,
    utils::{image_rect, intersect_rects, safe_cast::f32_to_i32_clamp},
    Error, Result,
};
use log::{debug, trace};
use opencv::{
    core::{Mat, Point, Point2f, Rect, Scalar, Size, Vec3b, Vector, BORDER_REFLECT_101, CV_8UC1, CV_8UC3},
    imgproc,
    prelude::*,
};

/// Minimum doubled triangle area below which a triangle counts as collinear
const MIN_DOUBLED_AREA: f32 = 1e-3;

/// Warp `source` so `src_points` land on `dst_points`, painting a blank canvas of `size`
///
/// The mesh is built over the destination points and applied to the source
/// points by index, so both slices must correspond one to one. Degenerate
/// triangles are skipped and leave the canvas black.
///
/// # Errors
///
/// Returns an error if the point lists differ in length or a primitive fails
pub fn warp_mesh(
    source: &Mat,
    src_points: &[Point2f],
    dst_points: &[Point2f],
    size: Size,
    accel: &Acceleration,
) -> Result<Mat> {
    if src_points.len() != dst_points.len() {
        return Err(Error::WarpError(format!(
            "Point count mismatch: {} source, {} destination",
            src_points.len(),
            dst_points.len()
        )));
    }

    let dst_points = triangulation::clamp_points(dst_points, size.width, size.height);
    let triangles = triangulation::delaunay_triangles(&dst_points, size.width, size.height)?;
    let mut canvas = Mat::new_rows_cols_with_default(size.height, size.width, CV_8UC3, Scalar::all(0.0))?;

    let mut skipped = 0usize;
    for triangle in &triangles {
        let painted = warp_triangle(source, &mut canvas, src_points, &dst_points, *triangle, accel)?;
        if !painted {
            skipped += 1;
        }
    }
    debug!("Mesh warp painted {} triangles, skipped {}", triangles.len() - skipped, skipped);

    Ok(canvas)
}

fn triangle_points(points: &[Point2f], triangle: Triangle) -> [Point2f; 3] {
    [points[triangle[0]], points[triangle[1]], points[triangle[2]]]
}

fn offset(points: &[Point2f; 3], origin: Rect) -> Vector<Point2f> {
    #[allow(clippy::cast_precision_loss)]
    let (ox, oy) = (origin.x as f32, origin.y as f32);
    points.iter().map(|p| Point2f::new(p.x - ox, p.y - oy)).collect()
}

/// Warp one triangle onto `canvas`, overwriting whatever is under its mask
///
/// Returns `false` when the triangle is degenerate and nothing was painted.
fn warp_triangle(
    source: &Mat,
    canvas: &mut Mat,
    src_points: &[Point2f],
    dst_points: &[Point2f],
    triangle: Triangle,
    accel: &Acceleration,
) -> Result<bool> {
    let src_tri = triangle_points(src_points, triangle);
    let dst_tri = triangle_points(dst_points, triangle);

    if doubled_area(src_tri[0], src_tri[1], src_tri[2]).abs() < MIN_DOUBLED_AREA
        || doubled_area(dst_tri[0], dst_tri[1], dst_tri[2]).abs() < MIN_DOUBLED_AREA
    {
        trace!("Skipping collinear triangle {:?}", triangle);
        return Ok(false);
    }

    let src_rect = imgproc::bounding_rect(&Vector::from_iter(src_tri))?;
    let dst_rect = imgproc::bounding_rect(&Vector::from_iter(dst_tri))?;
    if src_rect.width == 0 || src_rect.height == 0 || dst_rect.width == 0 || dst_rect.height == 0 {
        trace!("Skipping zero-extent triangle {:?}", triangle);
        return Ok(false);
    }

    let Some(src_crop_rect) = intersect_rects(src_rect, image_rect(source)) else {
        trace!("Source triangle {:?} lies outside the source image", triangle);
        return Ok(false);
    };
    let src_crop = Mat::roi(source, src_crop_rect)?.try_clone()?;

    let transform = imgproc::get_affine_transform(&offset(&src_tri, src_crop_rect), &offset(&dst_tri, dst_rect))?;
    let warped = accel.warp_affine(&src_crop, &transform, dst_rect.size(), BORDER_REFLECT_101)?;

    let mut mask = Mat::new_rows_cols_with_default(dst_rect.height, dst_rect.width, CV_8UC1, Scalar::all(0.0))?;
    let polygon: Vector<Point> = offset(&dst_tri, dst_rect)
        .iter()
        .map(|p| {
            Point::new(
                f32_to_i32_clamp(p.x.round(), 0, dst_rect.width),
                f32_to_i32_clamp(p.y.round(), 0, dst_rect.height),
            )
        })
        .collect();
    imgproc::fill_convex_poly(&mut mask, &polygon, Scalar::all(255.0), imgproc::LINE_8, 0)?;

    copy_masked(&warped, &mask, canvas, dst_rect)?;
    Ok(true)
}

/// Copy pixels of `patch` where `mask` is set into `canvas` at `at`, clipped to the canvas
fn copy_masked(patch: &Mat, mask: &Mat, canvas: &mut Mat, at: Rect) -> Result<()> {
    let Some(visible) = intersect_rects(at, image_rect(canvas)) else {
        return Ok(());
    };
    for y in visible.y..visible.y + visible.height {
        for x in visible.x..visible.x + visible.width {
            let (py, px) = (y - at.y, x - at.x);
            if *mask.at_2d::<u8>(py, px)? > 0 {
                *canvas.at_2d_mut::<Vec3b>(y, x)? = *patch.at_2d::<Vec3b>(py, px)?;
            }
        }
    }
    Ok(())
}
