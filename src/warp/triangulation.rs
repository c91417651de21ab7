//! Delaunay triangulation over landmark points.

use crate::{constants::TRIANGLE_VERTEX_TOLERANCE, Error, Result};
use log::debug;
use opencv::{
    core::{Point2f, Rect, Vec6f, Vector},
    imgproc::Subdiv2D,
    prelude::*,
};

/// Index triple into the point array a triangulation was built from
pub type Triangle = [usize; 3];

/// Points of `landmarks` followed by the four frame corners
///
/// Corners sit on the last pixel row/column so they are inside the
/// subdivision rectangle.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn with_frame_corners(landmarks: &[Point2f], width: i32, height: i32) -> Vec<Point2f> {
    let right = (width - 1).max(0) as f32;
    let bottom = (height - 1).max(0) as f32;
    let mut points = landmarks.to_vec();
    points.extend_from_slice(&[
        Point2f::new(0.0, 0.0),
        Point2f::new(right, 0.0),
        Point2f::new(right, bottom),
        Point2f::new(0.0, bottom),
    ]);
    points
}

/// Clamp points into `[0, width-1] x [0, height-1]`
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn clamp_points(points: &[Point2f], width: i32, height: i32) -> Vec<Point2f> {
    let right = (width - 1).max(0) as f32;
    let bottom = (height - 1).max(0) as f32;
    points
        .iter()
        .map(|p| Point2f::new(p.x.clamp(0.0, right), p.y.clamp(0.0, bottom)))
        .collect()
}

fn nearest_index(points: &[Point2f], x: f32, y: f32) -> Option<usize> {
    points
        .iter()
        .enumerate()
        .map(|(i, p)| (i, (p.x - x).hypot(p.y - y)))
        .filter(|&(_, d)| d < TRIANGLE_VERTEX_TOLERANCE)
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(i, _)| i)
}

/// Delaunay triangles over `points` inside a `width` x `height` frame
///
/// Points are clamped into the frame before insertion. Triangles touching
/// the subdivision's virtual outer vertices, or whose vertices do not map
/// back to three distinct input points, are dropped.
///
/// # Errors
///
/// Returns an error for an empty frame or if the subdivision fails
pub fn delaunay_triangles(points: &[Point2f], width: i32, height: i32) -> Result<Vec<Triangle>> {
    if width <= 0 || height <= 0 {
        return Err(Error::WarpError(format!("Cannot triangulate a {width}x{height} frame")));
    }

    let clamped = clamp_points(points, width, height);
    let mut subdiv = Subdiv2D::new(Rect::new(0, 0, width, height))?;
    for p in &clamped {
        subdiv.insert(*p)?;
    }

    let mut raw = Vector::<Vec6f>::new();
    subdiv.get_triangle_list(&mut raw)?;

    let triangles: Vec<Triangle> = raw
        .iter()
        .filter_map(|t| {
            let v = t.0;
            let a = nearest_index(&clamped, v[0], v[1])?;
            let b = nearest_index(&clamped, v[2], v[3])?;
            let c = nearest_index(&clamped, v[4], v[5])?;
            (a != b && b != c && a != c).then_some([a, b, c])
        })
        .collect();

    debug!("Triangulated {} points into {} triangles", points.len(), triangles.len());
    Ok(triangles)
}

/// Twice the signed area of a triangle
#[must_use]
pub fn doubled_area(a: Point2f, b: Point2f, c: Point2f) -> f32 {
    (b.x - a.x) * (c.y - a.y) - (c.x - a.x) * (b.y - a.y)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_square_with_center() {
        let points = with_frame_corners(&[Point2f::new(50.0, 50.0)], 101, 101);
        let triangles = delaunay_triangles(&points, 101, 101).unwrap();
        assert_eq!(triangles.len(), 4);
        for t in &triangles {
            assert!(t.contains(&0), "every triangle should use the center point");
        }
    }

    #[test]
    fn test_indices_are_distinct_and_valid() {
        let landmarks = vec![
            Point2f::new(30.0, 30.0),
            Point2f::new(30.0, 30.5),
            Point2f::new(70.0, 40.0),
            Point2f::new(50.0, 80.0),
        ];
        let points = with_frame_corners(&landmarks, 100, 100);
        for t in delaunay_triangles(&points, 100, 100).unwrap() {
            assert!(t.iter().all(|&i| i < points.len()));
            assert!(t[0] != t[1] && t[1] != t[2] && t[0] != t[2]);
        }
    }

    #[test]
    fn test_out_of_frame_points_are_clamped() {
        let landmarks = vec![Point2f::new(-20.0, 50.0), Point2f::new(150.0, 50.0)];
        let points = with_frame_corners(&landmarks, 100, 100);
        assert!(!delaunay_triangles(&points, 100, 100).unwrap().is_empty());
    }

    #[test]
    fn test_empty_frame_rejected() {
        assert!(delaunay_triangles(&[], 0, 10).is_err());
    }
}
