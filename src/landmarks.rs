//! Landmark sets and face encodings.
//!
//! A [`LandmarkSet`] is always exactly 68 points in the canonical order; the
//! index ranges in [`crate::constants`] are relied on everywhere downstream.
//! A [`FaceEncoding`] is a 128-float identity embedding compared by Euclidean
//! distance.

use crate::{
    constants::{ENCODING_LENGTH, FACE_OUTLINE, LEFT_EYE, MOUTH, NUM_FACIAL_LANDMARKS, RIGHT_EYE},
    utils::safe_cast::f32_to_i32_clamp,
    Error, Result,
};
use ndarray::Array1;
use opencv::core::{Point, Point2f, Rect, Vector};
use std::ops::Range;

/// Ordered set of 68 facial landmarks in pixel coordinates
#[derive(Debug, Clone, PartialEq)]
pub struct LandmarkSet {
    points: Vec<Point2f>,
}

impl LandmarkSet {
    /// Build a landmark set, rejecting anything that is not 68 points
    ///
    /// # Errors
    ///
    /// Returns an error if the point count is wrong or a coordinate is not finite
    pub fn new(points: Vec<Point2f>) -> Result<Self> {
        if points.len() != NUM_FACIAL_LANDMARKS {
            return Err(Error::InvalidInput(format!(
                "Expected {} landmarks, got {}",
                NUM_FACIAL_LANDMARKS,
                points.len()
            )));
        }
        if let Some(bad) = points.iter().position(|p| !p.x.is_finite() || !p.y.is_finite()) {
            return Err(Error::InvalidInput(format!("Landmark {bad} has a non-finite coordinate")));
        }
        Ok(Self { points })
    }

    /// Build from `(x, y)` tuples
    ///
    /// # Errors
    ///
    /// Same as [`LandmarkSet::new`]
    pub fn from_tuples(points: &[(f32, f32)]) -> Result<Self> {
        Self::new(points.iter().map(|&(x, y)| Point2f::new(x, y)).collect())
    }

    /// Rebuild from a flattened `[x0, y0, x1, y1, ...]` vector
    ///
    /// # Errors
    ///
    /// Returns an error if the vector does not hold 136 values
    #[allow(clippy::cast_possible_truncation)]
    pub fn from_flat(values: &[f64]) -> Result<Self> {
        if values.len() != NUM_FACIAL_LANDMARKS * 2 {
            return Err(Error::InvalidInput(format!(
                "Expected {} flattened values, got {}",
                NUM_FACIAL_LANDMARKS * 2,
                values.len()
            )));
        }
        Self::new(
            values
                .chunks_exact(2)
                .map(|xy| Point2f::new(xy[0] as f32, xy[1] as f32))
                .collect(),
        )
    }

    /// Flatten to `[x0, y0, x1, y1, ...]`
    #[must_use]
    pub fn flatten(&self) -> Vec<f64> {
        self.points
            .iter()
            .flat_map(|p| [f64::from(p.x), f64::from(p.y)])
            .collect()
    }

    /// All points in canonical order
    #[must_use]
    pub fn points(&self) -> &[Point2f] {
        &self.points
    }

    /// Points in an index range
    #[must_use]
    pub fn region(&self, range: Range<usize>) -> &[Point2f] {
        &self.points[range]
    }

    /// Mean of the points in an index range
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn centroid_of(&self, range: Range<usize>) -> Point2f {
        let region = self.region(range);
        let n = region.len().max(1) as f32;
        let (sx, sy) = region.iter().fold((0.0f32, 0.0f32), |(sx, sy), p| (sx + p.x, sy + p.y));
        Point2f::new(sx / n, sy / n)
    }

    /// Mean of all 68 points
    #[must_use]
    pub fn centroid(&self) -> Point2f {
        self.centroid_of(0..NUM_FACIAL_LANDMARKS)
    }

    /// Left eye, right eye and mouth centroids, the three alignment anchors
    #[must_use]
    pub fn anchor_points(&self) -> [Point2f; 3] {
        [
            self.centroid_of(LEFT_EYE),
            self.centroid_of(RIGHT_EYE),
            self.centroid_of(MOUTH),
        ]
    }

    /// Jaw and eyebrow points rounded to integer pixels
    #[must_use]
    pub fn outline_points(&self) -> Vector<Point> {
        self.region(FACE_OUTLINE)
            .iter()
            .map(|p| {
                Point::new(
                    f32_to_i32_clamp(p.x.round(), i32::MIN / 2, i32::MAX / 2),
                    f32_to_i32_clamp(p.y.round(), i32::MIN / 2, i32::MAX / 2),
                )
            })
            .collect()
    }

    /// Axis-aligned bounding box of all points, expanded by `padding` and clipped to the frame
    ///
    /// Returns `None` when the clipped box is empty.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn padded_bounds(&self, padding: i32, frame_width: i32, frame_height: i32) -> Option<Rect> {
        let (min_x, min_y, max_x, max_y) = self.points.iter().fold(
            (f32::INFINITY, f32::INFINITY, f32::NEG_INFINITY, f32::NEG_INFINITY),
            |(x0, y0, x1, y1), p| (x0.min(p.x), y0.min(p.y), x1.max(p.x), y1.max(p.y)),
        );
        let left = (f32_to_i32_clamp(min_x, 0, frame_width) - padding).max(0);
        let top = (f32_to_i32_clamp(min_y, 0, frame_height) - padding).max(0);
        let right = (f32_to_i32_clamp(max_x, 0, frame_width) + padding).min(frame_width);
        let bottom = (f32_to_i32_clamp(max_y, 0, frame_height) + padding).min(frame_height);

        (right > left && bottom > top).then(|| Rect::new(left, top, right - left, bottom - top))
    }

    /// Copy with every point shifted by `(dx, dy)`
    #[must_use]
    pub fn translated(&self, dx: f32, dy: f32) -> Self {
        Self {
            points: self.points.iter().map(|p| Point2f::new(p.x + dx, p.y + dy)).collect(),
        }
    }
}

/// 128-dimensional face identity embedding
#[derive(Debug, Clone, PartialEq)]
pub struct FaceEncoding {
    values: Array1<f32>,
}

impl FaceEncoding {
    /// Wrap a raw encoding vector
    ///
    /// # Errors
    ///
    /// Returns an error if the vector is not 128 long or holds non-finite values
    pub fn new(values: Vec<f32>) -> Result<Self> {
        if values.len() != ENCODING_LENGTH {
            return Err(Error::InvalidInput(format!(
                "Expected encoding of length {}, got {}",
                ENCODING_LENGTH,
                values.len()
            )));
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(Error::InvalidInput("Encoding contains non-finite values".to_string()));
        }
        Ok(Self {
            values: Array1::from(values),
        })
    }

    /// Raw values
    #[must_use]
    pub fn as_slice(&self) -> &[f32] {
        self.values.as_slice().unwrap_or(&[])
    }

    /// Euclidean distance to another encoding
    #[must_use]
    pub fn distance(&self, other: &Self) -> f64 {
        let diff = &self.values - &other.values;
        f64::from(diff.dot(&diff)).sqrt()
    }
}
