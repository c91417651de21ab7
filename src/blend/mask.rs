//! Face masks from landmark outlines.

use crate::{accel::Acceleration, landmarks::LandmarkSet, Result};
use opencv::{
    core::{Mat, Point, Scalar, Size, Vector, CV_32F, CV_8U, CV_8UC1},
    imgproc,
    prelude::*,
};
use serde::{Deserialize, Serialize};

/// Mask value threshold separating inside from outside
const INSIDE_THRESHOLD: f64 = 127.0;

/// How the hard hull mask edge is softened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatherMode {
    /// Gaussian blur of the hull mask
    #[default]
    Gaussian,
    /// Inward ramp from the hull boundary via a distance transform
    Distance,
}

/// Solid convex hull of the jaw and eyebrow outline, 0 or 255
///
/// # Errors
///
/// Returns an error if `OpenCV` fails to rasterise the hull
pub fn hull_mask(landmarks: &LandmarkSet, size: Size) -> Result<Mat> {
    let mut mask = Mat::new_rows_cols_with_default(size.height, size.width, CV_8UC1, Scalar::all(0.0))?;
    let mut hull = Vector::<Point>::new();
    imgproc::convex_hull(&landmarks.outline_points(), &mut hull, false, true)?;
    imgproc::fill_convex_poly(&mut mask, &hull, Scalar::all(255.0), imgproc::LINE_8, 0)?;
    Ok(mask)
}

/// Gaussian feather with a `2 * amount + 1` kernel; `amount <= 0` leaves the mask as is
///
/// # Errors
///
/// Returns an error if blurring fails
pub fn gaussian_feather(mask: &Mat, amount: i32, accel: &Acceleration) -> Result<Mat> {
    if amount <= 0 {
        return Ok(mask.try_clone()?);
    }
    accel.gaussian_blur(mask, amount * 2 + 1)
}

/// Ramp from 0 at the mask boundary to 255 at `radius` pixels inside
///
/// Pixels outside the thresholded mask stay 0, so the feather never bleeds
/// past the original hull.
///
/// # Errors
///
/// Returns an error if the distance transform fails
pub fn distance_feather(mask: &Mat, radius: f32) -> Result<Mat> {
    let mut binary = Mat::default();
    imgproc::threshold(mask, &mut binary, INSIDE_THRESHOLD, 255.0, imgproc::THRESH_BINARY)?;

    let mut distance = Mat::default();
    imgproc::distance_transform(&binary, &mut distance, imgproc::DIST_L2, imgproc::DIST_MASK_5, CV_32F)?;

    // convert_to saturates, which clamps the ramp at 255
    let mut feathered = Mat::default();
    let scale = 255.0 / (f64::from(radius.max(0.0)) + 1e-6);
    distance.convert_to(&mut feathered, CV_8U, scale, 0.0)?;
    Ok(feathered)
}

/// Builds feathered face masks
#[derive(Debug, Clone)]
pub struct MaskBuilder {
    mode: FeatherMode,
    amount: i32,
    radius: f32,
    accel: Acceleration,
}

impl MaskBuilder {
    /// New builder; `amount` drives the Gaussian feather, `radius` the distance feather
    #[must_use]
    pub fn new(mode: FeatherMode, amount: i32, radius: f32, accel: Acceleration) -> Self {
        Self {
            mode,
            amount,
            radius,
            accel,
        }
    }

    /// Feathered hull mask for `landmarks` in a frame of `size`
    ///
    /// # Errors
    ///
    /// Returns an error if rasterising or feathering fails
    pub fn build(&self, landmarks: &LandmarkSet, size: Size) -> Result<Mat> {
        let mask = hull_mask(landmarks, size)?;
        match self.mode {
            FeatherMode::Gaussian => gaussian_feather(&mask, self.amount, &self.accel),
            FeatherMode::Distance => distance_feather(&mask, self.radius),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opencv::core;

    fn square_landmarks() -> LandmarkSet {
        // Outline points trace a 40x40 square, the rest sit in the middle
        let mut points = vec![(50.0, 50.0); 68];
        for (i, p) in points.iter_mut().take(27).enumerate() {
            let t = i as f32 / 27.0 * 4.0;
            *p = match t as i32 {
                0 => (30.0 + 40.0 * t, 30.0),
                1 => (70.0, 30.0 + 40.0 * (t - 1.0)),
                2 => (70.0 - 40.0 * (t - 2.0), 70.0),
                _ => (30.0, 70.0 - 40.0 * (t - 3.0)),
            };
        }
        LandmarkSet::from_tuples(&points).unwrap()
    }

    #[test]
    fn test_hull_mask_is_binary() {
        let mask = hull_mask(&square_landmarks(), Size::new(100, 100)).unwrap();
        assert!(core::count_non_zero(&mask).unwrap() > 1000);
        for v in mask.data_typed::<u8>().unwrap() {
            assert!(*v == 0 || *v == 255);
        }
    }

    #[test]
    fn test_distance_feather_ramps_inward() {
        let mask = hull_mask(&square_landmarks(), Size::new(100, 100)).unwrap();
        let feathered = distance_feather(&mask, 10.0).unwrap();
        assert_eq!(*feathered.at_2d::<u8>(10, 10).unwrap(), 0);
        assert_eq!(*feathered.at_2d::<u8>(50, 50).unwrap(), 255);
        let edge = *feathered.at_2d::<u8>(50, 32).unwrap();
        assert!(edge > 0 && edge < 255, "expected partial weight near the edge, got {edge}");
    }

    #[test]
    fn test_gaussian_feather_zero_is_identity() {
        let mask = hull_mask(&square_landmarks(), Size::new(100, 100)).unwrap();
        let same = gaussian_feather(&mask, 0, &Acceleration::cpu()).unwrap();
        assert_eq!(same.data_typed::<u8>().unwrap(), mask.data_typed::<u8>().unwrap());
    }
}
