//! Geometric alignment of a source face onto target landmarks.

/// Delaunay mesh construction
pub mod triangulation;

/// Per-triangle affine warp
pub mod piecewise;

/// Thin-plate spline warp
#[cfg(feature = "smooth-warp")]
pub mod thin_plate;

use crate::{accel::Acceleration, capabilities::Capabilities, landmarks::LandmarkSet, Error, Result};
use log::{info, warn};
use opencv::{
    core::{Mat, Size, Vector, BORDER_CONSTANT},
    imgproc,
    prelude::*,
};
use serde::{Deserialize, Serialize};

/// How the source face is aligned to the target geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarpMode {
    /// Single affine transform from eye and mouth centroids
    #[default]
    Affine,
    /// Piecewise affine over a Delaunay mesh of the target landmarks
    Triangulated,
    /// Thin-plate spline, falling back to the mesh warp if fitting fails
    Smooth,
}

impl std::fmt::Display for WarpMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Affine => "affine",
            Self::Triangulated => "triangulated",
            Self::Smooth => "smooth",
        };
        f.write_str(name)
    }
}

/// The 2x3 affine transform taking the source eye/eye/mouth centroids onto the target's
///
/// # Errors
///
/// Returns [`Error::WarpError`] if either anchor triple is collinear
pub fn anchor_transform(source: &LandmarkSet, target: &LandmarkSet) -> Result<Mat> {
    let src = source.anchor_points();
    let dst = target.anchor_points();
    for (name, tri) in [("source", &src), ("target", &dst)] {
        if triangulation::doubled_area(tri[0], tri[1], tri[2]).abs() < f32::EPSILON {
            return Err(Error::WarpError(format!("{name} eye and mouth centroids are collinear")));
        }
    }
    Ok(imgproc::get_affine_transform(
        &Vector::from_iter(src),
        &Vector::from_iter(dst),
    )?)
}

/// Aligns source images to target landmark geometry
#[derive(Debug, Clone)]
pub struct WarpEngine {
    mode: WarpMode,
    accel: Acceleration,
}

impl WarpEngine {
    /// Create an engine for `mode`
    ///
    /// # Errors
    ///
    /// Returns [`Error::CapabilityUnavailable`] when `mode` is smooth and the
    /// capability is missing
    pub fn new(mode: WarpMode, capabilities: &Capabilities, accel: Acceleration) -> Result<Self> {
        if mode == WarpMode::Smooth {
            capabilities.require_smooth_warp()?;
        }
        info!("Warp engine: {} mode on {}", mode, accel.backend_name());
        Ok(Self { mode, accel })
    }

    /// Configured mode
    #[must_use]
    pub fn mode(&self) -> WarpMode {
        self.mode
    }

    /// Warp `source` into a canvas of `size` aligned to `target`
    ///
    /// # Errors
    ///
    /// Returns an error if the transform cannot be estimated or resampling fails
    pub fn align(&self, source: &Mat, source_landmarks: &LandmarkSet, target: &LandmarkSet, size: Size) -> Result<Mat> {
        match self.mode {
            WarpMode::Affine => self.align_affine(source, source_landmarks, target, size),
            WarpMode::Triangulated => self.align_mesh(source, source_landmarks, target, size),
            WarpMode::Smooth => self.align_smooth(source, source_landmarks, target, size),
        }
    }

    /// Whole-image affine warp from three anchor correspondences
    ///
    /// # Errors
    ///
    /// Returns an error if the anchors are degenerate
    pub fn align_affine(
        &self,
        source: &Mat,
        source_landmarks: &LandmarkSet,
        target: &LandmarkSet,
        size: Size,
    ) -> Result<Mat> {
        let transform = anchor_transform(source_landmarks, target)?;
        self.accel.warp_affine(source, &transform, size, BORDER_CONSTANT)
    }

    /// Mesh warp over landmarks plus frame corners
    ///
    /// # Errors
    ///
    /// Returns an error if triangulation or resampling fails
    pub fn align_mesh(
        &self,
        source: &Mat,
        source_landmarks: &LandmarkSet,
        target: &LandmarkSet,
        size: Size,
    ) -> Result<Mat> {
        let src_points = triangulation::with_frame_corners(source_landmarks.points(), source.cols(), source.rows());
        let dst_points = triangulation::with_frame_corners(target.points(), size.width, size.height);
        piecewise::warp_mesh(source, &src_points, &dst_points, size, &self.accel)
    }

    #[cfg(feature = "smooth-warp")]
    fn align_smooth(&self, source: &Mat, source_landmarks: &LandmarkSet, target: &LandmarkSet, size: Size) -> Result<Mat> {
        let src_points = triangulation::with_frame_corners(source_landmarks.points(), source.cols(), source.rows());
        let dst_points = triangulation::with_frame_corners(target.points(), size.width, size.height);
        match thin_plate::warp_smooth(source, &src_points, &dst_points, size) {
            Ok(warped) => Ok(warped),
            Err(e) => {
                warn!("Smooth warp failed, using mesh warp: {}", e);
                piecewise::warp_mesh(source, &src_points, &dst_points, size, &self.accel)
            }
        }
    }

    #[cfg(not(feature = "smooth-warp"))]
    fn align_smooth(&self, source: &Mat, source_landmarks: &LandmarkSet, target: &LandmarkSet, size: Size) -> Result<Mat> {
        warn!("Smooth warp not compiled in, using mesh warp");
        self.align_mesh(source, source_landmarks, target, size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opencv::core::Point2f;

    fn face(offset: f32) -> LandmarkSet {
        let points: Vec<(f32, f32)> = (0..68)
            .map(|i| {
                let angle = i as f32 * 0.37;
                (50.0 + offset + 20.0 * angle.cos(), 50.0 + 25.0 * angle.sin())
            })
            .collect();
        LandmarkSet::from_tuples(&points).unwrap()
    }

    #[test]
    fn test_anchor_transform_identity() {
        let lm = face(0.0);
        let m = anchor_transform(&lm, &lm).unwrap();
        assert!((m.at_2d::<f64>(0, 0).unwrap() - 1.0).abs() < 1e-6);
        assert!(m.at_2d::<f64>(0, 2).unwrap().abs() < 1e-4);
        assert!((m.at_2d::<f64>(1, 1).unwrap() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_anchor_transform_translation() {
        let m = anchor_transform(&face(0.0), &face(7.0)).unwrap();
        assert!((m.at_2d::<f64>(0, 2).unwrap() - 7.0).abs() < 1e-3);
    }

    #[test]
    fn test_collinear_anchors_rejected() {
        let flat = LandmarkSet::new(vec![Point2f::new(5.0, 5.0); 68]).unwrap();
        assert!(matches!(anchor_transform(&flat, &flat), Err(Error::WarpError(_))));
    }

    #[test]
    fn test_smooth_mode_needs_capability() {
        let err = WarpEngine::new(WarpMode::Smooth, &Capabilities::baseline(), Acceleration::cpu()).unwrap_err();
        assert!(matches!(err, Error::CapabilityUnavailable(_)));
        assert!(WarpEngine::new(WarpMode::Triangulated, &Capabilities::baseline(), Acceleration::cpu()).is_ok());
    }

    #[test]
    fn test_warp_mode_names() {
        assert_eq!(WarpMode::default(), WarpMode::Affine);
        assert_eq!(serde_yaml::from_str::<WarpMode>("triangulated").unwrap(), WarpMode::Triangulated);
        assert_eq!(WarpMode::Smooth.to_string(), "smooth");
    }
}
