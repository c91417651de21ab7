//! Compositing an aligned source face onto the target frame.

/// Face masks and feathering
pub mod mask;

/// Color correction
pub mod color;

/// Laplacian pyramid blending
pub mod pyramid;

/// Seamless clone and alpha fallback
pub mod clone;

use crate::{landmarks::LandmarkSet, utils::safe_cast::f32_to_i32_clamp, Result};
use clone::CloneMode;
use log::info;
use mask::MaskBuilder;
use opencv::{
    core::{Mat, Point},
    prelude::*,
};
use serde::{Deserialize, Serialize};

/// Compositing method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlendMethod {
    /// Poisson clone with alpha fallback
    #[default]
    Seamless,
    /// Straight alpha blend with the feathered mask
    Alpha,
    /// Multi-band pyramid blend
    Laplacian,
}

/// Builds the face mask and composites with the configured method
#[derive(Debug, Clone)]
pub struct Blender {
    method: BlendMethod,
    masks: MaskBuilder,
    clone_mode: CloneMode,
    pyramid_levels: usize,
}

impl Blender {
    /// Create a blender
    #[must_use]
    pub fn new(method: BlendMethod, masks: MaskBuilder, clone_mode: CloneMode, pyramid_levels: usize) -> Self {
        info!("Blender: {:?} ({:?} clone, {} pyramid levels)", method, clone_mode, pyramid_levels);
        Self {
            method,
            masks,
            clone_mode,
            pyramid_levels,
        }
    }

    /// Configured method
    #[must_use]
    pub fn method(&self) -> BlendMethod {
        self.method
    }

    /// Feathered face mask for `landmarks` sized like `frame`
    ///
    /// # Errors
    ///
    /// Returns an error if the mask cannot be rasterised
    pub fn face_mask(&self, landmarks: &LandmarkSet, frame: &Mat) -> Result<Mat> {
        self.masks.build(landmarks, frame.size()?)
    }

    /// Composite `aligned` onto `frame` inside `mask`
    ///
    /// The seamless path anchors the clone at the landmark centroid.
    ///
    /// # Errors
    ///
    /// Returns an error if the inputs are mismatched
    pub fn composite(&self, aligned: &Mat, frame: &Mat, mask: &Mat, landmarks: &LandmarkSet) -> Result<Mat> {
        match self.method {
            BlendMethod::Seamless => {
                let c = landmarks.centroid();
                let center = Point::new(
                    f32_to_i32_clamp(c.x, 0, frame.cols() - 1),
                    f32_to_i32_clamp(c.y, 0, frame.rows() - 1),
                );
                clone::clone_or_blend(aligned, frame, mask, center, self.clone_mode)
            }
            BlendMethod::Alpha => clone::alpha_blend(aligned, frame, mask),
            BlendMethod::Laplacian => pyramid::laplacian_blend(aligned, frame, mask, self.pyramid_levels),
        }
    }
}
