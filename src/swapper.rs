//! Single-face swap: align, color-correct, composite.

use crate::{
    blend::{
        color::{ColorMatcher, GainSmoother},
        mask::hull_mask,
        Blender,
    },
    constants::FACE_REGION_PADDING,
    identity::SwapSource,
    landmarks::LandmarkSet,
    utils::{crop, ensure_bgr},
    warp::WarpEngine,
    Result,
};
use log::debug;
use opencv::{core::Mat, prelude::*};

/// Replaces one face in a frame with a source face
pub struct FaceSwapper {
    warp: WarpEngine,
    color: Option<ColorMatcher>,
    blender: Blender,
}

impl FaceSwapper {
    /// Create a swapper; `color` of `None` disables color correction
    #[must_use]
    pub fn new(warp: WarpEngine, color: Option<ColorMatcher>, blender: Blender) -> Self {
        Self { warp, color, blender }
    }

    /// Warp engine in use
    #[must_use]
    pub fn warp_engine(&self) -> &WarpEngine {
        &self.warp
    }

    /// Swap `source` onto the face at `target` and return the new frame
    ///
    /// `frame` is not modified. `gains` smooths mean-gain color factors over
    /// time for the identity being swapped.
    ///
    /// # Errors
    ///
    /// Returns an error from any stage; seamless-clone failure alone is
    /// absorbed by the alpha-blend fallback
    pub fn swap_face(
        &self,
        frame: &Mat,
        target: &LandmarkSet,
        source: &SwapSource,
        gains: Option<&mut GainSmoother>,
    ) -> Result<Mat> {
        let frame = ensure_bgr(frame)?;
        let source_image = ensure_bgr(&source.image)?;
        let size = frame.size()?;

        let aligned = self.warp.align(&source_image, &source.landmarks, target, size)?;
        let mask = self.blender.face_mask(target, &frame)?;

        let aligned = match &self.color {
            Some(matcher) if extract_face_region(&frame, target)?.is_some() => {
                let region = hull_mask(target, size)?;
                matcher.correct(&aligned, &frame, &region, gains)?
            }
            Some(_) => {
                debug!("Face region empty, skipping color correction");
                aligned
            }
            None => aligned,
        };

        self.blender.composite(&aligned, &frame, &mask, target)
    }
}

/// Crop of the landmark bounding box padded by 20 pixels, `None` if it falls outside the frame
///
/// # Errors
///
/// Returns an error if copying the region fails
pub fn extract_face_region(frame: &Mat, landmarks: &LandmarkSet) -> Result<Option<Mat>> {
    match landmarks.padded_bounds(FACE_REGION_PADDING, frame.cols(), frame.rows()) {
        Some(rect) => Ok(Some(crop(frame, rect)?)),
        None => Ok(None),
    }
}
