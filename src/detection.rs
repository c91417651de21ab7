//! Interface to the face detection, landmark and encoding models.
//!
//! The models themselves live outside this crate. Anything that can find
//! faces, place 68 landmarks and compute a 128-float encoding implements
//! [`FaceAnalyzer`].

use crate::{
    landmarks::{FaceEncoding, LandmarkSet},
    Result,
};
use opencv::core::{Mat, Rect};

/// Face detection result
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceRegion {
    /// Bounding box in full-resolution frame coordinates
    pub bbox: Rect,
    /// Detector confidence
    pub score: f32,
}

impl FaceRegion {
    /// Region with full confidence
    #[must_use]
    pub fn new(bbox: Rect) -> Self {
        Self { bbox, score: 1.0 }
    }
}

/// Detection, landmark and encoding collaborator
///
/// Every call may fail independently for a single face; callers decide
/// whether that is fatal.
pub trait FaceAnalyzer {
    /// Find faces in `frame`
    ///
    /// `scale` (0, 1] is the factor the detector may downscale the frame by
    /// internally; returned boxes are always in full-resolution coordinates.
    fn detect(&mut self, frame: &Mat, scale: f64) -> Result<Vec<FaceRegion>>;

    /// Place 68 landmarks for one detected face
    fn landmarks(&mut self, frame: &Mat, region: &FaceRegion) -> Result<LandmarkSet>;

    /// Compute the identity encoding for one face
    fn encode(&mut self, frame: &Mat, landmarks: &LandmarkSet) -> Result<FaceEncoding>;
}

/// A detected face with landmarks and encoding
#[derive(Debug, Clone)]
pub struct AnalyzedFace {
    /// Where the detector found the face
    pub region: FaceRegion,
    /// Landmarks in frame coordinates
    pub landmarks: LandmarkSet,
    /// Identity encoding
    pub encoding: FaceEncoding,
}

/// Landmarks plus encoding for one region
///
/// # Errors
///
/// Propagates the collaborator's landmark or encoding failure
pub fn analyze_region<A: FaceAnalyzer + ?Sized>(analyzer: &mut A, frame: &Mat, region: FaceRegion) -> Result<AnalyzedFace> {
    let landmarks = analyzer.landmarks(frame, &region)?;
    let encoding = analyzer.encode(frame, &landmarks)?;
    Ok(AnalyzedFace {
        region,
        landmarks,
        encoding,
    })
}
