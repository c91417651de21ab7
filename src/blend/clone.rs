//! Poisson (seamless) cloning with an alpha-blend fallback.

use crate::{utils::safe_cast::saturate_u8, Error, Result};
use log::warn;
use opencv::{
    core::{self, Mat, Point, Vec3b, CV_8UC1, CV_8UC3},
    photo,
    prelude::*,
};
use serde::{Deserialize, Serialize};

/// Gradient handling for seamless cloning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloneMode {
    /// Source gradients replace the target's inside the mask
    #[default]
    Normal,
    /// Stronger of source and target gradient per pixel
    Mixed,
}

impl CloneMode {
    fn flag(self) -> i32 {
        match self {
            Self::Normal => photo::NORMAL_CLONE,
            Self::Mixed => photo::MIXED_CLONE,
        }
    }
}

fn check_inputs(source: &Mat, target: &Mat, mask: &Mat) -> Result<()> {
    let size = target.size()?;
    if source.size()? != size || mask.size()? != size {
        return Err(Error::BlendError(format!(
            "Source {:?}, target {:?} and mask {:?} must be the same size",
            source.size()?,
            size,
            mask.size()?
        )));
    }
    if source.typ() != CV_8UC3 || target.typ() != CV_8UC3 || mask.typ() != CV_8UC1 {
        return Err(Error::BlendError("Expected 8-bit BGR images and an 8-bit mask".to_string()));
    }
    Ok(())
}

/// Gradient-domain clone of `source` into `target` centred at `center`
///
/// # Errors
///
/// Returns [`Error::BlendError`] for an empty mask or mismatched inputs, and
/// the `OpenCV` error if cloning itself fails
pub fn seamless_clone(source: &Mat, target: &Mat, mask: &Mat, center: Point, mode: CloneMode) -> Result<Mat> {
    check_inputs(source, target, mask)?;
    if core::count_non_zero(mask)? == 0 {
        return Err(Error::BlendError("Seamless clone mask is empty".to_string()));
    }
    let mut blended = Mat::default();
    photo::seamless_clone(source, target, mask, center, &mut blended, mode.flag())?;
    Ok(blended)
}

/// Per-pixel `source * m + target * (1 - m)` with `m = mask / 255`
///
/// # Errors
///
/// Returns [`Error::BlendError`] for mismatched inputs
pub fn alpha_blend(source: &Mat, target: &Mat, mask: &Mat) -> Result<Mat> {
    check_inputs(source, target, mask)?;
    let source = source.try_clone()?;
    let mask = mask.try_clone()?;
    let mut out = target.try_clone()?;

    let src_px = source.data_typed::<Vec3b>()?;
    let weights = mask.data_typed::<u8>()?;
    for ((dst, src), w) in out.data_typed_mut::<Vec3b>()?.iter_mut().zip(src_px).zip(weights) {
        let m = f64::from(*w) / 255.0;
        for c in 0..3 {
            dst[c] = saturate_u8(f64::from(src[c]) * m + f64::from(dst[c]) * (1.0 - m));
        }
    }
    Ok(out)
}

/// Seamless clone, falling back to alpha blending if it fails
///
/// # Errors
///
/// Returns an error only if the fallback fails too (mismatched inputs)
pub fn clone_or_blend(source: &Mat, target: &Mat, mask: &Mat, center: Point, mode: CloneMode) -> Result<Mat> {
    match seamless_clone(source, target, mask, center, mode) {
        Ok(blended) => Ok(blended),
        Err(e) => {
            warn!("Seamless cloning failed, using alpha blending: {}", e);
            alpha_blend(source, target, mask)
        }
    }
}
