//! Multi-band (Laplacian pyramid) blending.

use crate::{constants::MAX_PYRAMID_LEVELS, Error, Result};
use log::debug;
use opencv::{
    core::{self, Mat, Size, BORDER_DEFAULT, CV_32F, CV_8U, CV_8UC1, CV_8UC3},
    imgproc,
    prelude::*,
};

fn gaussian_pyramid(base: Mat, levels: usize) -> Result<Vec<Mat>> {
    let mut pyramid = Vec::with_capacity(levels);
    pyramid.push(base);
    for i in 1..levels {
        let mut down = Mat::default();
        imgproc::pyr_down(&pyramid[i - 1], &mut down, Size::default(), BORDER_DEFAULT)?;
        pyramid.push(down);
    }
    Ok(pyramid)
}

fn expand(level: &Mat, size: Size) -> Result<Mat> {
    let mut up = Mat::default();
    imgproc::pyr_up(level, &mut up, size, BORDER_DEFAULT)?;
    Ok(up)
}

fn weighted_sum(a: &Mat, wa: f64, b: &Mat, wb: f64) -> Result<Mat> {
    let mut out = Mat::default();
    core::add_weighted(a, wa, b, wb, 0.0, &mut out, -1)?;
    Ok(out)
}

fn laplacian_pyramid(gaussian: &[Mat]) -> Result<Vec<Mat>> {
    let mut laplacian = Vec::with_capacity(gaussian.len());
    for pair in gaussian.windows(2) {
        let up = expand(&pair[1], pair[0].size()?)?;
        laplacian.push(weighted_sum(&pair[0], 1.0, &up, -1.0)?);
    }
    if let Some(top) = gaussian.last() {
        laplacian.push(top.try_clone()?);
    }
    Ok(laplacian)
}

/// Number of levels that still leaves the smallest level at least one pixel wide
#[must_use]
pub fn usable_levels(requested: usize, size: Size) -> usize {
    let mut levels = 1;
    let mut side = size.width.min(size.height);
    while levels < requested.min(MAX_PYRAMID_LEVELS) && side >= 2 {
        side = (side + 1) / 2;
        levels += 1;
    }
    levels
}

fn to_float(image: &Mat, scale: f64) -> Result<Mat> {
    let mut out = Mat::default();
    image.convert_to(&mut out, CV_32F, scale, 0.0)?;
    Ok(out)
}

/// Blend `source` over `target` band by band with weights from `mask`
///
/// Both images must be 8-bit BGR of the same size and `mask` 8-bit single
/// channel of that size. The result is clipped back to 8 bits.
///
/// # Errors
///
/// Returns [`Error::BlendError`] for mismatched inputs or an `OpenCV` error
pub fn laplacian_blend(source: &Mat, target: &Mat, mask: &Mat, levels: usize) -> Result<Mat> {
    let size = target.size()?;
    if source.size()? != size || mask.size()? != size {
        return Err(Error::BlendError("Pyramid blend inputs differ in size".to_string()));
    }
    if source.typ() != CV_8UC3 || target.typ() != CV_8UC3 || mask.typ() != CV_8UC1 {
        return Err(Error::BlendError("Pyramid blend needs 8-bit BGR images and an 8-bit mask".to_string()));
    }

    let levels = usable_levels(levels.max(1), size);
    debug!("Laplacian blend over {} levels", levels);

    let mut mask3 = Mat::default();
    imgproc::cvt_color(&to_float(mask, 1.0 / 255.0)?, &mut mask3, imgproc::COLOR_GRAY2BGR, 0)?;

    let src_lap = laplacian_pyramid(&gaussian_pyramid(to_float(source, 1.0)?, levels)?)?;
    let dst_lap = laplacian_pyramid(&gaussian_pyramid(to_float(target, 1.0)?, levels)?)?;
    let weights = gaussian_pyramid(mask3, levels)?;

    // blended = dst + w * (src - dst), level by level
    let mut blended = Vec::with_capacity(levels);
    for ((s, d), w) in src_lap.iter().zip(&dst_lap).zip(&weights) {
        let diff = weighted_sum(s, 1.0, d, -1.0)?;
        let mut scaled = Mat::default();
        core::multiply(&diff, w, &mut scaled, 1.0, -1)?;
        blended.push(weighted_sum(d, 1.0, &scaled, 1.0)?);
    }

    let mut levels_iter = blended.into_iter().rev();
    let mut result = levels_iter
        .next()
        .ok_or_else(|| Error::BlendError("Empty pyramid".to_string()))?;
    for level in levels_iter {
        let up = expand(&result, level.size()?)?;
        result = weighted_sum(&up, 1.0, &level, 1.0)?;
    }

    let mut out = Mat::default();
    result.convert_to(&mut out, CV_8U, 1.0, 0.0)?;
    Ok(out)
}
