//! Rectangle and buffer helpers shared by the warp and blend stages.

pub mod safe_cast;

use crate::{Error, Result};
use opencv::{
    core::{Mat, Rect, CV_8UC1, CV_8UC3},
    imgproc,
    prelude::*,
};

/// Intersection of two rectangles, `None` if they do not overlap
#[must_use]
pub fn intersect_rects(a: Rect, b: Rect) -> Option<Rect> {
    let left = a.x.max(b.x);
    let top = a.y.max(b.y);
    let right = (a.x + a.width).min(b.x + b.width);
    let bottom = (a.y + a.height).min(b.y + b.height);

    (right > left && bottom > top).then(|| Rect::new(left, top, right - left, bottom - top))
}

/// Full-image rectangle of a `Mat`
#[must_use]
pub fn image_rect(image: &Mat) -> Rect {
    Rect::new(0, 0, image.cols(), image.rows())
}

/// Expand `rect` by `padding` on every side and clip it to the image
///
/// Returns `None` when nothing of the rectangle lies inside the image.
#[must_use]
pub fn pad_rect(rect: Rect, padding: i32, image_width: i32, image_height: i32) -> Option<Rect> {
    let padded = Rect::new(
        rect.x - padding,
        rect.y - padding,
        rect.width + 2 * padding,
        rect.height + 2 * padding,
    );
    intersect_rects(padded, Rect::new(0, 0, image_width, image_height))
}

/// Owned copy of a region of an image
///
/// # Errors
///
/// Returns an error if the region lies outside the image
pub fn crop(image: &Mat, rect: Rect) -> Result<Mat> {
    let clipped = intersect_rects(rect, image_rect(image))
        .ok_or_else(|| Error::InvalidInput(format!("Crop {rect:?} lies outside the image")))?;
    Ok(Mat::roi(image, clipped)?.try_clone()?)
}

/// Make sure a frame is 3-channel 8-bit BGR, upconverting grayscale
///
/// # Errors
///
/// Returns an error for empty frames or unsupported pixel types
pub fn ensure_bgr(frame: &Mat) -> Result<Mat> {
    if frame.empty() {
        return Err(Error::InvalidInput("Empty frame".to_string()));
    }
    match frame.typ() {
        CV_8UC3 => Ok(frame.try_clone()?),
        CV_8UC1 => {
            let mut bgr = Mat::default();
            imgproc::cvt_color(frame, &mut bgr, imgproc::COLOR_GRAY2BGR, 0)?;
            Ok(bgr)
        }
        other => Err(Error::InvalidInput(format!(
            "Unsupported frame type {other}; expected 8-bit BGR or grayscale"
        ))),
    }
}
