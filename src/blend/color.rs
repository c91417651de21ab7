//! Color correction of the aligned source face toward the target frame.

use crate::{capabilities::Capabilities, utils::safe_cast::saturate_u8, Error, Result};
use log::warn;
use opencv::{
    core::{self, Mat, Vec3b},
    imgproc,
    prelude::*,
};
use serde::{Deserialize, Serialize};

/// Per-channel BGR gain
pub type ChannelGains = [f64; 3];

/// Color matching strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorMethod {
    /// Scale each BGR channel by the ratio of masked means
    #[default]
    MeanGain,
    /// Match Lab channel histograms, interpolated by strength
    Histogram,
}

fn check_same_shape(a: &Mat, b: &Mat) -> Result<()> {
    if a.size()? != b.size()? || a.typ() != b.typ() || a.typ() != core::CV_8UC3 {
        return Err(Error::BlendError(format!(
            "Color matching needs two 8-bit BGR images of equal size, got {:?} and {:?}",
            a.size()?,
            b.size()?
        )));
    }
    Ok(())
}

/// Mean-ratio gains `dst_mean / src_mean` inside `mask`, 1.0 where the source mean is zero
///
/// # Errors
///
/// Returns an error if the mean cannot be computed
pub fn mean_gains(source: &Mat, target: &Mat, mask: &Mat) -> Result<ChannelGains> {
    let src_mean = core::mean(source, mask)?;
    let dst_mean = core::mean(target, mask)?;
    let mut gains = [1.0; 3];
    for (c, gain) in gains.iter_mut().enumerate() {
        if src_mean[c] > 0.0 {
            *gain = dst_mean[c] / src_mean[c];
        }
    }
    Ok(gains)
}

/// Multiply every pixel of `image` by `gains`, clamping to 0..=255
///
/// # Errors
///
/// Returns an error if `image` is not 8-bit BGR
pub fn apply_gains(image: &Mat, gains: ChannelGains) -> Result<Mat> {
    if image.typ() != core::CV_8UC3 {
        return Err(Error::BlendError("Gain correction needs an 8-bit BGR image".to_string()));
    }
    let mut out = image.try_clone()?;
    for px in out.data_typed_mut::<Vec3b>()? {
        for (c, gain) in gains.iter().enumerate() {
            px[c] = saturate_u8(f64::from(px[c]) * gain);
        }
    }
    Ok(out)
}

fn masked_cdf(lab: &Mat, mask: &Mat, channel: usize) -> Result<[f64; 256]> {
    let mut hist = [0f64; 256];
    for (px, m) in lab.data_typed::<Vec3b>()?.iter().zip(mask.data_typed::<u8>()?) {
        if *m > 0 {
            hist[usize::from(px[channel])] += 1.0;
        }
    }
    let total: f64 = hist.iter().sum();
    let mut cdf = [0f64; 256];
    let mut running = 0.0;
    for (bin, count) in hist.iter().enumerate() {
        running += count;
        cdf[bin] = if total > 0.0 { running / total } else { 0.0 };
    }
    Ok(cdf)
}

/// Lookup table sending each source level to the first target level with a CDF at least as high
fn matching_lut(src_cdf: &[f64; 256], dst_cdf: &[f64; 256]) -> [u8; 256] {
    let mut lut = [0u8; 256];
    let mut level = 0usize;
    for (value, &p) in src_cdf.iter().enumerate() {
        while level < 255 && dst_cdf[level] < p {
            level += 1;
        }
        lut[value] = u8::try_from(level).unwrap_or(u8::MAX);
    }
    lut
}

/// Histogram-match `source` to `target` in Lab space inside `mask`
///
/// `strength` 0 returns the source unchanged, 1 the fully matched image.
///
/// # Errors
///
/// Returns an error if the images differ in shape or color conversion fails
pub fn histogram_match(source: &Mat, target: &Mat, mask: &Mat, strength: f64) -> Result<Mat> {
    check_same_shape(source, target)?;
    let strength = strength.clamp(0.0, 1.0);
    let mask = mask.try_clone()?;

    let mut src_lab = Mat::default();
    let mut dst_lab = Mat::default();
    imgproc::cvt_color(source, &mut src_lab, imgproc::COLOR_BGR2Lab, 0)?;
    imgproc::cvt_color(target, &mut dst_lab, imgproc::COLOR_BGR2Lab, 0)?;

    let mut luts = [[0u8; 256]; 3];
    for (channel, lut) in luts.iter_mut().enumerate() {
        *lut = matching_lut(&masked_cdf(&src_lab, &mask, channel)?, &masked_cdf(&dst_lab, &mask, channel)?);
    }
    for px in src_lab.data_typed_mut::<Vec3b>()? {
        for (channel, lut) in luts.iter().enumerate() {
            px[channel] = lut[usize::from(px[channel])];
        }
    }

    let mut matched = Mat::default();
    imgproc::cvt_color(&src_lab, &mut matched, imgproc::COLOR_Lab2BGR, 0)?;

    let mut blended = Mat::default();
    core::add_weighted(source, 1.0 - strength, &matched, strength, 0.0, &mut blended, -1)?;
    Ok(blended)
}

/// Exponential smoothing of gains across frames of one identity
#[derive(Debug, Clone)]
pub struct GainSmoother {
    alpha: f64,
    state: Option<ChannelGains>,
}

impl GainSmoother {
    /// `alpha` in (0, 1]; 1 disables smoothing
    #[must_use]
    pub fn new(alpha: f64) -> Self {
        Self {
            alpha: alpha.clamp(f64::EPSILON, 1.0),
            state: None,
        }
    }

    /// Feed this frame's gains, get the smoothed gains back
    pub fn update(&mut self, gains: ChannelGains) -> ChannelGains {
        let next = match self.state {
            Some(prev) => {
                let mut out = [0.0; 3];
                for c in 0..3 {
                    out[c] = self.alpha * gains[c] + (1.0 - self.alpha) * prev[c];
                }
                out
            }
            None => gains,
        };
        self.state = Some(next);
        next
    }

    /// Forget history
    pub fn reset(&mut self) {
        self.state = None;
    }
}

/// Color correction stage
#[derive(Debug, Clone)]
pub struct ColorMatcher {
    method: ColorMethod,
    strength: f64,
    // strength applied to mean gains; 1.0 unless histogram matching was downgraded
    gain_strength: f64,
}

impl ColorMatcher {
    /// Create a matcher, downgrading histogram matching to mean gain when Lab conversion is unavailable
    #[must_use]
    ///
    /// The downgraded matcher still honours `strength`, scaling each gain
    /// toward 1.
    pub fn new(method: ColorMethod, strength: f64, capabilities: &Capabilities) -> Self {
        let strength = strength.clamp(0.0, 1.0);
        if method == ColorMethod::Histogram && !capabilities.lab_color {
            warn!("Lab color conversion unavailable, using mean-gain color correction");
            return Self {
                method: ColorMethod::MeanGain,
                strength,
                gain_strength: strength,
            };
        }
        Self {
            method,
            strength,
            gain_strength: 1.0,
        }
    }

    /// Effective method after capability resolution
    #[must_use]
    pub fn method(&self) -> ColorMethod {
        self.method
    }

    /// Correct `source` toward `target`, measuring inside `mask`
    ///
    /// With a [`GainSmoother`] the mean-gain factors are smoothed over time
    /// before being applied.
    ///
    /// # Errors
    ///
    /// Returns an error if the images are not equally sized 8-bit BGR
    pub fn correct(&self, source: &Mat, target: &Mat, mask: &Mat, smoother: Option<&mut GainSmoother>) -> Result<Mat> {
        check_same_shape(source, target)?;
        match self.method {
            ColorMethod::MeanGain => {
                let gains = mean_gains(source, target, mask)?;
                let gains = smoother.map_or(gains, |s| s.update(gains));
                apply_gains(source, gains.map(|g| 1.0 + (g - 1.0) * self.gain_strength))
            }
            ColorMethod::Histogram => histogram_match(source, target, mask, self.strength),
        }
    }
}
