//! Acceleration hook for the resampling and blur steps.
//!
//! An [`Acceleration`] context is handed to the warp and blend components at
//! construction. Without an accelerator every call runs on the CPU. With one,
//! each call is tried on the accelerator first; any failure is logged and the
//! CPU path runs instead, so callers never see accelerator errors.

use crate::Result;
use log::warn;
use opencv::{
    core::{Mat, Scalar, Size, BORDER_DEFAULT},
    imgproc,
};
use std::sync::Arc;

/// Alternate implementation of the heavy per-pixel primitives
pub trait Accelerator: Send + Sync {
    /// Affine resample of `src` into an image of `size`
    fn warp_affine(&self, src: &Mat, transform: &Mat, size: Size, border_mode: i32) -> Result<Mat>;

    /// Gaussian blur with a square odd kernel
    fn gaussian_blur(&self, src: &Mat, kernel: i32) -> Result<Mat>;

    /// Backend name for logs
    fn name(&self) -> &str;
}

/// CPU implementations of the accelerated primitives
pub mod cpu {
    use super::*;

    /// Affine resample with bilinear interpolation
    ///
    /// # Errors
    ///
    /// Returns an error if `OpenCV` rejects the transform or sizes
    pub fn warp_affine(src: &Mat, transform: &Mat, size: Size, border_mode: i32) -> Result<Mat> {
        let mut dst = Mat::default();
        imgproc::warp_affine(
            src,
            &mut dst,
            transform,
            size,
            imgproc::INTER_LINEAR,
            border_mode,
            Scalar::default(),
        )?;
        Ok(dst)
    }

    /// Gaussian blur with sigma derived from the kernel size
    ///
    /// # Errors
    ///
    /// Returns an error if `OpenCV` rejects the kernel
    pub fn gaussian_blur(src: &Mat, kernel: i32) -> Result<Mat> {
        let mut dst = Mat::default();
        imgproc::gaussian_blur(src, &mut dst, Size::new(kernel, kernel), 0.0, 0.0, BORDER_DEFAULT)?;
        Ok(dst)
    }
}

/// Acceleration context: optional accelerator paired with the CPU fallback
#[derive(Clone, Default)]
pub struct Acceleration {
    accelerator: Option<Arc<dyn Accelerator>>,
}

impl std::fmt::Debug for Acceleration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Acceleration").field("backend", &self.backend_name()).finish()
    }
}

impl Acceleration {
    /// CPU only
    #[must_use]
    pub fn cpu() -> Self {
        Self::default()
    }

    /// Try `accelerator` first, falling back to the CPU on any failure
    #[must_use]
    pub fn with_accelerator(accelerator: Arc<dyn Accelerator>) -> Self {
        Self {
            accelerator: Some(accelerator),
        }
    }

    /// Name of the preferred backend
    #[must_use]
    pub fn backend_name(&self) -> &str {
        self.accelerator.as_ref().map_or("cpu", |a| a.name())
    }

    /// Affine resample, accelerated when possible
    ///
    /// # Errors
    ///
    /// Returns an error only if the CPU path fails
    pub fn warp_affine(&self, src: &Mat, transform: &Mat, size: Size, border_mode: i32) -> Result<Mat> {
        if let Some(accelerator) = &self.accelerator {
            match accelerator.warp_affine(src, transform, size, border_mode) {
                Ok(out) => return Ok(out),
                Err(e) => warn!("{} warp failed, using CPU: {}", accelerator.name(), e),
            }
        }
        cpu::warp_affine(src, transform, size, border_mode)
    }

    /// Gaussian blur, accelerated when possible
    ///
    /// # Errors
    ///
    /// Returns an error only if the CPU path fails
    pub fn gaussian_blur(&self, src: &Mat, kernel: i32) -> Result<Mat> {
        if let Some(accelerator) = &self.accelerator {
            match accelerator.gaussian_blur(src, kernel) {
                Ok(out) => return Ok(out),
                Err(e) => warn!("{} blur failed, using CPU: {}", accelerator.name(), e),
            }
        }
        cpu::gaussian_blur(src, kernel)
    }
}
