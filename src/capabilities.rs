//! Optional capabilities, probed once per process.

use crate::{Error, Result};
use log::{debug, info};
use opencv::{
    core::{Mat, Scalar, CV_8UC3},
    imgproc,
    prelude::*,
};
use std::sync::OnceLock;

/// Which optional strategies this build and runtime can serve
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// Thin-plate smooth warp (compiled in with the `smooth-warp` feature)
    pub smooth_warp: bool,
    /// 8-bit BGR to Lab conversion for histogram color matching
    pub lab_color: bool,
}

static DETECTED: OnceLock<Capabilities> = OnceLock::new();

impl Capabilities {
    /// Probe capabilities, caching the result for the rest of the process
    pub fn detect() -> Self {
        *DETECTED.get_or_init(|| {
            let caps = Self {
                smooth_warp: cfg!(feature = "smooth-warp"),
                lab_color: probe_lab_conversion(),
            };
            info!(
                "Capabilities: smooth warp {}, Lab color matching {}",
                caps.smooth_warp, caps.lab_color
            );
            caps
        })
    }

    /// Baseline strategies only
    #[must_use]
    pub const fn baseline() -> Self {
        Self {
            smooth_warp: false,
            lab_color: false,
        }
    }

    /// Fail unless the smooth warp is available
    ///
    /// # Errors
    ///
    /// Returns [`Error::CapabilityUnavailable`] when the crate was built without `smooth-warp`
    pub fn require_smooth_warp(&self) -> Result<()> {
        if self.smooth_warp {
            Ok(())
        } else {
            Err(Error::CapabilityUnavailable(
                "smooth warp requires the `smooth-warp` feature".to_string(),
            ))
        }
    }
}

fn probe_lab_conversion() -> bool {
    let probe = || -> opencv::Result<bool> {
        let pixel = Mat::new_rows_cols_with_default(1, 1, CV_8UC3, Scalar::new(10.0, 120.0, 200.0, 0.0))?;
        let mut lab = Mat::default();
        imgproc::cvt_color(&pixel, &mut lab, imgproc::COLOR_BGR2Lab, 0)?;
        Ok(lab.rows() == 1 && lab.cols() == 1)
    };
    match probe() {
        Ok(ok) => ok,
        Err(e) => {
            debug!("Lab conversion probe failed: {}", e);
            false
        }
    }
}
