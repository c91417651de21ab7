//! Thin-plate spline warp.
//!
//! Fits a spline mapping destination coordinates to source coordinates, so
//! every output pixel can be sampled from the source in one `remap` pass.

use crate::{Error, Result};
use log::debug;
use nalgebra::DMatrix;
use opencv::{
    core::{Mat, Point2f, Scalar, Size, BORDER_CONSTANT, CV_32FC1},
    imgproc,
    prelude::*,
};

/// Diagonal regularisation added to the kernel matrix
const REGULARIZATION: f64 = 1e-8;

/// Radial basis `r^2 log r^2`
fn kernel(r2: f64) -> f64 {
    if r2 <= 0.0 {
        0.0
    } else {
        r2 * r2.ln()
    }
}

/// Fitted spline from destination space to source space
pub struct ThinPlateSpline {
    controls: Vec<(f64, f64)>,
    // (N + 3) x 2: N kernel weights then affine terms [1, x, y]
    coefficients: DMatrix<f64>,
}

impl ThinPlateSpline {
    /// Fit a spline taking each `dst` point to its `src` counterpart
    ///
    /// # Errors
    ///
    /// Returns [`Error::WarpError`] for fewer than three points, mismatched
    /// counts or a singular system (for example duplicated control points)
    pub fn fit(dst: &[Point2f], src: &[Point2f]) -> Result<Self> {
        if dst.len() != src.len() {
            return Err(Error::WarpError("Control point count mismatch".to_string()));
        }
        let n = dst.len();
        if n < 3 {
            return Err(Error::WarpError(format!("Need at least 3 control points, got {n}")));
        }

        let controls: Vec<(f64, f64)> = dst.iter().map(|p| (f64::from(p.x), f64::from(p.y))).collect();
        let mut system = DMatrix::<f64>::zeros(n + 3, n + 3);
        for (i, &(xi, yi)) in controls.iter().enumerate() {
            for (j, &(xj, yj)) in controls.iter().enumerate() {
                let r2 = (xi - xj).powi(2) + (yi - yj).powi(2);
                system[(i, j)] = kernel(r2);
            }
            system[(i, i)] += REGULARIZATION;
            system[(i, n)] = 1.0;
            system[(i, n + 1)] = xi;
            system[(i, n + 2)] = yi;
            system[(n, i)] = 1.0;
            system[(n + 1, i)] = xi;
            system[(n + 2, i)] = yi;
        }

        let mut rhs = DMatrix::<f64>::zeros(n + 3, 2);
        for (i, p) in src.iter().enumerate() {
            rhs[(i, 0)] = f64::from(p.x);
            rhs[(i, 1)] = f64::from(p.y);
        }

        let coefficients = system
            .lu()
            .solve(&rhs)
            .ok_or_else(|| Error::WarpError("Thin-plate system is singular".to_string()))?;
        if coefficients.iter().any(|c| !c.is_finite()) {
            return Err(Error::WarpError("Thin-plate fit produced non-finite weights".to_string()));
        }

        debug!("Fitted thin-plate spline over {} control points", n);
        Ok(Self { controls, coefficients })
    }

    /// Evaluate the mapping at `(x, y)`
    #[must_use]
    pub fn map(&self, x: f64, y: f64) -> (f64, f64) {
        let n = self.controls.len();
        let c = &self.coefficients;
        let mut u = c[(n, 0)] + c[(n + 1, 0)] * x + c[(n + 2, 0)] * y;
        let mut v = c[(n, 1)] + c[(n + 1, 1)] * x + c[(n + 2, 1)] * y;
        for (i, &(cx, cy)) in self.controls.iter().enumerate() {
            let k = kernel((x - cx).powi(2) + (y - cy).powi(2));
            u += c[(i, 0)] * k;
            v += c[(i, 1)] * k;
        }
        (u, v)
    }
}

/// Warp `source` into an image of `size` so `src_points` land on `dst_points`
///
/// # Errors
///
/// Returns an error if the spline cannot be fitted or resampling fails
#[allow(clippy::cast_possible_truncation)]
pub fn warp_smooth(source: &Mat, src_points: &[Point2f], dst_points: &[Point2f], size: Size) -> Result<Mat> {
    let spline = ThinPlateSpline::fit(dst_points, src_points)?;

    let mut map_x = Mat::new_rows_cols_with_default(size.height, size.width, CV_32FC1, Scalar::all(0.0))?;
    let mut map_y = Mat::new_rows_cols_with_default(size.height, size.width, CV_32FC1, Scalar::all(0.0))?;
    {
        let width = usize::try_from(size.width).map_err(|_| Error::WarpError("Negative width".to_string()))?;
        let xs = map_x.data_typed_mut::<f32>()?;
        let ys = map_y.data_typed_mut::<f32>()?;
        for (i, (mx, my)) in xs.iter_mut().zip(ys.iter_mut()).enumerate() {
            #[allow(clippy::cast_precision_loss)]
            let (x, y) = ((i % width) as f64, (i / width) as f64);
            let (u, v) = spline.map(x, y);
            *mx = u as f32;
            *my = v as f32;
        }
    }

    let mut warped = Mat::default();
    imgproc::remap(
        source,
        &mut warped,
        &map_x,
        &map_y,
        imgproc::INTER_LINEAR,
        BORDER_CONSTANT,
        Scalar::default(),
    )?;
    Ok(warped)
}
