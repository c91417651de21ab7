//! Temporal filters for smoothing landmark streams.
//!
//! Every filter works on a flattened vector (a 68-point landmark set becomes
//! 136 scalars) and keeps state for exactly one track. Call
//! [`LandmarkFilter::reset`] before feeding a different track into the same
//! instance.

/// Exponential moving average
pub mod exponential;

/// Adaptive-cutoff low-pass (one-euro) filter
pub mod one_euro;

/// Per-dimension scalar Kalman filter
pub mod kalman;

use crate::{
    constants::{
        DEFAULT_EMA_ALPHA, DEFAULT_KALMAN_MEASURE_VAR, DEFAULT_KALMAN_PROCESS_VAR, DEFAULT_ONE_EURO_BETA,
        DEFAULT_ONE_EURO_D_CUTOFF, DEFAULT_ONE_EURO_FREQ, DEFAULT_ONE_EURO_MIN_CUTOFF,
    },
    landmarks::LandmarkSet,
    Error, Result,
};

/// Trait for all landmark stream filters
pub trait LandmarkFilter: Send {
    /// Feed one observation and get the smoothed value back
    ///
    /// The first call after construction or [`reset`](Self::reset) seeds the
    /// state and returns the input unchanged. `timestamp` is in seconds.
    fn update(&mut self, values: &[f64], timestamp: Option<f64>) -> Vec<f64>;

    /// Reset filter state
    fn reset(&mut self);

    /// Get filter name
    fn name(&self) -> &str;
}

/// No-op filter that passes through values unchanged
pub struct NoFilter;

impl LandmarkFilter for NoFilter {
    fn update(&mut self, values: &[f64], _timestamp: Option<f64>) -> Vec<f64> {
        values.to_vec()
    }

    fn reset(&mut self) {}

    fn name(&self) -> &str {
        "NoFilter"
    }
}

/// Stateful smoother for one track of landmark sets
pub struct LandmarkSmoother {
    filter: Box<dyn LandmarkFilter>,
}

impl LandmarkSmoother {
    /// Wrap a filter
    #[must_use]
    pub fn new(filter: Box<dyn LandmarkFilter>) -> Self {
        Self { filter }
    }

    /// Smooth one landmark set
    ///
    /// # Errors
    ///
    /// Returns an error if the filter output is not a valid landmark set
    /// (for example after non-finite input)
    pub fn smooth(&mut self, landmarks: &LandmarkSet, timestamp: Option<f64>) -> Result<LandmarkSet> {
        let smoothed = self.filter.update(&landmarks.flatten(), timestamp);
        LandmarkSet::from_flat(&smoothed)
    }

    /// Forget all history
    pub fn reset(&mut self) {
        self.filter.reset();
    }

    /// Name of the wrapped filter
    #[must_use]
    pub fn name(&self) -> &str {
        self.filter.name()
    }
}

fn parse_params(name: &str, raw: &[&str]) -> Result<Vec<f64>> {
    raw.iter()
        .map(|p| {
            p.trim()
                .parse::<f64>()
                .map_err(|_| Error::FilterError(format!("Invalid parameter '{p}' for {name} filter")))
        })
        .collect()
}

fn param_or(params: &[f64], index: usize, default: f64) -> f64 {
    params.get(index).copied().unwrap_or(default)
}

/// Create a filter from a `name[:param[:param...]]` description
///
/// Supported forms:
/// - `none`
/// - `ema[:alpha]` (alias `exponential`)
/// - `one_euro[:freq[:min_cutoff[:beta[:d_cutoff]]]]` (alias `oneeuro`)
/// - `kalman[:process_var[:measure_var]]`
///
/// # Errors
///
/// Returns [`Error::FilterError`] for unknown names, unparsable or out-of-range parameters
pub fn create_filter(description: &str) -> Result<Box<dyn LandmarkFilter>> {
    let mut parts = description.split(':');
    let name = parts.next().unwrap_or_default().trim().to_lowercase();
    let raw: Vec<&str> = parts.collect();
    let params = parse_params(&name, &raw)?;

    match name.as_str() {
        "none" | "nofilter" => Ok(Box::new(NoFilter)),
        "ema" | "exponential" => {
            let alpha = param_or(&params, 0, DEFAULT_EMA_ALPHA);
            exponential::ExponentialFilter::validate(alpha)?;
            Ok(Box::new(exponential::ExponentialFilter::new(alpha)))
        }
        "one_euro" | "oneeuro" => {
            let settings = one_euro::OneEuroSettings {
                freq: param_or(&params, 0, DEFAULT_ONE_EURO_FREQ),
                min_cutoff: param_or(&params, 1, DEFAULT_ONE_EURO_MIN_CUTOFF),
                beta: param_or(&params, 2, DEFAULT_ONE_EURO_BETA),
                d_cutoff: param_or(&params, 3, DEFAULT_ONE_EURO_D_CUTOFF),
            };
            settings.validate()?;
            Ok(Box::new(one_euro::OneEuroFilter::new(settings)))
        }
        "kalman" => {
            let process_var = param_or(&params, 0, DEFAULT_KALMAN_PROCESS_VAR);
            let measure_var = param_or(&params, 1, DEFAULT_KALMAN_MEASURE_VAR);
            kalman::KalmanFilter::validate(process_var, measure_var)?;
            Ok(Box::new(kalman::KalmanFilter::new(process_var, measure_var)))
        }
        _ => Err(Error::FilterError(format!("Unknown filter type: {description}"))),
    }
}
