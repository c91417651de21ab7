use super::LandmarkFilter;
use crate::{
    constants::{
        DEFAULT_ONE_EURO_BETA, DEFAULT_ONE_EURO_D_CUTOFF, DEFAULT_ONE_EURO_FREQ, DEFAULT_ONE_EURO_MIN_CUTOFF,
        MIN_TIME_DELTA,
    },
    Error, Result,
};
use std::f64::consts::PI;

/// Parameters of the adaptive low-pass filter
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OneEuroSettings {
    /// Expected sampling frequency in Hz, used when no timestamps are given
    pub freq: f64,
    /// Cutoff frequency at zero speed
    pub min_cutoff: f64,
    /// How strongly speed raises the cutoff
    pub beta: f64,
    /// Cutoff used when smoothing the derivative
    pub d_cutoff: f64,
}

impl Default for OneEuroSettings {
    fn default() -> Self {
        Self {
            freq: DEFAULT_ONE_EURO_FREQ,
            min_cutoff: DEFAULT_ONE_EURO_MIN_CUTOFF,
            beta: DEFAULT_ONE_EURO_BETA,
            d_cutoff: DEFAULT_ONE_EURO_D_CUTOFF,
        }
    }
}

impl OneEuroSettings {
    /// Check parameter ranges
    ///
    /// # Errors
    ///
    /// Returns [`Error::FilterError`] if a frequency is not positive or beta is negative
    pub fn validate(&self) -> Result<()> {
        if !(self.freq > 0.0) {
            return Err(Error::FilterError(format!("Frequency must be positive, got {}", self.freq)));
        }
        if !(self.min_cutoff > 0.0) || !(self.d_cutoff > 0.0) {
            return Err(Error::FilterError("Cutoff frequencies must be positive".to_string()));
        }
        if !(self.beta >= 0.0) {
            return Err(Error::FilterError(format!("Beta must be non-negative, got {}", self.beta)));
        }
        Ok(())
    }
}

/// Low-pass filter whose cutoff rises with signal speed
///
/// One scalar speed (the mean absolute smoothed derivative over all
/// dimensions) drives the cutoff for the whole vector.
pub struct OneEuroFilter {
    settings: OneEuroSettings,
    last_time: Option<f64>,
    x_prev: Option<Vec<f64>>,
    dx_prev: Vec<f64>,
}

impl OneEuroFilter {
    /// Create a new adaptive filter
    ///
    /// # Panics
    ///
    /// Panics if the settings do not pass [`OneEuroSettings::validate`]
    #[must_use]
    pub fn new(settings: OneEuroSettings) -> Self {
        assert!(settings.validate().is_ok(), "Invalid one-euro filter settings");
        Self {
            settings,
            last_time: None,
            x_prev: None,
            dx_prev: Vec::new(),
        }
    }

    fn smoothing_factor(cutoff: f64, dt: f64) -> f64 {
        let tau = 1.0 / (2.0 * PI * cutoff);
        1.0 / (1.0 + tau / dt)
    }

    fn time_delta(&self, timestamp: Option<f64>) -> f64 {
        let dt = match (timestamp, self.last_time) {
            (Some(now), Some(last)) => now - last,
            _ => 1.0 / self.settings.freq,
        };
        dt.max(MIN_TIME_DELTA)
    }
}

impl LandmarkFilter for OneEuroFilter {
    #[allow(clippy::cast_precision_loss)]
    fn update(&mut self, values: &[f64], timestamp: Option<f64>) -> Vec<f64> {
        let dt = self.time_delta(timestamp);
        if timestamp.is_some() {
            self.last_time = timestamp;
        }

        let x_prev = match &self.x_prev {
            Some(prev) if prev.len() == values.len() => prev,
            _ => {
                self.x_prev = Some(values.to_vec());
                self.dx_prev = vec![0.0; values.len()];
                return values.to_vec();
            }
        };

        let a_d = Self::smoothing_factor(self.settings.d_cutoff, dt);
        let dx_hat: Vec<f64> = values
            .iter()
            .zip(x_prev)
            .zip(&self.dx_prev)
            .map(|((x, prev), dprev)| {
                let dx = (x - prev) / dt;
                a_d * dx + (1.0 - a_d) * dprev
            })
            .collect();

        let speed = if dx_hat.is_empty() {
            0.0
        } else {
            dx_hat.iter().map(|d| d.abs()).sum::<f64>() / dx_hat.len() as f64
        };
        let cutoff = self.settings.min_cutoff + self.settings.beta * speed;
        let a = Self::smoothing_factor(cutoff, dt);

        let x_hat: Vec<f64> = values
            .iter()
            .zip(x_prev)
            .map(|(x, prev)| a * x + (1.0 - a) * prev)
            .collect();

        self.x_prev = Some(x_hat.clone());
        self.dx_prev = dx_hat;
        x_hat
    }

    fn reset(&mut self) {
        self.last_time = None;
        self.x_prev = None;
        self.dx_prev.clear();
    }

    fn name(&self) -> &str {
        "OneEuroFilter"
    }
}
