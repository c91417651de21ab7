use super::LandmarkFilter;
use crate::{Error, Result};

/// Independent constant-model Kalman filter per dimension
pub struct KalmanFilter {
    process_var: f64,
    measure_var: f64,
    estimate: Option<Vec<f64>>,
    error: Vec<f64>,
}

impl KalmanFilter {
    /// Create a new per-dimension Kalman filter
    ///
    /// # Panics
    ///
    /// Panics if either variance is not positive
    #[must_use]
    pub fn new(process_var: f64, measure_var: f64) -> Self {
        assert!(
            Self::validate(process_var, measure_var).is_ok(),
            "Variances must be positive"
        );
        Self {
            process_var,
            measure_var,
            estimate: None,
            error: Vec::new(),
        }
    }

    /// Check variance parameters
    ///
    /// # Errors
    ///
    /// Returns [`Error::FilterError`] if either variance is not positive
    pub fn validate(process_var: f64, measure_var: f64) -> Result<()> {
        if process_var > 0.0 && measure_var > 0.0 {
            Ok(())
        } else {
            Err(Error::FilterError(format!(
                "Variances must be positive, got process {process_var} and measurement {measure_var}"
            )))
        }
    }
}

impl LandmarkFilter for KalmanFilter {
    fn update(&mut self, values: &[f64], _timestamp: Option<f64>) -> Vec<f64> {
        let estimate = match &mut self.estimate {
            Some(estimate) if estimate.len() == values.len() => estimate,
            _ => {
                self.estimate = Some(values.to_vec());
                self.error = vec![1.0; values.len()];
                return values.to_vec();
            }
        };

        for ((x, p), z) in estimate.iter_mut().zip(self.error.iter_mut()).zip(values) {
            // Predict (constant model), then correct
            let priori_error = *p + self.process_var;
            let gain = priori_error / (priori_error + self.measure_var);
            *x += gain * (z - *x);
            *p = (1.0 - gain) * priori_error;
        }

        estimate.clone()
    }

    fn reset(&mut self) {
        self.estimate = None;
        self.error.clear();
    }

    fn name(&self) -> &str {
        "KalmanFilter"
    }
}
