use super::LandmarkFilter;
use crate::{Error, Result};

/// Exponential moving average over a vector
pub struct ExponentialFilter {
    alpha: f64,
    state: Option<Vec<f64>>,
}

impl ExponentialFilter {
    /// Create a new EMA filter
    ///
    /// # Panics
    ///
    /// Panics if alpha is not in the range (0, 1]
    #[must_use]
    pub fn new(alpha: f64) -> Self {
        assert!(alpha > 0.0 && alpha <= 1.0, "Alpha must be in (0, 1]");
        Self { alpha, state: None }
    }

    /// Check an alpha value without constructing the filter
    ///
    /// # Errors
    ///
    /// Returns [`Error::FilterError`] if alpha is outside (0, 1]
    pub fn validate(alpha: f64) -> Result<()> {
        if alpha > 0.0 && alpha <= 1.0 {
            Ok(())
        } else {
            Err(Error::FilterError(format!("Alpha must be in (0, 1], got {alpha}")))
        }
    }
}

impl LandmarkFilter for ExponentialFilter {
    fn update(&mut self, values: &[f64], _timestamp: Option<f64>) -> Vec<f64> {
        let next = match &self.state {
            Some(prev) if prev.len() == values.len() => values
                .iter()
                .zip(prev)
                .map(|(x, s)| self.alpha * x + (1.0 - self.alpha) * s)
                .collect(),
            _ => values.to_vec(),
        };
        self.state = Some(next.clone());
        next
    }

    fn reset(&mut self) {
        self.state = None;
    }

    fn name(&self) -> &str {
        "ExponentialFilter"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponential_filter() {
        let mut filter = ExponentialFilter::new(0.5);

        // First value passes through
        assert_eq!(filter.update(&[10.0, 20.0], None), vec![10.0, 20.0]);

        // Second value is smoothed
        assert_eq!(filter.update(&[20.0, 30.0], None), vec![15.0, 25.0]);
    }

    #[test]
    fn test_alpha_one_tracks_input() {
        let mut filter = ExponentialFilter::new(1.0);
        filter.update(&[1.0], None);
        assert_eq!(filter.update(&[7.0], None), vec![7.0]);
    }

    #[test]
    fn test_alpha_bounds() {
        let mut fast = ExponentialFilter::new(0.9);
        fast.update(&[10.0], None);
        assert!((fast.update(&[20.0], None)[0] - 19.0).abs() < 1e-9);

        let mut slow = ExponentialFilter::new(0.1);
        slow.update(&[10.0], None);
        assert!((slow.update(&[20.0], None)[0] - 11.0).abs() < 1e-9);
    }

    #[test]
    fn test_length_change_reseeds() {
        let mut filter = ExponentialFilter::new(0.5);
        filter.update(&[1.0, 2.0], None);
        assert_eq!(filter.update(&[5.0, 6.0, 7.0], None), vec![5.0, 6.0, 7.0]);
    }

    #[test]
    #[should_panic(expected = "Alpha must be in (0, 1]")]
    fn test_zero_alpha_panics() {
        let _ = ExponentialFilter::new(0.0);
    }
}
