//! Simple Moving Average (SMA).
//!
//! Mean of the last `period` closes. Undefined during warm-up and whenever a
//! close inside the window is missing.
//! Lookback: period - 1.

use super::Indicator;

#[derive(Debug, Clone)]
pub struct Sma {
    period: usize,
    name: String,
}

impl Sma {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "SMA period must be >= 1");
        Self {
            period,
            name: format!("sma_{period}"),
        }
    }
}

impl Indicator for Sma {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period.saturating_sub(1)
    }

    fn compute(&self, closes: &[Option<f64>]) -> Vec<Option<f64>> {
        rolling_mean(closes, self.period)
    }
}

/// Rolling mean that sums each window directly, so a gap leaves no residue
/// in later windows.
pub(crate) fn rolling_mean(values: &[Option<f64>], period: usize) -> Vec<Option<f64>> {
    let mut result = vec![None; values.len()];
    if period == 0 || values.len() < period {
        return result;
    }

    for (start, window) in values.windows(period).enumerate() {
        let sum: Option<f64> = window.iter().copied().sum();
        result[start + period - 1] = sum.map(|s| s / period as f64);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, defined, DEFAULT_EPSILON};

    #[test]
    fn sma_5_basic() {
        let result = Sma::new(5).compute(&defined(&[10.0, 11.0, 12.0, 13.0, 14.0, 15.0, 16.0]));

        assert_eq!(result.len(), 7);
        for (i, v) in result.iter().enumerate().take(4) {
            assert!(v.is_none(), "expected None at index {i}");
        }
        assert_approx(result[4].unwrap(), 12.0, DEFAULT_EPSILON);
        assert_approx(result[5].unwrap(), 13.0, DEFAULT_EPSILON);
        assert_approx(result[6].unwrap(), 14.0, DEFAULT_EPSILON);
    }

    #[test]
    fn sma_20_on_one_to_thirty() {
        let closes: Vec<f64> = (1..=30).map(f64::from).collect();
        let result = Sma::new(20).compute(&defined(&closes));
        assert!(result[18].is_none());
        assert_approx(result[19].unwrap(), 10.5, DEFAULT_EPSILON);
        assert_approx(result[29].unwrap(), 20.5, DEFAULT_EPSILON);
    }

    #[test]
    fn sma_1_is_close() {
        let result = Sma::new(1).compute(&defined(&[100.0, 200.0, 300.0]));
        assert_eq!(result, vec![Some(100.0), Some(200.0), Some(300.0)]);
    }

    #[test]
    fn sma_missing_close_in_window() {
        let mut closes = defined(&[10.0, 11.0, 12.0, 13.0, 14.0, 15.0]);
        closes[2] = None;
        let result = Sma::new(3).compute(&closes);
        assert!(result[2].is_none());
        assert!(result[3].is_none());
        assert!(result[4].is_none());
        assert_approx(result[5].unwrap(), 14.0, DEFAULT_EPSILON);
    }

    #[test]
    fn sma_lookback() {
        assert_eq!(Sma::new(20).lookback(), 19);
        assert_eq!(Sma::new(1).lookback(), 0);
        assert_eq!(Sma::new(200).name(), "sma_200");
    }

    #[test]
    fn sma_too_few_bars() {
        let result = Sma::new(5).compute(&defined(&[10.0, 11.0]));
        assert!(result.iter().all(Option::is_none));
    }
}
