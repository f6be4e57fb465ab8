//! Bollinger Bands: moving average +/- standard deviation multiplier.
//!
//! Three bands (separate Indicator instances):
//! - Middle: SMA(close, period)
//! - Upper: middle + mult * stddev(close, period)
//! - Lower: middle - mult * stddev(close, period)
//!
//! Uses population stddev (divide by N).
//! Lookback: period - 1.

use super::Indicator;

/// Which band of the Bollinger Bands to compute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BollingerBand {
    Upper,
    Middle,
    Lower,
}

#[derive(Debug, Clone)]
pub struct Bollinger {
    period: usize,
    multiplier: f64,
    band: BollingerBand,
    name: String,
}

impl Bollinger {
    pub fn new(band: BollingerBand, period: usize, multiplier: f64) -> Self {
        assert!(period >= 1, "Bollinger period must be >= 1");
        let name = match band {
            BollingerBand::Upper => "bollinger_upper",
            BollingerBand::Middle => "bollinger_middle",
            BollingerBand::Lower => "bollinger_lower",
        };
        Self {
            period,
            multiplier,
            band,
            name: name.to_string(),
        }
    }

    pub fn upper(period: usize, multiplier: f64) -> Self {
        Self::new(BollingerBand::Upper, period, multiplier)
    }

    pub fn middle(period: usize, multiplier: f64) -> Self {
        Self::new(BollingerBand::Middle, period, multiplier)
    }

    pub fn lower(period: usize, multiplier: f64) -> Self {
        Self::new(BollingerBand::Lower, period, multiplier)
    }
}

impl Indicator for Bollinger {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period.saturating_sub(1)
    }

    fn compute(&self, closes: &[Option<f64>]) -> Vec<Option<f64>> {
        let mut result = vec![None; closes.len()];
        if closes.len() < self.period {
            return result;
        }

        for (start, window) in closes.windows(self.period).enumerate() {
            let Some(values) = window.iter().copied().collect::<Option<Vec<f64>>>() else {
                continue;
            };
            let n = self.period as f64;
            let mean = values.iter().sum::<f64>() / n;
            let band = match self.band {
                BollingerBand::Middle => mean,
                BollingerBand::Upper | BollingerBand::Lower => {
                    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
                    let offset = self.multiplier * variance.sqrt();
                    if self.band == BollingerBand::Upper {
                        mean + offset
                    } else {
                        mean - offset
                    }
                }
            };
            result[start + self.period - 1] = Some(band);
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, defined, DEFAULT_EPSILON};

    #[test]
    fn known_bands() {
        // Window [2, 4, 4, 4, 5, 5, 7, 9]: mean 5, population stddev 2
        let closes = defined(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        let upper = Bollinger::upper(8, 2.0).compute(&closes);
        let middle = Bollinger::middle(8, 2.0).compute(&closes);
        let lower = Bollinger::lower(8, 2.0).compute(&closes);
        assert!(upper[6].is_none());
        assert_approx(upper[7].unwrap(), 9.0, DEFAULT_EPSILON);
        assert_approx(middle[7].unwrap(), 5.0, DEFAULT_EPSILON);
        assert_approx(lower[7].unwrap(), 1.0, DEFAULT_EPSILON);
    }

    #[test]
    fn constant_series_collapses_bands() {
        let closes = defined(&[10.0; 5]);
        let upper = Bollinger::upper(3, 2.0).compute(&closes);
        let lower = Bollinger::lower(3, 2.0).compute(&closes);
        assert_eq!(upper[4], Some(10.0));
        assert_eq!(lower[4], Some(10.0));
    }

    #[test]
    fn missing_close_in_window() {
        let mut closes = defined(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        closes[1] = None;
        let middle = Bollinger::middle(3, 2.0).compute(&closes);
        assert!(middle[2].is_none());
        assert!(middle[3].is_none());
        assert_approx(middle[4].unwrap(), 4.0, DEFAULT_EPSILON);
    }

    #[test]
    fn band_names() {
        assert_eq!(Bollinger::upper(20, 2.0).name(), "bollinger_upper");
        assert_eq!(Bollinger::lower(20, 2.0).lookback(), 19);
    }
}
