//! Technical indicators over close prices.
//!
//! Every indicator implements `Indicator`: a pure function from a close series
//! to an output series of the same length. `None` marks warm-up bars and bars
//! whose window contains a missing close; it is never conflated with zero.
//!
//! Multi-line indicators (MACD, Bollinger) are exposed as one instance per
//! line, keeping the single-series trait unchanged.

pub mod bollinger;
pub mod ema;
pub mod macd;
pub mod rsi;
pub mod sma;

pub use bollinger::{Bollinger, BollingerBand};
pub use ema::{ema_of_series, Ema};
pub use macd::{Macd, MacdLine};
pub use rsi::Rsi;
pub use sma::Sma;

use thiserror::Error;
use tracing::debug;

use crate::domain::{IndicatorSet, Series};
use crate::error::PipelineError;

/// A pure indicator over close prices.
///
/// No output at bar t may depend on a close after bar t.
pub trait Indicator: Send + Sync {
    /// Output column name (e.g. "sma_20").
    fn name(&self) -> &str;

    /// Bars needed before the first defined output on a gap-free series.
    fn lookback(&self) -> usize;

    /// Compute the indicator for the whole series. Output length equals input length.
    fn compute(&self, closes: &[Option<f64>]) -> Vec<Option<f64>>;
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ComputationError {
    #[error("cannot compute indicators on an empty series")]
    EmptySeries,
}

/// Attach the standard indicator set to every bar.
pub fn compute_indicators(mut series: Series) -> Result<Series, PipelineError> {
    if series.is_empty() {
        return Err(ComputationError::EmptySeries.into());
    }

    let closes = series.closes();

    let sma_20 = Sma::new(20).compute(&closes);
    let sma_50 = Sma::new(50).compute(&closes);
    let sma_200 = Sma::new(200).compute(&closes);
    let rsi_14 = Rsi::new(14).compute(&closes);
    let macd = Macd::standard(MacdLine::Macd).compute(&closes);
    let macd_signal = Macd::standard(MacdLine::Signal).compute(&closes);
    let macd_histogram = Macd::standard(MacdLine::Histogram).compute(&closes);
    let bollinger_upper = Bollinger::upper(20, 2.0).compute(&closes);
    let bollinger_middle = Bollinger::middle(20, 2.0).compute(&closes);
    let bollinger_lower = Bollinger::lower(20, 2.0).compute(&closes);

    for (i, bar) in series.bars.iter_mut().enumerate() {
        bar.indicators = IndicatorSet {
            sma_20: sma_20[i],
            sma_50: sma_50[i],
            sma_200: sma_200[i],
            rsi_14: rsi_14[i],
            macd: macd[i],
            macd_signal: macd_signal[i],
            macd_histogram: macd_histogram[i],
            bollinger_upper: bollinger_upper[i],
            bollinger_middle: bollinger_middle[i],
            bollinger_lower: bollinger_lower[i],
        };
    }

    debug!(
        symbol = series.label(),
        bars = series.len(),
        "computed indicators"
    );
    Ok(series)
}

/// Wrap plain closes as a gap-free series for tests.
#[cfg(test)]
pub fn defined(closes: &[f64]) -> Vec<Option<f64>> {
    closes.iter().copied().map(Some).collect()
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Default epsilon for indicator tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BarTime, PriceBar};
    use crate::schema::Column;
    use chrono::NaiveDate;

    fn series_of(closes: &[f64]) -> Series {
        let base = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let bars = closes
            .iter()
            .enumerate()
            .map(|(i, &c)| PriceBar {
                close: Some(c),
                ..PriceBar::empty(BarTime::Naive(base + chrono::Duration::days(i as i64)))
            })
            .collect();
        Series::new(bars, vec![Column::Timestamp, Column::Close])
    }

    #[test]
    fn empty_series_is_computation_error() {
        let err = compute_indicators(series_of(&[])).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Computation(ComputationError::EmptySeries)
        ));
    }

    #[test]
    fn attaches_every_indicator() {
        let closes: Vec<f64> = (1..=60).map(|i| 100.0 + (i as f64).sin()).collect();
        let series = compute_indicators(series_of(&closes)).unwrap();

        let last = series.bars[59].indicators;
        assert!(last.sma_20.is_some());
        assert!(last.sma_50.is_some());
        assert!(last.sma_200.is_none());
        assert!(last.rsi_14.is_some());
        assert!(last.macd.is_some());
        assert!(last.bollinger_upper.unwrap() >= last.bollinger_middle.unwrap());
        assert_approx(
            last.bollinger_middle.unwrap(),
            last.sma_20.unwrap(),
            DEFAULT_EPSILON,
        );

        let first = series.bars[0].indicators;
        assert!(first.sma_20.is_none());
        assert!(first.rsi_14.is_none());
        assert_eq!(first.macd, Some(0.0));
    }

    #[test]
    fn no_look_ahead() {
        let closes: Vec<f64> = (0..80).map(|i| 50.0 + ((i * 7) % 13) as f64).collect();
        let full = compute_indicators(series_of(&closes)).unwrap();
        let truncated = compute_indicators(series_of(&closes[..40])).unwrap();
        for i in 0..40 {
            assert_eq!(full.bars[i].indicators, truncated.bars[i].indicators);
        }
    }
}
