//! Exponential Moving Average (EMA).
//!
//! ema[0] = close[0], ema[t] = alpha * close[t] + (1 - alpha) * ema[t-1],
//! alpha = 2 / (span + 1). Defined from the first bar (lookback 0).
//!
//! The recurrence seeds at the first defined input. A missing input after
//! that leaves the bar undefined and carries the last EMA forward unchanged.

use super::Indicator;

#[derive(Debug, Clone)]
pub struct Ema {
    span: usize,
    name: String,
}

impl Ema {
    pub fn new(span: usize) -> Self {
        assert!(span >= 1, "EMA span must be >= 1");
        Self {
            span,
            name: format!("ema_{span}"),
        }
    }
}

impl Indicator for Ema {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        0
    }

    fn compute(&self, closes: &[Option<f64>]) -> Vec<Option<f64>> {
        ema_of_series(closes, self.span)
    }
}

/// EMA of an arbitrary optional series. Used by MACD for the signal line.
pub fn ema_of_series(values: &[Option<f64>], span: usize) -> Vec<Option<f64>> {
    let mut result = vec![None; values.len()];
    if span == 0 {
        return result;
    }

    let alpha = 2.0 / (span as f64 + 1.0);
    let mut prev: Option<f64> = None;
    for (out, value) in result.iter_mut().zip(values) {
        let Some(x) = *value else { continue };
        // `prev + alpha * (x - prev)` keeps a constant input exactly constant.
        let ema = match prev {
            None => x,
            Some(p) => p + alpha * (x - p),
        };
        *out = Some(ema);
        prev = Some(ema);
    }
    result
}
