//! Relative Strength Index (RSI).
//!
//! Simple (not Wilder) averaging: gains and losses of consecutive closes are
//! each averaged over a plain `period`-bar rolling window.
//! RSI = 100 - 100 / (1 + avg_gain / avg_loss)
//! Lookback: period (the first change exists at bar 1).
//! avg_loss == 0 → RSI = 100, flat windows included.

use super::sma::rolling_mean;
use super::Indicator;

#[derive(Debug, Clone)]
pub struct Rsi {
    period: usize,
    name: String,
}

impl Rsi {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "RSI period must be >= 1");
        Self {
            period,
            name: format!("rsi_{period}"),
        }
    }
}

impl Indicator for Rsi {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn compute(&self, closes: &[Option<f64>]) -> Vec<Option<f64>> {
        let n = closes.len();
        let mut gains = vec![None; n];
        let mut losses = vec![None; n];
        for i in 1..n {
            if let (Some(curr), Some(prev)) = (closes[i], closes[i - 1]) {
                let change = curr - prev;
                gains[i] = Some(change.max(0.0));
                losses[i] = Some((-change).max(0.0));
            }
        }

        let avg_gain = rolling_mean(&gains, self.period);
        let avg_loss = rolling_mean(&losses, self.period);

        avg_gain
            .into_iter()
            .zip(avg_loss)
            .map(|(g, l)| Some(compute_rsi(g?, l?)))
            .collect()
    }
}

fn compute_rsi(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        100.0
    } else {
        100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
    }
}
