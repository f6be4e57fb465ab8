//! Quality monitor: structural and statistical checks over a processed series.
//!
//! Findings are data, never errors. All checks run on every call and their
//! issues accumulate in a fixed order: missing values, duplicates, anomalies.
//!
//! Anomalies are scored leave-one-out by default rather than with the plain
//! in-sample `|x - mean| / stddev`: an in-sample score over `n` values can
//! never exceed `(n - 1) / sqrt(n)`, so a single spike in a 10-bar window
//! tops out near 2.85 and would slip under a threshold of 3.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::warn;

use crate::config::{QualityConfig, ZScoreMethod};
use crate::domain::{PriceField, Series};
use crate::schema::Column;

/// Human-readable quality findings for one series. Empty means clean.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityReport {
    issues: Vec<String>,
}

impl QualityReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, issue: impl Into<String>) {
        self.issues.push(issue.into());
    }

    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn issues(&self) -> &[String] {
        &self.issues
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }
}

impl IntoIterator for QualityReport {
    type Item = String;
    type IntoIter = std::vec::IntoIter<String>;

    fn into_iter(self) -> Self::IntoIter {
        self.issues.into_iter()
    }
}

impl<'a> IntoIterator for &'a QualityReport {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.issues.iter()
    }
}

/// Run every quality check against `series`.
pub fn check_quality(series: &Series, config: &QualityConfig) -> QualityReport {
    let mut report = QualityReport::new();

    if let Some((column, ratio)) = worst_missing_ratio(series) {
        if ratio > config.max_missing_ratio {
            report.push(format!(
                "High missing values: {:.2}% in {column}",
                ratio * 100.0
            ));
        }
    }

    let repeated = duplicate_timestamps(series);
    if repeated > 0 {
        report.push(format!("Duplicate timestamps found: {repeated} repeated"));
    }

    for field in PriceField::ALL {
        let values: Vec<f64> = series.prices(field).into_iter().flatten().collect();
        if has_anomaly(&values, config.zscore_threshold, config.zscore_method) {
            report.push(format!("Price anomalies detected in {}", field.name()));
        }
    }

    for issue in &report {
        warn!(symbol = series.label(), "{issue}");
    }
    report
}

/// Worst per-column missing fraction over the data columns the input carried.
/// Ties go to the column earliest in schema order.
fn worst_missing_ratio(series: &Series) -> Option<(Column, f64)> {
    if series.is_empty() {
        return None;
    }
    let total = series.len() as f64;

    let mut worst: Option<(Column, f64)> = None;
    for &column in &series.columns {
        let missing = series.bars.iter().filter(|b| b.is_missing(column)).count();
        let ratio = missing as f64 / total;
        if worst.map_or(true, |(_, w)| ratio > w) {
            worst = Some((column, ratio));
        }
    }
    worst
}

/// Bars whose instant already appeared earlier in the series.
fn duplicate_timestamps(series: &Series) -> usize {
    let mut seen = HashSet::with_capacity(series.len());
    series
        .bars
        .iter()
        .filter(|b| !seen.insert(b.timestamp.instant()))
        .count()
}

fn has_anomaly(values: &[f64], threshold: f64, method: ZScoreMethod) -> bool {
    zscores(values, method).is_some_and(|z| z.iter().any(|&z| z > threshold))
}

/// Per-value z-scores, or `None` when the column has too few values or no
/// spread at all.
fn zscores(values: &[f64], method: ZScoreMethod) -> Option<Vec<f64>> {
    let n = values.len();
    if n < 3 {
        return None;
    }
    let nf = n as f64;
    let mean = values.iter().sum::<f64>() / nf;
    let m2: f64 = values.iter().map(|x| (x - mean).powi(2)).sum();
    let eps = values.iter().fold(0.0_f64, |acc, x| acc.max(x.abs())) * 1e-12;
    if m2.sqrt() <= eps {
        return None;
    }

    let scores = match method {
        ZScoreMethod::InSample => {
            let std = (m2 / (nf - 1.0)).sqrt();
            values.iter().map(|x| (x - mean).abs() / std).collect()
        }
        ZScoreMethod::LeaveOneOut => {
            let scale = nf / (nf - 1.0);
            values
                .iter()
                .map(|x| {
                    let d = x - mean;
                    // Distance from the mean of the other n-1 values, and
                    // their sample variance, without recomputing either.
                    let dev = d.abs() * scale;
                    let var = ((m2 - d * d * scale) / (nf - 2.0)).max(0.0);
                    let std = var.sqrt();
                    if dev <= eps {
                        0.0
                    } else if std <= eps {
                        f64::INFINITY
                    } else {
                        dev / std
                    }
                })
                .collect()
        }
    };
    Some(scores)
}
