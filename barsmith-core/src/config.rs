//! Typed pipeline configuration.
//!
//! Every field has a default, so an empty TOML table is a valid config.
//! `validate()` runs once when a `Pipeline` is built; business logic never
//! re-checks ranges.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Everything the processing engine needs, fully resolved.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub validation: ValidationConfig,
    pub quality: QualityConfig,
}

impl PipelineConfig {
    /// Check every numeric field against its allowed range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.quality.validate()
    }
}

/// How validation treats broken price relationships.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    pub price_policy: PricePolicy,
}

/// What to do with a well-typed row whose prices contradict each other.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PricePolicy {
    /// Log the violation, record it on the series, keep the row.
    #[default]
    Permissive,
    /// Abort the series on the first violation.
    Strict,
}

/// Thresholds for the quality monitor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    /// Worst per-column missing fraction tolerated before an issue is raised.
    pub max_missing_ratio: f64,
    /// Z-score above which a price is an anomaly.
    pub zscore_threshold: f64,
    pub zscore_method: ZScoreMethod,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            max_missing_ratio: 0.05,
            zscore_threshold: 3.0,
            zscore_method: ZScoreMethod::LeaveOneOut,
        }
    }
}

impl QualityConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.max_missing_ratio) {
            return Err(ConfigError::OutOfRange {
                field: "quality.max_missing_ratio",
                value: self.max_missing_ratio,
                expected: "a fraction in [0, 1]",
            });
        }
        if !(self.zscore_threshold.is_finite() && self.zscore_threshold > 0.0) {
            return Err(ConfigError::OutOfRange {
                field: "quality.zscore_threshold",
                value: self.zscore_threshold,
                expected: "a positive finite number",
            });
        }
        Ok(())
    }
}

/// How a price's z-score is measured.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ZScoreMethod {
    /// Score each bar against the mean and sample stddev of the other bars.
    ///
    /// An in-sample z-score can never exceed `(n-1)/sqrt(n)`, so a single
    /// spike in a short series would go unnoticed.
    #[default]
    LeaveOneOut,
    /// `|x - mean| / stddev` over the whole column (sample stddev).
    InSample,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{field} must be {expected}, got {value}")]
    OutOfRange {
        field: &'static str,
        value: f64,
        expected: &'static str,
    },
}
