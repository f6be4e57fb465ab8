//! The fixed processing sequence for one series.
//!
//! validate → fill_gaps → normalize_timezone → compute_indicators → check_quality
//!
//! Errors abort the series. Quality findings never do; they come back beside
//! the processed series.

use serde::{Deserialize, Serialize};
use tracing::{debug, info_span};

use crate::config::{ConfigError, PipelineConfig};
use crate::data::{fill_gaps, normalize_timezone, validate, RawTable};
use crate::domain::Series;
use crate::error::PipelineError;
use crate::indicators::compute_indicators;
use crate::quality::{check_quality, QualityReport};

/// A processed series and the quality findings about it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Processed {
    pub series: Series,
    pub report: QualityReport,
}

impl Processed {
    pub fn into_parts(self) -> (Series, QualityReport) {
        (self.series, self.report)
    }
}

/// A validated configuration bound to the processing sequence.
///
/// Holds no state between calls; one instance can serve many threads.
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn process(&self, raw: &RawTable) -> Result<Processed, PipelineError> {
        let series = validate(raw, &self.config.validation)?;
        self.finish(series)
    }

    /// Like `process`, tagging the series and its log lines with `symbol`.
    pub fn process_symbol(
        &self,
        symbol: &str,
        raw: &RawTable,
    ) -> Result<Processed, PipelineError> {
        let _span = info_span!("process", symbol).entered();
        let series = validate(raw, &self.config.validation)?.with_symbol(symbol);
        self.finish(series)
    }

    fn finish(&self, series: Series) -> Result<Processed, PipelineError> {
        let series = fill_gaps(series);
        let series = normalize_timezone(series);
        let series = compute_indicators(series)?;
        let report = check_quality(&series, &self.config.quality);
        debug!(
            symbol = series.label(),
            bars = series.len(),
            issues = report.len(),
            "processed series"
        );
        Ok(Processed { series, report })
    }
}

/// One-shot processing with an unvalidated config.
pub fn process(raw: &RawTable, config: &PipelineConfig) -> Result<Processed, PipelineError> {
    Pipeline::new(config.clone())?.process(raw)
}
