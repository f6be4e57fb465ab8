//! Multi-symbol batch orchestration.
//!
//! Each symbol runs fetch → process → store on its own. A failure is
//! recorded against that symbol and never touches the others. With
//! `parallel_jobs > 1` symbols are spread over a local rayon pool; results
//! always come back in input order.

use barsmith_core::{Pipeline, PipelineError, QualityReport};
use chrono::{Days, NaiveDate};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{error, info};

use crate::alerts::{Alert, AlertLevel, AlertSink};
use crate::alpha_vantage::AlphaVantageProvider;
use crate::config::{ConfigError, ProviderConfig, RunnerConfig, StorageConfig};
use crate::metrics::{MetricsCollector, OperationMetric};
use crate::parquet::ParquetSink;
use crate::provider::{CsvDirProvider, ProviderError, RowProvider};
use crate::storage::{CsvSink, SeriesSink, StorageError};
use crate::yahoo::YahooProvider;

#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("fetch failed: {0}")]
    Provider(#[from] ProviderError),

    #[error("processing failed: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("store failed: {0}")]
    Storage(#[from] StorageError),

    #[error("failed to build thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("start date {start} is after end date {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },
}

impl RunError {
    /// The batch stage this error belongs to.
    pub fn stage(&self) -> &'static str {
        match self {
            RunError::Provider(_) => "fetch",
            RunError::Pipeline(_) => "process",
            RunError::Storage(_) => "store",
            RunError::Config(_) | RunError::ThreadPool(_) | RunError::InvalidRange { .. } => {
                "setup"
            }
        }
    }
}

/// What happened to one symbol.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SymbolOutcome {
    Succeeded {
        symbol: String,
        bars: usize,
        /// Bars written, or `None` when no sink is configured.
        stored: Option<usize>,
        report: QualityReport,
    },
    Failed {
        symbol: String,
        stage: &'static str,
        error: String,
    },
}

impl SymbolOutcome {
    pub fn symbol(&self) -> &str {
        match self {
            SymbolOutcome::Succeeded { symbol, .. } | SymbolOutcome::Failed { symbol, .. } => {
                symbol
            }
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, SymbolOutcome::Succeeded { .. })
    }
}

/// Per-symbol outcomes, in input order, plus the batch's operation log.
#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub outcomes: Vec<SymbolOutcome>,
    pub operations: Vec<OperationMetric>,
    /// Failed and slow operations.
    pub operation_issues: Vec<String>,
}

impl BatchSummary {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    pub fn all_succeeded(&self) -> bool {
        self.outcomes.iter().all(SymbolOutcome::is_success)
    }

    pub fn outcome(&self, symbol: &str) -> Option<&SymbolOutcome> {
        self.outcomes.iter().find(|o| o.symbol() == symbol)
    }
}

/// Everything one batch run needs, borrowed.
pub struct Batch<'a> {
    pub pipeline: &'a Pipeline,
    pub provider: &'a dyn RowProvider,
    pub sink: Option<&'a dyn SeriesSink>,
    pub alerts: &'a dyn AlertSink,
    pub parallel_jobs: usize,
    pub sla_secs: &'a BTreeMap<String, u64>,
}

impl Batch<'_> {
    /// Run every symbol over `[start, end]`.
    ///
    /// Returns `Err` only for setup problems; per-symbol failures live in
    /// the summary.
    pub fn run(
        &self,
        symbols: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<BatchSummary, RunError> {
        if start > end {
            return Err(RunError::InvalidRange { start, end });
        }

        let metrics = MetricsCollector::new();
        info!(
            symbols = symbols.len(),
            provider = self.provider.name(),
            %start,
            %end,
            "starting batch"
        );

        let outcomes: Vec<SymbolOutcome> = if self.parallel_jobs > 1 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(self.parallel_jobs)
                .build()?;
            pool.install(|| {
                symbols
                    .par_iter()
                    .map(|symbol| self.run_symbol(symbol, start, end, &metrics))
                    .collect()
            })
        } else {
            symbols
                .iter()
                .map(|symbol| self.run_symbol(symbol, start, end, &metrics))
                .collect()
        };

        let operation_issues = metrics.issues(self.sla_secs);
        if !operation_issues.is_empty() {
            self.alerts.send(
                Alert::new(AlertLevel::Warning, "Pipeline issues detected")
                    .with_details(operation_issues.clone()),
            );
        }

        let summary = BatchSummary {
            start,
            end,
            outcomes,
            operations: metrics.snapshot(),
            operation_issues,
        };
        self.alerts.send(Alert::new(
            AlertLevel::Info,
            format!(
                "Batch finished: {}/{} symbols succeeded",
                summary.succeeded(),
                summary.outcomes.len()
            ),
        ));
        Ok(summary)
    }

    fn run_symbol(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
        metrics: &MetricsCollector,
    ) -> SymbolOutcome {
        match self.try_symbol(symbol, start, end, metrics) {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(symbol, stage = e.stage(), "{e}");
                self.alerts.send(
                    Alert::new(AlertLevel::Critical, "Symbol processing failed")
                        .for_symbol(symbol)
                        .with_details(vec![e.to_string()]),
                );
                SymbolOutcome::Failed {
                    symbol: symbol.to_string(),
                    stage: e.stage(),
                    error: e.to_string(),
                }
            }
        }
    }

    fn try_symbol(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
        metrics: &MetricsCollector,
    ) -> Result<SymbolOutcome, RunError> {
        let raw = metrics.time("fetch", symbol, || self.provider.fetch(symbol, start, end))?;
        let processed =
            metrics.time("process", symbol, || self.pipeline.process_symbol(symbol, &raw))?;
        let stored = match self.sink {
            Some(sink) => Some(metrics.time("store", symbol, || {
                sink.store(symbol, &processed.series)
            })?),
            None => None,
        };

        let (series, report) = processed.into_parts();
        info!(
            symbol,
            bars = series.len(),
            issues = report.len(),
            stored = stored.unwrap_or(0),
            "symbol done"
        );
        if !report.is_clean() {
            self.alerts.send(
                Alert::new(AlertLevel::Warning, "Data quality issues detected")
                    .for_symbol(symbol)
                    .with_details(report.issues().to_vec()),
            );
        }

        Ok(SymbolOutcome::Succeeded {
            symbol: symbol.to_string(),
            bars: series.len(),
            stored,
            report,
        })
    }
}

/// Provider described by `config`.
pub fn build_provider(config: &ProviderConfig) -> Result<Box<dyn RowProvider>, RunError> {
    Ok(match config {
        ProviderConfig::Csv { dir } => Box::new(CsvDirProvider::new(dir)),
        ProviderConfig::Yahoo(yahoo) => Box::new(YahooProvider::from_config(yahoo)?),
        ProviderConfig::AlphaVantage(av) => Box::new(AlphaVantageProvider::from_config(av)?),
    })
}

/// Sink described by `config`, or `None` for process-only runs.
pub fn build_sink(config: &StorageConfig) -> Option<Box<dyn SeriesSink>> {
    match config {
        StorageConfig::Parquet { dir } => Some(Box::new(ParquetSink::new(dir))),
        StorageConfig::Csv { dir } => Some(Box::new(CsvSink::new(dir))),
        StorageConfig::None => None,
    }
}

/// `lookback_days` before `end`, clamped at the earliest representable date.
pub fn lookback_start(end: NaiveDate, lookback_days: u32) -> NaiveDate {
    end.checked_sub_days(Days::new(u64::from(lookback_days)))
        .unwrap_or(NaiveDate::MIN)
}

/// Run a whole configured batch ending on `end`.
///
/// `start` defaults to `end - lookback_days`.
pub fn run_batch(
    config: &RunnerConfig,
    start: Option<NaiveDate>,
    end: NaiveDate,
    alerts: &dyn AlertSink,
) -> Result<BatchSummary, RunError> {
    let pipeline = Pipeline::new(config.pipeline.clone()).map_err(ConfigError::from)?;
    let provider = build_provider(&config.provider)?;
    let sink = build_sink(&config.storage);

    let batch = Batch {
        pipeline: &pipeline,
        provider: provider.as_ref(),
        sink: sink.as_deref(),
        alerts,
        parallel_jobs: config.parallel_jobs,
        sla_secs: &config.monitoring.sla_secs,
    };
    let start = start.unwrap_or_else(|| lookback_start(end, config.lookback_days));
    batch.run(&config.symbols, start, end)
}
