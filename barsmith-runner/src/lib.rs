//! Barsmith Runner: batch collection around the processing engine.
//!
//! This crate builds on `barsmith-core` to provide:
//! - TOML run configuration with `${VAR}` resolution
//! - Row providers (CSV directory, Yahoo Finance, Alpha Vantage, synthetic)
//! - A sliding-window rate limiter shared by provider requests
//! - Parquet and CSV storage sinks
//! - Per-operation metrics and alert routing
//! - Per-symbol batch execution on a bounded rayon pool

pub mod alerts;
pub mod alpha_vantage;
pub mod batch;
pub mod config;
pub mod metrics;
pub mod parquet;
pub mod provider;
pub mod rate_limiter;
pub mod storage;
pub mod yahoo;

pub use alerts::{Alert, AlertLevel, AlertSink, MemoryAlertSink, TracingAlertSink};
pub use alpha_vantage::AlphaVantageProvider;
pub use batch::{
    build_provider, build_sink, lookback_start, run_batch, Batch, BatchSummary, RunError,
    SymbolOutcome,
};
pub use config::{
    AlphaVantageConfig, ConfigError, MonitoringConfig, ProviderConfig, RunnerConfig,
    StorageConfig, YahooConfig,
};
pub use metrics::{MetricsCollector, OperationId, OperationMetric, OperationStatus};
pub use parquet::{ParquetSink, StoreMeta};
pub use provider::{
    retain_date_range, CsvDirProvider, ProviderError, RowProvider, SyntheticProvider,
};
pub use rate_limiter::RateLimiter;
pub use storage::{CsvSink, SeriesSink, StorageError};
pub use yahoo::YahooProvider;

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn shared_components_are_send_sync() {
        assert_send::<RateLimiter>();
        assert_sync::<RateLimiter>();
        assert_send::<MetricsCollector>();
        assert_sync::<MetricsCollector>();
        assert_send::<MemoryAlertSink>();
        assert_sync::<MemoryAlertSink>();
        assert_send::<YahooProvider>();
        assert_sync::<YahooProvider>();
        assert_send::<AlphaVantageProvider>();
        assert_sync::<AlphaVantageProvider>();
        assert_send::<ParquetSink>();
        assert_sync::<ParquetSink>();
    }

    #[test]
    fn errors_are_send_sync() {
        assert_send::<RunError>();
        assert_sync::<RunError>();
        assert_send::<ProviderError>();
        assert_sync::<StorageError>();
    }

    #[test]
    fn config_types_are_send_sync() {
        assert_send::<RunnerConfig>();
        assert_sync::<RunnerConfig>();
        assert_send::<BatchSummary>();
        assert_sync::<BatchSummary>();
    }
}
