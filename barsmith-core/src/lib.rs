//! Barsmith Core: the processing and quality-validation engine.
//!
//! This crate turns raw, heterogeneous provider rows into a validated,
//! gap-filled, indicator-enriched, UTC-normalized price series:
//! - Canonical column contract and header normalization (`schema`)
//! - Type coercion and price-relationship validation (`data::validate`)
//! - Missing-value policy (`data::fill`)
//! - SMA / RSI / MACD / Bollinger indicators (`indicators`)
//! - Localize-vs-convert timestamp handling (`data::timezone`)
//! - Statistical and structural quality checks (`quality`)
//! - The fixed in-process sequence tying them together (`pipeline`)
//!
//! Everything here is synchronous and holds no state between calls, so a
//! `Pipeline` can be shared by reference across worker threads.

pub mod config;
pub mod data;
pub mod domain;
pub mod error;
pub mod indicators;
pub mod pipeline;
pub mod quality;
pub mod schema;
pub mod synthetic;

pub use config::{PipelineConfig, PricePolicy, QualityConfig, ValidationConfig, ZScoreMethod};
pub use data::{fill_gaps, normalize_timezone, validate, Cell, RawTable};
pub use domain::{BarTime, IndicatorSet, PriceBar, PriceField, PriceViolation, Series};
pub use error::PipelineError;
pub use indicators::compute_indicators;
pub use pipeline::{process, Pipeline, Processed};
pub use quality::{check_quality, QualityReport};
