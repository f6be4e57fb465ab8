//! Fatal errors for a single series.
//!
//! Data-quality findings are never errors; they come back in a `QualityReport`.

use thiserror::Error;

use crate::config::ConfigError;
use crate::domain::PriceViolation;
use crate::indicators::ComputationError;
use crate::schema::{Column, SchemaError};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("row {row}: cannot coerce {column} value '{value}' to {expected}")]
    TypeCoercion {
        row: usize,
        column: Column,
        value: String,
        expected: &'static str,
    },

    #[error("computation error: {0}")]
    Computation(#[from] ComputationError),

    /// Only raised under `PricePolicy::Strict`.
    #[error("invalid price relationship at {0}")]
    PriceRelationship(PriceViolation),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}
