//! Canonical column contract: the boundary between provider adapters and the engine.
//!
//! Providers hand over tables whose headers may be capitalized (`Date`, `Adj Close`)
//! or canonical (`timestamp`, `adjusted_close`). Headers are normalized here and
//! resolved against `BAR_SCHEMA` before any cell is touched.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;
use tracing::debug;

/// A canonical column of a price bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Column {
    Timestamp,
    Open,
    High,
    Low,
    Close,
    Volume,
    AdjustedClose,
}

/// Semantic type a column is coerced into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchemaType {
    Timestamp,
    Float64,
    UInt64,
}

/// A single field in the canonical bar schema.
#[derive(Debug, Clone, Copy)]
pub struct SchemaField {
    pub column: Column,
    pub dtype: SchemaType,
    pub required: bool,
}

/// The canonical bar schema.
///
/// - Required: timestamp, open, high, low, close, volume
/// - Optional: adjusted_close (absence of the column is preserved as absence)
/// - Timestamps: naive or offset-carrying on input, UTC after normalization
pub const BAR_SCHEMA: &[SchemaField] = &[
    SchemaField {
        column: Column::Timestamp,
        dtype: SchemaType::Timestamp,
        required: true,
    },
    SchemaField {
        column: Column::Open,
        dtype: SchemaType::Float64,
        required: true,
    },
    SchemaField {
        column: Column::High,
        dtype: SchemaType::Float64,
        required: true,
    },
    SchemaField {
        column: Column::Low,
        dtype: SchemaType::Float64,
        required: true,
    },
    SchemaField {
        column: Column::Close,
        dtype: SchemaType::Float64,
        required: true,
    },
    SchemaField {
        column: Column::Volume,
        dtype: SchemaType::UInt64,
        required: true,
    },
    SchemaField {
        column: Column::AdjustedClose,
        dtype: SchemaType::Float64,
        required: false,
    },
];

impl Column {
    /// Canonical lower-case name.
    pub fn name(self) -> &'static str {
        match self {
            Column::Timestamp => "timestamp",
            Column::Open => "open",
            Column::High => "high",
            Column::Low => "low",
            Column::Close => "close",
            Column::Volume => "volume",
            Column::AdjustedClose => "adjusted_close",
        }
    }

    /// Look up a column by its canonical name.
    pub fn from_canonical(name: &str) -> Option<Column> {
        BAR_SCHEMA
            .iter()
            .map(|f| f.column)
            .find(|c| c.name() == name)
    }

    /// Resolve a raw provider header (any supported style) to a column.
    pub fn from_header(header: &str) -> Option<Column> {
        Self::from_canonical(&canonical_name(header))
    }

    pub fn dtype(self) -> SchemaType {
        match self {
            Column::Timestamp => SchemaType::Timestamp,
            Column::Volume => SchemaType::UInt64,
            _ => SchemaType::Float64,
        }
    }

    pub fn is_required(self) -> bool {
        self != Column::AdjustedClose
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Normalize a provider header to the canonical lower-case style.
///
/// `"Adj Close"` → `"adjusted_close"`, `"Date"` → `"timestamp"`, `"Close"` → `"close"`.
/// Unrecognized headers come back lower-cased with `_` separators.
pub fn canonical_name(header: &str) -> String {
    let lowered: String = header
        .trim()
        .chars()
        .map(|c| match c {
            ' ' | '-' => '_',
            c => c.to_ascii_lowercase(),
        })
        .collect();

    match lowered.as_str() {
        "date" | "datetime" | "time" => "timestamp".to_string(),
        "adj_close" | "adjclose" => "adjusted_close".to_string(),
        _ => lowered,
    }
}

/// Where each canonical column sits in a provider table.
#[derive(Debug, Clone)]
pub struct ColumnLayout {
    positions: HashMap<Column, usize>,
    width: usize,
}

impl ColumnLayout {
    /// Normalize headers and check them against `BAR_SCHEMA`.
    ///
    /// All absent required columns are reported together.
    pub fn resolve<S: AsRef<str>>(headers: &[S]) -> Result<Self, SchemaError> {
        let mut positions = HashMap::new();

        for (idx, header) in headers.iter().enumerate() {
            let header = header.as_ref();
            let canonical = canonical_name(header);
            match Column::from_canonical(&canonical) {
                Some(column) => {
                    if positions.insert(column, idx).is_some() {
                        return Err(SchemaError::DuplicateColumn(canonical));
                    }
                }
                None => debug!(header, "ignoring unrecognized column"),
            }
        }

        let missing: Vec<String> = BAR_SCHEMA
            .iter()
            .filter(|f| f.required && !positions.contains_key(&f.column))
            .map(|f| f.column.name().to_string())
            .collect();
        if !missing.is_empty() {
            return Err(SchemaError::MissingColumns(missing));
        }

        Ok(Self {
            positions,
            width: headers.len(),
        })
    }

    /// Index of `column` in the provider row, if present.
    pub fn position(&self, column: Column) -> Option<usize> {
        self.positions.get(&column).copied()
    }

    /// Number of cells every row must carry.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Columns present in the table, in schema order.
    pub fn columns(&self) -> Vec<Column> {
        BAR_SCHEMA
            .iter()
            .map(|f| f.column)
            .filter(|c| self.positions.contains_key(c))
            .collect()
    }
}

/// Structural problems with a provider table. Fatal for the series.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("column '{0}' appears more than once after header normalization")]
    DuplicateColumn(String),

    #[error("row {row} has {found} cells, expected {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        found: usize,
    },
}
