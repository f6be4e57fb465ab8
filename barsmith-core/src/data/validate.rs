//! Schema check, cell coercion and price-relationship validation.
//!
//! Rows are coerced in input order so every error names the provider row it
//! came from. The resulting bars are then stably sorted by instant; duplicate
//! timestamps survive for the quality monitor to report.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use tracing::{debug, warn};

use super::table::{is_missing_text, Cell, RawTable};
use crate::config::{PricePolicy, ValidationConfig};
use crate::domain::{BarTime, PriceBar, PriceViolation, Series};
use crate::error::PipelineError;
use crate::schema::{Column, ColumnLayout, SchemaError, SchemaType};

const ZONED_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%:z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%z",
];

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// Validate a provider table and coerce it into a `Series`.
///
/// Structural problems and uncoercible cells are fatal. Broken price
/// relationships are fatal only under `PricePolicy::Strict`; otherwise they
/// are logged and recorded on the series.
pub fn validate(table: &RawTable, config: &ValidationConfig) -> Result<Series, PipelineError> {
    let layout = ColumnLayout::resolve(&table.headers)?;

    let mut indexed = Vec::with_capacity(table.rows.len());
    for (row, cells) in table.rows.iter().enumerate() {
        if cells.len() != layout.width() {
            return Err(SchemaError::RaggedRow {
                row,
                expected: layout.width(),
                found: cells.len(),
            }
            .into());
        }
        indexed.push((row, coerce_row(row, cells, &layout)?));
    }

    let mut violations = Vec::new();
    for (row, bar) in &indexed {
        for kind in bar.violations() {
            let violation = PriceViolation {
                row: *row,
                timestamp: bar.timestamp,
                kind,
            };
            if config.price_policy == PricePolicy::Strict {
                return Err(PipelineError::PriceRelationship(violation));
            }
            violations.push(violation);
        }
    }
    if !violations.is_empty() {
        let rows: Vec<usize> = violations.iter().map(|v| v.row).collect();
        warn!(
            count = violations.len(),
            ?rows,
            first = %violations[0],
            "price relationship violations kept"
        );
    }

    indexed.sort_by_key(|(_, bar)| bar.timestamp.instant());
    let bars: Vec<PriceBar> = indexed.into_iter().map(|(_, bar)| bar).collect();
    debug!(
        rows = bars.len(),
        columns = layout.columns().len(),
        "validated provider table"
    );

    let mut series = Series::new(bars, layout.columns());
    series.violations = violations;
    Ok(series)
}

fn coerce_row(
    row: usize,
    cells: &[Cell],
    layout: &ColumnLayout,
) -> Result<PriceBar, PipelineError> {
    let cell = |column: Column| layout.position(column).map(|idx| &cells[idx]);

    let ts_cell = cell(Column::Timestamp).unwrap_or(&Cell::Null);
    let timestamp =
        parse_timestamp(ts_cell).ok_or_else(|| coercion(row, Column::Timestamp, ts_cell))?;

    let mut bar = PriceBar::empty(timestamp);
    for column in [
        Column::Open,
        Column::High,
        Column::Low,
        Column::Close,
        Column::AdjustedClose,
    ] {
        let Some(c) = cell(column) else { continue };
        let value = parse_price(c).ok_or_else(|| coercion(row, column, c))?;
        match column {
            Column::Open => bar.open = value,
            Column::High => bar.high = value,
            Column::Low => bar.low = value,
            Column::Close => bar.close = value,
            _ => bar.adjusted_close = value,
        }
    }
    if let Some(c) = cell(Column::Volume) {
        bar.volume = parse_volume(c).ok_or_else(|| coercion(row, Column::Volume, c))?;
    }

    Ok(bar)
}

fn coercion(row: usize, column: Column, cell: &Cell) -> PipelineError {
    let value = match cell {
        Cell::Null => "null".to_string(),
        Cell::Int(v) => v.to_string(),
        Cell::Float(v) => v.to_string(),
        Cell::Text(s) => s.clone(),
    };
    let expected = match column.dtype() {
        SchemaType::Timestamp => "timestamp",
        SchemaType::Float64 => "float",
        SchemaType::UInt64 => "non-negative integer",
    };
    PipelineError::TypeCoercion {
        row,
        column,
        value,
        expected,
    }
}

/// Parse a timestamp cell. Missing cells never parse.
pub fn parse_timestamp(cell: &Cell) -> Option<BarTime> {
    match cell {
        Cell::Null => None,
        Cell::Int(secs) => from_unix_seconds(*secs),
        Cell::Float(v) if v.is_finite() && v.fract() == 0.0 => from_unix_seconds(*v as i64),
        Cell::Float(_) => None,
        Cell::Text(s) => parse_timestamp_text(s.trim()),
    }
}

fn from_unix_seconds(secs: i64) -> Option<BarTime> {
    DateTime::from_timestamp(secs, 0).map(|dt| BarTime::Zoned(dt.fixed_offset()))
}

fn parse_timestamp_text(s: &str) -> Option<BarTime> {
    if is_missing_text(s) {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(BarTime::Zoned(dt));
    }
    for fmt in ZONED_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(BarTime::Zoned(dt));
        }
    }
    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(BarTime::Naive(naive));
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(BarTime::Naive)
}

/// `Some(None)` for a missing cell, `None` when the cell is not a number.
fn parse_price(cell: &Cell) -> Option<Option<f64>> {
    if cell.is_missing() {
        return Some(None);
    }
    let value = match cell {
        Cell::Int(v) => *v as f64,
        Cell::Float(v) => *v,
        Cell::Text(s) => s.trim().parse::<f64>().ok()?,
        Cell::Null => return Some(None),
    };
    value.is_finite().then_some(Some(value))
}

/// Volumes must be finite and non-negative; fractions truncate toward zero.
fn parse_volume(cell: &Cell) -> Option<Option<u64>> {
    if cell.is_missing() {
        return Some(None);
    }
    match cell {
        Cell::Int(v) => u64::try_from(*v).ok().map(Some),
        other => {
            let value = parse_price(other)??;
            (value >= 0.0).then_some(Some(value.trunc() as u64))
        }
    }
}
