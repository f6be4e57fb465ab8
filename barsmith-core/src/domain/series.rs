//! Series: the ordered bars of one instrument for one collection run.

use serde::{Deserialize, Serialize};

use super::bar::{PriceBar, PriceField, PriceViolation};
use crate::schema::Column;

/// Bars for a single instrument, ascending by timestamp.
///
/// Duplicate timestamps are kept as they arrived; detecting them is the
/// quality monitor's job. `columns` records which canonical columns the
/// provider actually sent, so an absent `adjusted_close` column stays
/// distinguishable from empty cells.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    pub symbol: Option<String>,
    pub bars: Vec<PriceBar>,
    pub columns: Vec<Column>,
    pub violations: Vec<PriceViolation>,
}

impl Series {
    pub fn new(bars: Vec<PriceBar>, columns: Vec<Column>) -> Self {
        Self {
            symbol: None,
            bars,
            columns,
            violations: Vec::new(),
        }
    }

    pub fn with_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.symbol = Some(symbol.into());
        self
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn has_column(&self, column: Column) -> bool {
        self.columns.contains(&column)
    }

    /// Close prices in bar order.
    pub fn closes(&self) -> Vec<Option<f64>> {
        self.prices(PriceField::Close)
    }

    /// One price column in bar order.
    pub fn prices(&self, field: PriceField) -> Vec<Option<f64>> {
        self.bars.iter().map(|b| b.price(field)).collect()
    }

    /// True when every timestamp is zoned at UTC.
    pub fn is_utc_normalized(&self) -> bool {
        self.bars.iter().all(|b| b.timestamp.is_utc())
    }

    /// Symbol for log and report lines.
    pub fn label(&self) -> &str {
        self.symbol.as_deref().unwrap_or("<unnamed>")
    }
}
