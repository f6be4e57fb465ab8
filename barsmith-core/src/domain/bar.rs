//! PriceBar: one observation for one instrument at one instant.

use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::schema::Column;

/// A bar timestamp as it arrived from the provider.
///
/// Naive timestamps carry no offset and are *localized* to UTC during
/// normalization; zoned timestamps are *converted*. Keeping the two apart is
/// what lets the normalizer pick the right operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BarTime {
    Naive(NaiveDateTime),
    Zoned(DateTime<FixedOffset>),
}

impl BarTime {
    /// The instant this timestamp denotes. Naive values are read as UTC.
    pub fn instant(&self) -> DateTime<Utc> {
        match self {
            BarTime::Naive(naive) => naive.and_utc(),
            BarTime::Zoned(dt) => dt.with_timezone(&Utc),
        }
    }

    /// True once the timestamp is zoned and sits at offset zero.
    pub fn is_utc(&self) -> bool {
        matches!(self, BarTime::Zoned(dt) if dt.offset().local_minus_utc() == 0)
    }

    pub fn is_naive(&self) -> bool {
        matches!(self, BarTime::Naive(_))
    }

    /// Milliseconds since the Unix epoch.
    pub fn timestamp_millis(&self) -> i64 {
        self.instant().timestamp_millis()
    }
}

impl fmt::Display for BarTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BarTime::Naive(naive) => write!(f, "{}", naive.format("%Y-%m-%dT%H:%M:%S")),
            BarTime::Zoned(dt) => f.write_str(&dt.to_rfc3339()),
        }
    }
}

/// The four tradable price columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PriceField {
    Open,
    High,
    Low,
    Close,
}

impl PriceField {
    pub const ALL: [PriceField; 4] = [
        PriceField::Open,
        PriceField::High,
        PriceField::Low,
        PriceField::Close,
    ];

    pub fn column(self) -> Column {
        match self {
            PriceField::Open => Column::Open,
            PriceField::High => Column::High,
            PriceField::Low => Column::Low,
            PriceField::Close => Column::Close,
        }
    }

    pub fn name(self) -> &'static str {
        self.column().name()
    }
}

/// Derived per-bar indicator values.
///
/// `None` means "not yet defined" (warm-up, or a missing input inside the
/// window) and is distinct from a computed zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSet {
    pub sma_20: Option<f64>,
    pub sma_50: Option<f64>,
    pub sma_200: Option<f64>,
    pub rsi_14: Option<f64>,
    pub macd: Option<f64>,
    pub macd_signal: Option<f64>,
    pub macd_histogram: Option<f64>,
    pub bollinger_upper: Option<f64>,
    pub bollinger_middle: Option<f64>,
    pub bollinger_lower: Option<f64>,
}

impl IndicatorSet {
    /// Column names in storage order.
    pub const NAMES: [&'static str; 10] = [
        "sma_20",
        "sma_50",
        "sma_200",
        "rsi_14",
        "macd",
        "macd_signal",
        "macd_histogram",
        "bollinger_upper",
        "bollinger_middle",
        "bollinger_lower",
    ];

    /// Values in the same order as `NAMES`.
    pub fn values(&self) -> [Option<f64>; 10] {
        [
            self.sma_20,
            self.sma_50,
            self.sma_200,
            self.rsi_14,
            self.macd,
            self.macd_signal,
            self.macd_histogram,
            self.bollinger_upper,
            self.bollinger_middle,
            self.bollinger_lower,
        ]
    }
}

/// OHLCV bar for a single instrument at a single instant.
///
/// Cells are optional until gap filling runs; after `fill_gaps` only a
/// leading price gap can still be `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub timestamp: BarTime,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub volume: Option<u64>,
    pub adjusted_close: Option<f64>,
    #[serde(default)]
    pub indicators: IndicatorSet,
}

impl PriceBar {
    /// A bar with every data cell missing.
    pub fn empty(timestamp: BarTime) -> Self {
        Self {
            timestamp,
            open: None,
            high: None,
            low: None,
            close: None,
            volume: None,
            adjusted_close: None,
            indicators: IndicatorSet::default(),
        }
    }

    pub fn price(&self, field: PriceField) -> Option<f64> {
        match field {
            PriceField::Open => self.open,
            PriceField::High => self.high,
            PriceField::Low => self.low,
            PriceField::Close => self.close,
        }
    }

    pub fn price_mut(&mut self, field: PriceField) -> &mut Option<f64> {
        match field {
            PriceField::Open => &mut self.open,
            PriceField::High => &mut self.high,
            PriceField::Low => &mut self.low,
            PriceField::Close => &mut self.close,
        }
    }

    /// Whether the cell for `column` is missing. Timestamps are never missing.
    pub fn is_missing(&self, column: Column) -> bool {
        match column {
            Column::Timestamp => false,
            Column::Open => self.open.is_none(),
            Column::High => self.high.is_none(),
            Column::Low => self.low.is_none(),
            Column::Close => self.close.is_none(),
            Column::Volume => self.volume.is_none(),
            Column::AdjustedClose => self.adjusted_close.is_none(),
        }
    }

    /// Price-relationship checks: non-negative prices, `low <= high`,
    /// and `low <= close <= high` when both bounds are present.
    pub fn violations(&self) -> Vec<ViolationKind> {
        let mut found = Vec::new();

        for field in PriceField::ALL {
            if let Some(value) = self.price(field) {
                if value < 0.0 {
                    found.push(ViolationKind::NegativePrice { field, value });
                }
            }
        }
        if let Some(value) = self.adjusted_close {
            if value < 0.0 {
                found.push(ViolationKind::NegativeAdjustedClose { value });
            }
        }

        if let (Some(low), Some(high)) = (self.low, self.high) {
            if low > high {
                found.push(ViolationKind::LowAboveHigh { low, high });
            } else if let Some(close) = self.close {
                if close < low || close > high {
                    found.push(ViolationKind::CloseOutsideRange { close, low, high });
                }
            }
        }

        found
    }
}

/// A single broken price relationship.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ViolationKind {
    LowAboveHigh { low: f64, high: f64 },
    CloseOutsideRange { close: f64, low: f64, high: f64 },
    NegativePrice { field: PriceField, value: f64 },
    NegativeAdjustedClose { value: f64 },
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViolationKind::LowAboveHigh { low, high } => {
                write!(f, "low {low} is above high {high}")
            }
            ViolationKind::CloseOutsideRange { close, low, high } => {
                write!(f, "close {close} is outside [{low}, {high}]")
            }
            ViolationKind::NegativePrice { field, value } => {
                write!(f, "{} is negative ({value})", field.name())
            }
            ViolationKind::NegativeAdjustedClose { value } => {
                write!(f, "adjusted_close is negative ({value})")
            }
        }
    }
}

/// A violation tied to the input row it came from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceViolation {
    /// Zero-based row index in the provider table.
    pub row: usize,
    pub timestamp: BarTime,
    pub kind: ViolationKind,
}

impl fmt::Display for PriceViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "row {} ({}): {}", self.row, self.timestamp, self.kind)
    }
}
