//! Row provider trait plus the CSV-directory and synthetic providers.
//!
//! Providers return untyped `RawTable`s; all coercion and validation happen
//! in the processing engine, so a provider never needs to know the schema.

use barsmith_core::data::validate::parse_timestamp;
use barsmith_core::data::TableError;
use barsmith_core::schema::Column;
use barsmith_core::synthetic::random_walk;
use barsmith_core::{BarTime, RawTable};
use chrono::NaiveDate;
use std::fs::File;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Structured errors for fetching rows.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("authentication required: {0}")]
    AuthenticationRequired(String),

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse {path}: {source}")]
    Table {
        path: PathBuf,
        #[source]
        source: TableError,
    },

    #[error("provider error: {0}")]
    Other(String),
}

/// A source of raw provider rows for one symbol at a time.
pub trait RowProvider: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Fetch daily rows for `symbol` between `start` and `end`, inclusive.
    fn fetch(&self, symbol: &str, start: NaiveDate, end: NaiveDate)
        -> Result<RawTable, ProviderError>;
}

/// Keep the rows whose timestamp falls on a date in `[start, end]`.
///
/// A zoned timestamp counts on its own local date. Rows whose timestamp is
/// missing or unparseable stay, so validation can report them, and a table
/// with no timestamp column is left alone. Returns the number of rows dropped.
pub fn retain_date_range(table: &mut RawTable, start: NaiveDate, end: NaiveDate) -> usize {
    let Some(position) = table
        .headers
        .iter()
        .position(|h| Column::from_header(h) == Some(Column::Timestamp))
    else {
        return 0;
    };

    let before = table.rows.len();
    table
        .rows
        .retain(|row| match row.get(position).and_then(parse_timestamp) {
            Some(ts) => (start..=end).contains(&calendar_date(&ts)),
            None => true,
        });
    before - table.rows.len()
}

fn calendar_date(ts: &BarTime) -> NaiveDate {
    match ts {
        BarTime::Naive(naive) => naive.date(),
        BarTime::Zoned(dt) => dt.date_naive(),
    }
}

/// Reads `{dir}/{symbol}.csv`, clipped to the requested dates.
#[derive(Debug, Clone)]
pub struct CsvDirProvider {
    dir: PathBuf,
}

impl CsvDirProvider {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, symbol: &str) -> PathBuf {
        self.dir.join(format!("{symbol}.csv"))
    }
}

impl RowProvider for CsvDirProvider {
    fn name(&self) -> &str {
        "csv"
    }

    fn fetch(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<RawTable, ProviderError> {
        let path = self.path_for(symbol);
        let file = File::open(&path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                ProviderError::SymbolNotFound {
                    symbol: symbol.to_string(),
                }
            } else {
                ProviderError::Io {
                    path: path.clone(),
                    source,
                }
            }
        })?;
        let mut table = RawTable::from_csv_reader(file)
            .map_err(|source| ProviderError::Table { path, source })?;
        let dropped = retain_date_range(&mut table, start, end);
        debug!(symbol, rows = table.len(), dropped, "read csv rows");
        Ok(table)
    }
}

/// Seeded random-walk rows for any symbol.
///
/// The same `(seed, symbol)` always yields the same table, whatever order
/// symbols are fetched in. Walks always start on 2020-01-02 and the requested
/// range is not applied.
#[derive(Debug, Clone, Copy)]
pub struct SyntheticProvider {
    bars: usize,
    seed: u64,
}

impl SyntheticProvider {
    pub fn new(bars: usize, seed: u64) -> Self {
        Self { bars, seed }
    }
}

impl RowProvider for SyntheticProvider {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn fetch(
        &self,
        symbol: &str,
        _start: NaiveDate,
        _end: NaiveDate,
    ) -> Result<RawTable, ProviderError> {
        Ok(random_walk(symbol, self.bars, self.seed))
    }
}
