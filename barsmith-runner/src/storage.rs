//! Storage sinks for processed series.
//!
//! Sinks only accept fully UTC-normalized series; anything else would mix
//! wall-clock and absolute times in one file. Writes land in a `.tmp` file
//! first and are renamed into place, so a reader never sees half a file.

use barsmith_core::{BarTime, IndicatorSet, Series};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("refusing to store {symbol}: timestamps are not UTC-normalized")]
    NotUtc { symbol: String },

    #[error("refusing to store {symbol}: series is empty")]
    EmptySeries { symbol: String },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("parquet error: {0}")]
    Parquet(String),

    #[error("metadata error: {0}")]
    Meta(#[from] serde_json::Error),

    #[error("no stored data for symbol '{symbol}'")]
    NotFound { symbol: String },
}

impl StorageError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        StorageError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Destination for processed series.
pub trait SeriesSink: Send + Sync {
    fn name(&self) -> &str;

    /// Persist `series` under `symbol`. Returns the number of bars written.
    fn store(&self, symbol: &str, series: &Series) -> Result<usize, StorageError>;
}

/// Reject series a sink must never write.
pub(crate) fn check_storable(symbol: &str, series: &Series) -> Result<(), StorageError> {
    if series.is_empty() {
        return Err(StorageError::EmptySeries {
            symbol: symbol.to_string(),
        });
    }
    if !series.is_utc_normalized() {
        return Err(StorageError::NotUtc {
            symbol: symbol.to_string(),
        });
    }
    Ok(())
}

/// Write through `write` into `{path}.tmp`, then rename onto `path`.
pub(crate) fn write_atomic(
    path: &Path,
    write: impl FnOnce(fs::File) -> Result<(), StorageError>,
) -> Result<(), StorageError> {
    let mut tmp_name = path.as_os_str().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    let file = fs::File::create(&tmp_path).map_err(|e| StorageError::io(&tmp_path, e))?;
    if let Err(e) = write(file) {
        let _ = fs::remove_file(&tmp_path);
        return Err(e);
    }

    fs::rename(&tmp_path, path).map_err(|e| {
        let _ = fs::remove_file(&tmp_path);
        StorageError::io(path, e)
    })
}

/// Column names shared by every sink, in write order.
pub(crate) const BAR_COLUMNS: [&str; 7] = [
    "timestamp",
    "open",
    "high",
    "low",
    "close",
    "volume",
    "adjusted_close",
];

/// Writes `{dir}/{SYMBOL}.csv` with one row per bar.
///
/// Undefined cells, including indicator warm-up, are written empty.
#[derive(Debug, Clone)]
pub struct CsvSink {
    dir: PathBuf,
}

impl CsvSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, symbol: &str) -> PathBuf {
        self.dir.join(format!("{symbol}.csv"))
    }
}

impl SeriesSink for CsvSink {
    fn name(&self) -> &str {
        "csv"
    }

    fn store(&self, symbol: &str, series: &Series) -> Result<usize, StorageError> {
        check_storable(symbol, series)?;
        fs::create_dir_all(&self.dir).map_err(|e| StorageError::io(&self.dir, e))?;

        let path = self.path_for(symbol);
        write_atomic(&path, |file| {
            let mut wtr = csv::Writer::from_writer(file);
            wtr.write_record(BAR_COLUMNS.iter().chain(IndicatorSet::NAMES.iter()))?;
            for bar in &series.bars {
                let mut record = Vec::with_capacity(BAR_COLUMNS.len() + IndicatorSet::NAMES.len());
                record.push(utc_string(&bar.timestamp));
                record.extend(
                    [bar.open, bar.high, bar.low, bar.close]
                        .into_iter()
                        .map(opt_cell),
                );
                record.push(bar.volume.map(|v| v.to_string()).unwrap_or_default());
                record.push(opt_cell(bar.adjusted_close));
                record.extend(bar.indicators.values().into_iter().map(opt_cell));
                wtr.write_record(&record)?;
            }
            wtr.flush().map_err(|e| StorageError::io(&path, e))
        })?;

        debug!(symbol, bars = series.len(), path = %path.display(), "wrote csv");
        Ok(series.len())
    }
}

fn opt_cell(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn utc_string(timestamp: &BarTime) -> String {
    timestamp
        .instant()
        .to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}
