//! Parquet sink with Hive-style partitioning.
//!
//! Layout: `{dir}/symbol={SYMBOL}/bars.parquet` plus `meta.json`.
//!
//! Timestamps are stored as UTC milliseconds (`Datetime(ms)`, no zone).
//! Undefined prices and indicator warm-up stay null; nothing is written as
//! NaN. Each store replaces the symbol's previous file atomically.

use barsmith_core::schema::Column as BarColumn;
use barsmith_core::{BarTime, IndicatorSet, PriceBar, Series};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::storage::{check_storable, write_atomic, SeriesSink, StorageError, BAR_COLUMNS};

/// Metadata sidecar for a stored symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreMeta {
    pub symbol: String,
    pub first_timestamp: chrono::DateTime<chrono::Utc>,
    pub last_timestamp: chrono::DateTime<chrono::Utc>,
    pub bar_count: usize,
    /// BLAKE3 over the JSON encoding of the stored bars.
    pub data_hash: String,
    pub stored_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone)]
pub struct ParquetSink {
    dir: PathBuf,
}

impl ParquetSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `{dir}/symbol={SYMBOL}/`
    fn symbol_dir(&self, symbol: &str) -> PathBuf {
        self.dir.join(format!("symbol={symbol}"))
    }

    pub fn data_path(&self, symbol: &str) -> PathBuf {
        self.symbol_dir(symbol).join("bars.parquet")
    }

    fn meta_path(&self, symbol: &str) -> PathBuf {
        self.symbol_dir(symbol).join("meta.json")
    }

    /// Read a stored symbol back as a UTC series.
    pub fn load(&self, symbol: &str) -> Result<Series, StorageError> {
        let path = self.data_path(symbol);
        if !path.exists() {
            return Err(StorageError::NotFound {
                symbol: symbol.to_string(),
            });
        }
        let file = fs::File::open(&path).map_err(|e| StorageError::io(&path, e))?;
        let df = ParquetReader::new(file)
            .finish()
            .map_err(|e| StorageError::Parquet(format!("read {}: {e}", path.display())))?;
        Ok(dataframe_to_series(&df)?.with_symbol(symbol))
    }

    /// The sidecar for `symbol`, if one was written.
    pub fn read_meta(&self, symbol: &str) -> Result<StoreMeta, StorageError> {
        let path = self.meta_path(symbol);
        let content = fs::read_to_string(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StorageError::NotFound {
                    symbol: symbol.to_string(),
                }
            } else {
                StorageError::io(&path, e)
            }
        })?;
        Ok(serde_json::from_str(&content)?)
    }
}

impl SeriesSink for ParquetSink {
    fn name(&self) -> &str {
        "parquet"
    }

    fn store(&self, symbol: &str, series: &Series) -> Result<usize, StorageError> {
        check_storable(symbol, series)?;

        let sym_dir = self.symbol_dir(symbol);
        fs::create_dir_all(&sym_dir).map_err(|e| StorageError::io(&sym_dir, e))?;

        let mut df = series_to_dataframe(series)?;
        let path = self.data_path(symbol);
        write_atomic(&path, |file| {
            ParquetWriter::new(file)
                .finish(&mut df)
                .map(|_| ())
                .map_err(|e| StorageError::Parquet(format!("write parquet: {e}")))
        })?;

        let meta = build_meta(symbol, series)?;
        let meta_json = serde_json::to_string_pretty(&meta)?;
        let meta_path = self.meta_path(symbol);
        write_atomic(&meta_path, |mut file| {
            use std::io::Write;
            file.write_all(meta_json.as_bytes())
                .map_err(|e| StorageError::io(&meta_path, e))
        })?;

        debug!(symbol, bars = series.len(), path = %path.display(), "wrote parquet");
        Ok(series.len())
    }
}

fn build_meta(symbol: &str, series: &Series) -> Result<StoreMeta, StorageError> {
    let (Some(first), Some(last)) = (series.bars.first(), series.bars.last()) else {
        return Err(StorageError::EmptySeries {
            symbol: symbol.to_string(),
        });
    };
    Ok(StoreMeta {
        symbol: symbol.to_string(),
        first_timestamp: first.timestamp.instant(),
        last_timestamp: last.timestamp.instant(),
        bar_count: series.len(),
        data_hash: blake3::hash(&serde_json::to_vec(&series.bars)?)
            .to_hex()
            .to_string(),
        stored_at: chrono::Utc::now(),
    })
}

// ── Parquet I/O helpers ─────────────────────────────────────────────

fn polars_err(context: &str) -> impl Fn(PolarsError) -> StorageError + '_ {
    move |e| StorageError::Parquet(format!("{context}: {e}"))
}

fn series_to_dataframe(series: &Series) -> Result<DataFrame, StorageError> {
    let bars = &series.bars;
    let prices = |f: fn(&PriceBar) -> Option<f64>| -> Vec<Option<f64>> {
        bars.iter().map(f).collect()
    };

    let timestamps: Vec<i64> = bars.iter().map(|b| b.timestamp.timestamp_millis()).collect();
    let volumes: Vec<Option<u64>> = bars.iter().map(|b| b.volume).collect();

    let mut columns = vec![
        Column::new(BAR_COLUMNS[0].into(), timestamps)
            .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))
            .map_err(polars_err("timestamp cast"))?,
        Column::new(BAR_COLUMNS[1].into(), prices(|b| b.open)),
        Column::new(BAR_COLUMNS[2].into(), prices(|b| b.high)),
        Column::new(BAR_COLUMNS[3].into(), prices(|b| b.low)),
        Column::new(BAR_COLUMNS[4].into(), prices(|b| b.close)),
        Column::new(BAR_COLUMNS[5].into(), volumes),
        Column::new(BAR_COLUMNS[6].into(), prices(|b| b.adjusted_close)),
    ];

    let indicator_rows: Vec<[Option<f64>; 10]> =
        bars.iter().map(|b| b.indicators.values()).collect();
    for (idx, name) in IndicatorSet::NAMES.iter().enumerate() {
        let values: Vec<Option<f64>> = indicator_rows.iter().map(|row| row[idx]).collect();
        columns.push(Column::new((*name).into(), values));
    }

    DataFrame::new(columns).map_err(polars_err("dataframe creation"))
}

fn dataframe_to_series(df: &DataFrame) -> Result<Series, StorageError> {
    for name in BAR_COLUMNS.iter().chain(IndicatorSet::NAMES.iter()) {
        if df.column(*name).is_err() {
            return Err(StorageError::Parquet(format!("missing column '{name}'")));
        }
    }

    let ts = df
        .column("timestamp")
        .and_then(|c| c.cast(&DataType::Int64))
        .map_err(polars_err("timestamp column"))?;
    let ts_ca = ts.i64().map_err(polars_err("timestamp column type"))?;

    let f64_col = |name: &str| -> Result<Vec<Option<f64>>, StorageError> {
        let ca = df
            .column(name)
            .and_then(|c| c.f64())
            .map_err(polars_err(name))?;
        Ok(ca.into_iter().collect())
    };
    let opens = f64_col("open")?;
    let highs = f64_col("high")?;
    let lows = f64_col("low")?;
    let closes = f64_col("close")?;
    let adj_closes = f64_col("adjusted_close")?;
    let volumes: Vec<Option<u64>> = df
        .column("volume")
        .and_then(|c| c.u64())
        .map_err(polars_err("volume"))?
        .into_iter()
        .collect();
    let indicators = IndicatorSet::NAMES
        .iter()
        .map(|name| f64_col(*name))
        .collect::<Result<Vec<_>, _>>()?;

    let mut bars = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let millis = ts_ca
            .get(i)
            .ok_or_else(|| StorageError::Parquet(format!("null timestamp at row {i}")))?;
        let instant = chrono::DateTime::from_timestamp_millis(millis)
            .ok_or_else(|| StorageError::Parquet(format!("timestamp out of range at row {i}")))?;

        let ind = |k: usize| indicators[k][i];
        bars.push(PriceBar {
            timestamp: BarTime::Zoned(instant.fixed_offset()),
            open: opens[i],
            high: highs[i],
            low: lows[i],
            close: closes[i],
            volume: volumes[i],
            adjusted_close: adj_closes[i],
            indicators: IndicatorSet {
                sma_20: ind(0),
                sma_50: ind(1),
                sma_200: ind(2),
                rsi_14: ind(3),
                macd: ind(4),
                macd_signal: ind(5),
                macd_histogram: ind(6),
                bollinger_upper: ind(7),
                bollinger_middle: ind(8),
                bollinger_lower: ind(9),
            },
        });
    }

    Ok(Series::new(
        bars,
        vec![
            BarColumn::Timestamp,
            BarColumn::Open,
            BarColumn::High,
            BarColumn::Low,
            BarColumn::Close,
            BarColumn::Volume,
            BarColumn::AdjustedClose,
        ],
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use barsmith_core::synthetic::random_walk;
    use barsmith_core::{Pipeline, PipelineConfig};

    fn processed(bars: usize) -> Series {
        Pipeline::new(PipelineConfig::default())
            .unwrap()
            .process_symbol("SPY", &random_walk("SPY", bars, 3))
            .unwrap()
            .series
    }

    #[test]
    fn store_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let sink = ParquetSink::new(dir.path());
        let series = processed(60);

        assert_eq!(sink.store("SPY", &series).unwrap(), 60);
        assert!(dir.path().join("symbol=SPY").join("bars.parquet").exists());

        let loaded = sink.load("SPY").unwrap();
        assert_eq!(loaded.len(), 60);
        assert_eq!(loaded.symbol.as_deref(), Some("SPY"));
        assert!(loaded.is_utc_normalized());
        assert_eq!(loaded.bars, series.bars);
    }

    #[test]
    fn indicator_warmup_stays_null() {
        let dir = tempfile::tempdir().unwrap();
        let sink = ParquetSink::new(dir.path());
        sink.store("SPY", &processed(30)).unwrap();

        let loaded = sink.load("SPY").unwrap();
        assert!(loaded.bars[18].indicators.sma_20.is_none());
        assert!(loaded.bars[19].indicators.sma_20.is_some());
        assert!(loaded.bars.iter().all(|b| b.indicators.sma_200.is_none()));
    }

    #[test]
    fn meta_sidecar_describes_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let sink = ParquetSink::new(dir.path());
        let series = processed(10);
        sink.store("SPY", &series).unwrap();

        let meta = sink.read_meta("SPY").unwrap();
        assert_eq!(meta.symbol, "SPY");
        assert_eq!(meta.bar_count, 10);
        assert_eq!(meta.first_timestamp, series.bars[0].timestamp.instant());
        assert_eq!(meta.last_timestamp, series.bars[9].timestamp.instant());
        assert_eq!(meta.data_hash.len(), 64);

        // Same bars, same hash.
        sink.store("SPY", &series).unwrap();
        assert_eq!(sink.read_meta("SPY").unwrap().data_hash, meta.data_hash);
    }

    #[test]
    fn load_unknown_symbol_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let sink = ParquetSink::new(dir.path());
        assert!(matches!(
            sink.load("QQQ"),
            Err(StorageError::NotFound { .. })
        ));
        assert!(matches!(
            sink.read_meta("QQQ"),
            Err(StorageError::NotFound { .. })
        ));
    }

    #[test]
    fn refuses_naive_series() {
        let dir = tempfile::tempdir().unwrap();
        let sink = ParquetSink::new(dir.path());
        let naive = barsmith_core::validate(
            &random_walk("SPY", 5, 3),
            &barsmith_core::ValidationConfig::default(),
        )
        .unwrap();
        assert!(matches!(
            sink.store("SPY", &naive),
            Err(StorageError::NotUtc { .. })
        ));
        assert!(!sink.data_path("SPY").exists());
    }
}
