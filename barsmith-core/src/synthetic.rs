//! Deterministic synthetic provider tables.
//!
//! A master seed is expanded into a per-symbol seed with BLAKE3, so each
//! symbol's walk depends only on `(seed, symbol)` and never on the order in
//! which symbols are generated.

use chrono::{Duration, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::data::{Cell, RawTable};

/// Provider-style headers, as a chart API would send them.
pub const HEADERS: [&str; 7] = ["Date", "Open", "High", "Low", "Close", "Volume", "Adj Close"];

/// Derive the seed for one symbol from a master seed.
pub fn symbol_seed(seed: u64, symbol: &str) -> u64 {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&seed.to_le_bytes());
    hasher.update(symbol.as_bytes());
    let hash = hasher.finalize();
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&hash.as_bytes()[..8]);
    u64::from_le_bytes(bytes)
}

/// A geometric random walk of daily bars starting 2020-01-02.
///
/// Every row satisfies `low <= open, close <= high`. Dates skip weekends.
pub fn random_walk(symbol: &str, bars: usize, seed: u64) -> RawTable {
    let mut rng = StdRng::seed_from_u64(symbol_seed(seed, symbol));
    let mut date = NaiveDate::from_ymd_opt(2020, 1, 2).unwrap_or(NaiveDate::MIN);
    let mut close: f64 = rng.gen_range(20.0..500.0);

    let mut table = RawTable::new(HEADERS);
    for _ in 0..bars {
        let open = close;
        let ret: f64 = rng.gen_range(-0.03..0.03_f64) + 0.0003;
        close = (open * ret.exp()).max(0.01);
        let high = open.max(close) * (1.0 + rng.gen_range(0.0..0.01_f64));
        let low = open.min(close) * (1.0 - rng.gen_range(0.0..0.01_f64));
        let volume: i64 = rng.gen_range(100_000..5_000_000);

        table.push_row(vec![
            Cell::from(date.format("%Y-%m-%d").to_string()),
            Cell::Float(round_cents(open)),
            Cell::Float(round_cents(high)),
            Cell::Float(round_cents(low)),
            Cell::Float(round_cents(close)),
            Cell::Int(volume),
            Cell::Float(round_cents(close)),
        ]);

        date = next_weekday(date);
    }
    table
}

fn round_cents(price: f64) -> f64 {
    (price * 100.0).round() / 100.0
}

fn next_weekday(date: NaiveDate) -> NaiveDate {
    use chrono::Datelike;
    let mut next = date + Duration::days(1);
    while next.weekday().number_from_monday() > 5 {
        next += Duration::days(1);
    }
    next
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ValidationConfig;
    use crate::data::validate;

    #[test]
    fn same_seed_same_table() {
        assert_eq!(random_walk("SPY", 50, 42), random_walk("SPY", 50, 42));
    }

    #[test]
    fn symbols_get_independent_walks() {
        assert_ne!(random_walk("SPY", 50, 42), random_walk("QQQ", 50, 42));
        assert_ne!(symbol_seed(42, "SPY"), symbol_seed(43, "SPY"));
    }

    #[test]
    fn walk_validates_without_violations() {
        let table = random_walk("SPY", 300, 7);
        assert_eq!(table.len(), 300);
        let series = validate(&table, &ValidationConfig::default()).unwrap();
        assert!(series.violations.is_empty());
        assert!(series.has_column(crate::schema::Column::AdjustedClose));
    }

    #[test]
    fn skips_weekends() {
        // 2020-01-03 is a Friday.
        let friday = NaiveDate::from_ymd_opt(2020, 1, 3).unwrap();
        assert_eq!(
            next_weekday(friday),
            NaiveDate::from_ymd_opt(2020, 1, 6).unwrap()
        );
    }
}
