//! Property tests for processing invariants.
//!
//! Uses proptest to verify:
//! 1. Gap filling is idempotent
//! 2. A single interior gap is filled from its predecessor and nothing else moves
//! 3. RSI stays within [0, 100]
//! 4. SMA equals the plain mean of its window
//! 5. Validation never panics on arbitrary cells

use proptest::prelude::*;

use barsmith_core::indicators::{Indicator, Rsi, Sma};
use barsmith_core::{fill_gaps, validate, Cell, RawTable, Series, ValidationConfig};

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_price() -> impl Strategy<Value = f64> {
    (1.0..500.0_f64).prop_map(|p| (p * 100.0).round() / 100.0)
}

fn arb_gappy_prices(max_len: usize) -> impl Strategy<Value = Vec<Option<f64>>> {
    prop::collection::vec(prop::option::weighted(0.8, arb_price()), 1..max_len)
}

fn arb_cell() -> impl Strategy<Value = Cell> {
    prop_oneof![
        Just(Cell::Null),
        any::<i64>().prop_map(Cell::Int),
        any::<f64>().prop_map(Cell::Float),
        "[0-9a-zA-Z .:+-]{0,25}".prop_map(Cell::Text),
    ]
}

fn series_from(closes: &[Option<f64>], volumes: &[Option<u64>]) -> Series {
    let headers = ["timestamp", "open", "high", "low", "close", "volume"];
    let base = chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    let rows = closes
        .iter()
        .zip(volumes)
        .enumerate()
        .map(|(i, (&c, &v))| {
            let date = base + chrono::Duration::days(i as i64);
            vec![
                Cell::from(date.format("%Y-%m-%d").to_string()),
                Cell::from(c),
                Cell::from(c),
                Cell::from(c),
                Cell::from(c),
                Cell::from(v.map(|v| v as i64)),
            ]
        })
        .collect();
    validate(
        &RawTable::new(headers).with_rows(rows),
        &ValidationConfig::default(),
    )
    .unwrap()
}

// ── 1. Idempotence ───────────────────────────────────────────────────

proptest! {
    #[test]
    fn fill_gaps_is_idempotent(
        closes in arb_gappy_prices(60),
        gap_every in 2usize..7,
    ) {
        let volumes: Vec<Option<u64>> = (0..closes.len())
            .map(|i| if i % gap_every == 0 { None } else { Some(i as u64) })
            .collect();
        let once = fill_gaps(series_from(&closes, &volumes));
        let twice = fill_gaps(once.clone());
        prop_assert_eq!(once, twice);
    }

    // ── 2. Single-gap forward fill ───────────────────────────────────

    #[test]
    fn single_gap_takes_previous_close(
        closes in prop::collection::vec(arb_price(), 2..40),
        pick in any::<prop::sample::Index>(),
    ) {
        let gap = 1 + pick.index(closes.len() - 1);
        let mut gappy: Vec<Option<f64>> = closes.iter().copied().map(Some).collect();
        gappy[gap] = None;
        let volumes = vec![Some(5); closes.len()];

        let filled = fill_gaps(series_from(&gappy, &volumes));
        prop_assert_eq!(filled.bars[gap].close, Some(closes[gap - 1]));
        for (i, bar) in filled.bars.iter().enumerate() {
            if i != gap {
                prop_assert_eq!(bar.close, Some(closes[i]));
            }
            prop_assert_eq!(bar.volume, Some(5));
        }
    }

    // ── 3. RSI bounds ────────────────────────────────────────────────

    #[test]
    fn rsi_within_bounds(closes in arb_gappy_prices(120)) {
        for (i, v) in Rsi::new(14).compute(&closes).into_iter().enumerate() {
            if let Some(v) = v {
                prop_assert!((0.0..=100.0).contains(&v), "RSI {} at bar {}", v, i);
            }
        }
    }

    // ── 4. SMA definition ────────────────────────────────────────────

    #[test]
    fn sma_is_window_mean(
        closes in prop::collection::vec(arb_price(), 1..80),
        period in 1usize..25,
    ) {
        let input: Vec<Option<f64>> = closes.iter().copied().map(Some).collect();
        let result = Sma::new(period).compute(&input);
        prop_assert_eq!(result.len(), closes.len());
        for (i, v) in result.iter().enumerate() {
            if i + 1 < period {
                prop_assert!(v.is_none());
            } else {
                let mean = closes[i + 1 - period..=i].iter().sum::<f64>() / period as f64;
                prop_assert!((v.unwrap() - mean).abs() < 1e-9);
            }
        }
    }

    // ── 5. Validation is total ───────────────────────────────────────

    #[test]
    fn validate_never_panics(rows in prop::collection::vec(
        prop::collection::vec(arb_cell(), 6),
        0..20,
    )) {
        let table = RawTable::new(["Date", "Open", "High", "Low", "Close", "Volume"])
            .with_rows(rows);
        let _ = validate(&table, &ValidationConfig::default());
    }
}
