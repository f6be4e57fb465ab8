//! Missing-value policy.
//!
//! Prices carry the last known value forward; a leading gap stays missing
//! because there is nothing before it to carry. A missing volume means no
//! trades were reported and becomes `0`.

use tracing::debug;

use crate::domain::{PriceField, Series};

/// Fill gaps in place of a fresh series. Applying it twice changes nothing.
pub fn fill_gaps(mut series: Series) -> Series {
    let mut filled_prices = 0usize;
    for field in PriceField::ALL {
        let mut last: Option<f64> = None;
        for bar in &mut series.bars {
            let cell = bar.price_mut(field);
            match *cell {
                Some(value) => last = Some(value),
                None if last.is_some() => {
                    *cell = last;
                    filled_prices += 1;
                }
                None => {}
            }
        }
    }

    let mut filled_volume = 0usize;
    for bar in &mut series.bars {
        if bar.volume.is_none() {
            bar.volume = Some(0);
            filled_volume += 1;
        }
    }

    debug!(
        symbol = series.label(),
        filled_prices, filled_volume, "filled gaps"
    );
    series
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BarTime, PriceBar};
    use crate::schema::Column;
    use chrono::NaiveDate;

    fn series_of(closes: &[Option<f64>], volumes: &[Option<u64>]) -> Series {
        let base = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let bars = closes
            .iter()
            .zip(volumes)
            .enumerate()
            .map(|(i, (&close, &volume))| PriceBar {
                open: close,
                high: close,
                low: close,
                close,
                volume,
                ..PriceBar::empty(BarTime::Naive(base + chrono::Duration::days(i as i64)))
            })
            .collect();
        Series::new(bars, vec![Column::Timestamp, Column::Close, Column::Volume])
    }

    #[test]
    fn forward_fills_interior_gap() {
        let series = series_of(&[Some(1.0), None, Some(3.0)], &[Some(1), Some(1), Some(1)]);
        let filled = fill_gaps(series);
        assert_eq!(filled.closes(), vec![Some(1.0), Some(1.0), Some(3.0)]);
    }

    #[test]
    fn leading_gap_stays_missing() {
        let series = series_of(&[None, None, Some(3.0), None], &[Some(1); 4]);
        let filled = fill_gaps(series);
        assert_eq!(filled.closes(), vec![None, None, Some(3.0), Some(3.0)]);
    }

    #[test]
    fn missing_volume_becomes_zero() {
        let series = series_of(&[Some(1.0), Some(2.0)], &[None, Some(7)]);
        let filled = fill_gaps(series);
        assert_eq!(filled.bars[0].volume, Some(0));
        assert_eq!(filled.bars[1].volume, Some(7));
    }

    #[test]
    fn adjusted_close_untouched() {
        let mut series = series_of(&[Some(1.0), Some(2.0)], &[Some(1), Some(1)]);
        series.bars[0].adjusted_close = Some(0.9);
        let filled = fill_gaps(series);
        assert_eq!(filled.bars[1].adjusted_close, None);
    }

    #[test]
    fn idempotent() {
        let series = series_of(&[None, Some(2.0), None, None, Some(5.0)], &[None; 5]);
        let once = fill_gaps(series);
        let twice = fill_gaps(once.clone());
        assert_eq!(once, twice);
    }
}
