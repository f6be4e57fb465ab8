//! Timezone normalization.
//!
//! A naive timestamp has no offset to convert from, so it is *localized*:
//! labelled UTC with the wall clock unchanged. A zoned timestamp is
//! *converted*: same instant, offset moved to zero.

use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};
use tracing::debug;

use crate::domain::{BarTime, Series};

/// Normalize every bar timestamp to UTC.
pub fn normalize_timezone(mut series: Series) -> Series {
    let mut localized = 0usize;
    let mut converted = 0usize;
    for bar in &mut series.bars {
        bar.timestamp = match bar.timestamp {
            BarTime::Naive(naive) => {
                localized += 1;
                BarTime::Zoned(localize_utc(naive))
            }
            BarTime::Zoned(dt) => {
                if dt.offset().local_minus_utc() != 0 {
                    converted += 1;
                }
                BarTime::Zoned(convert_utc(dt))
            }
        };
    }
    debug!(symbol = series.label(), localized, converted, "normalized timestamps");
    series
}

/// Label a naive wall-clock time as UTC.
pub fn localize_utc(naive: NaiveDateTime) -> DateTime<FixedOffset> {
    naive.and_utc().fixed_offset()
}

/// Move an offset-carrying time to UTC, keeping the instant.
pub fn convert_utc(dt: DateTime<FixedOffset>) -> DateTime<FixedOffset> {
    dt.with_timezone(&Utc).fixed_offset()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PriceBar;
    use crate::schema::Column;

    fn series_at(times: Vec<BarTime>) -> Series {
        Series::new(
            times.into_iter().map(PriceBar::empty).collect(),
            vec![Column::Timestamp],
        )
    }

    #[test]
    fn naive_is_localized_not_shifted() {
        let naive = NaiveDateTime::parse_from_str("2024-03-01 09:30:00", "%Y-%m-%d %H:%M:%S")
            .unwrap();
        let out = normalize_timezone(series_at(vec![BarTime::Naive(naive)]));
        let BarTime::Zoned(dt) = out.bars[0].timestamp else {
            panic!("expected zoned timestamp");
        };
        assert_eq!(dt.naive_local(), naive);
        assert_eq!(dt.offset().local_minus_utc(), 0);
    }

    #[test]
    fn zoned_is_converted_keeping_instant() {
        let dt = DateTime::parse_from_rfc3339("2024-03-01T09:30:00-05:00").unwrap();
        let out = normalize_timezone(series_at(vec![BarTime::Zoned(dt)]));
        let BarTime::Zoned(utc) = out.bars[0].timestamp else {
            panic!("expected zoned timestamp");
        };
        assert_eq!(utc.to_rfc3339(), "2024-03-01T14:30:00+00:00");
        assert_eq!(utc, dt);
    }

    #[test]
    fn mixed_series_fully_normalized() {
        let naive = NaiveDateTime::parse_from_str("2024-03-01 00:00:00", "%Y-%m-%d %H:%M:%S")
            .unwrap();
        let dt = DateTime::parse_from_rfc3339("2024-03-02T00:00:00+09:00").unwrap();
        let series = series_at(vec![BarTime::Naive(naive), BarTime::Zoned(dt)]);
        assert!(!series.is_utc_normalized());
        let out = normalize_timezone(series);
        assert!(out.is_utc_normalized());
    }

    #[test]
    fn normalizing_twice_is_stable() {
        let dt = DateTime::parse_from_rfc3339("2024-03-02T00:00:00+09:00").unwrap();
        let once = normalize_timezone(series_at(vec![BarTime::Zoned(dt)]));
        let twice = normalize_timezone(once.clone());
        assert_eq!(once, twice);
    }
}
