//! Domain types for Barsmith

pub mod bar;
pub mod series;

pub use bar::{BarTime, IndicatorSet, PriceBar, PriceField, PriceViolation, ViolationKind};
pub use series::Series;
