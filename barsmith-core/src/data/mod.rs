//! Provider tables and the per-series data stages that run before indicators.

pub mod fill;
pub mod table;
pub mod timezone;
pub mod validate;

pub use fill::fill_gaps;
pub use table::{Cell, RawTable, TableError};
pub use timezone::normalize_timezone;
pub use validate::validate;
