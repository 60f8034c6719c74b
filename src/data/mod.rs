//! Price data: types, file ingestion and daily/intraday splicing.

pub mod loader;
pub mod splice;
pub mod types;

pub use loader::{parse_timestamp, Granularity, LoaderError, PriceFileLoader, REQUIRED_COLUMNS};
pub use splice::{splice, splice_symbol};
pub use types::{PricePoint, PriceSeries, RawPriceData, RawPriceSource};
