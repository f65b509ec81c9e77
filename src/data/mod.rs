//! # Price history
//!
//! Daily price points and the sources that supply them.
//!
//! ```rust
//! use crypto_forecast::data::{HistorySource, SyntheticHistory};
//!
//! let history = SyntheticHistory::new(30_000.0).with_seed(7).fetch(365).unwrap();
//! assert_eq!(history.len(), 365);
//! ```

mod source;
mod types;

pub use source::{CsvHistory, HistorySource, SyntheticHistory};
pub use types::{PricePoint, PriceSeries, DAY_MS};
