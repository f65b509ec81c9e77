//! # Preprocessing
//!
//! Preparing a price series for the recurrent network:
//! - Min-max normalization to [0, 1]
//! - Sliding windows of `window_size` values with the next value as target
//! - Chronological validation split
//!
//! ## Example
//!
//! ```rust
//! use crypto_forecast::preprocessing::{NormalizationParams, WindowDataset};
//!
//! let prices = [10.0, 11.0, 12.0, 13.0, 14.0, 15.0, 16.0, 17.0];
//! let (params, normalized) = NormalizationParams::fit_transform(&prices).unwrap();
//! let dataset = WindowDataset::build(normalized.as_slice().unwrap(), 7);
//!
//! assert_eq!(dataset.len(), 1);
//! assert_eq!(params.inverse(dataset.target(0)), 17.0);
//! ```

mod normalizer;
mod windows;

pub use normalizer::{MinMaxNormalizer, NormalizationParams};
pub use windows::WindowDataset;
