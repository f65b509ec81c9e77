//! # Crypto Forecast
//!
//! Next-day price forecasting with a stacked LSTM trained on a trailing
//! window of daily prices.
//!
//! ## Modules
//!
//! - `data` - Price points, CSV and synthetic histories
//! - `preprocessing` - Min-max normalization and sliding windows
//! - `model` - LSTM network, optimizers and the trainable forecaster
//! - `training` - Training runs, progress reporting and cancellation
//! - `forecast` - Next-day prediction and walk-forward backtesting
//! - `persistence` - Named on-disk model store
//! - `system` - Execution backend probe
//! - `utils` - Error metrics and file helpers
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use crypto_forecast::data::{HistorySource, SyntheticHistory};
//! use crypto_forecast::forecast::Backtester;
//! use crypto_forecast::model::ModelConfig;
//! use crypto_forecast::training::{NullSink, Trainer};
//!
//! fn main() -> anyhow::Result<()> {
//!     // 1. Price history
//!     let series = SyntheticHistory::new(30_000.0).with_seed(42).fetch(365)?;
//!
//!     // 2. Train on the whole series
//!     let trainer = Trainer::new(ModelConfig::new(7).with_epochs(20));
//!     let pipeline = trainer.train(&series.prices(), &mut NullSink)?;
//!
//!     // 3. Tomorrow's price and historical accuracy
//!     let tomorrow = pipeline.forecast_next()?;
//!     let report = Backtester::new(7).evaluate(&pipeline.model, series.points())?;
//!     println!("next: {:.2}, MAPE {:.2}%", tomorrow, report.metrics.mape);
//!     Ok(())
//! }
//! ```

pub mod data;
pub mod error;
pub mod forecast;
pub mod model;
pub mod persistence;
pub mod preprocessing;
pub mod system;
pub mod training;
pub mod utils;

// Re-exports for convenience
pub use data::{PricePoint, PriceSeries};
pub use error::{ForecastError, Result};
pub use forecast::{predict_next, BacktestReport, Backtester, EvaluationRecord};
pub use model::{Forecaster, ModelConfig, SequenceModel};
pub use persistence::ModelStore;
pub use preprocessing::{NormalizationParams, WindowDataset};
pub use training::{Trainer, TrainedPipeline};
pub use utils::Metrics;
