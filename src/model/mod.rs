//! # Recurrent forecasting model
//!
//! Stacked LSTM (50 then 30 units by default) followed by a single linear
//! unit, trained with MSE loss and Adam.
//!
//! ## Example
//!
//! ```rust,no_run
//! use crypto_forecast::model::{Forecaster, ModelConfig, SequenceModel};
//! use crypto_forecast::preprocessing::WindowDataset;
//! use crypto_forecast::training::NullSink;
//!
//! let values: Vec<f64> = (0..100).map(|i| i as f64 / 100.0).collect();
//! let dataset = WindowDataset::build(&values, 7);
//!
//! let mut model = Forecaster::new(ModelConfig::default());
//! model.create(7)?;
//! model.fit(&dataset, 50, 32, &mut NullSink)?;
//!
//! let next = model.predict(&values[93..])?;
//! # Ok::<(), crypto_forecast::ForecastError>(())
//! ```

mod config;
mod dense;
mod forecaster;
mod init;
mod lstm;
mod network;
mod optimizer;

pub use config::{ModelConfig, OptimizerKind, WeightInit};
pub use dense::{Dense, DenseGradients};
pub use forecaster::{Forecaster, ModelState, SequenceModel, TrainingHistory};
pub use lstm::{LstmCache, LstmGradients, LstmLayer};
pub use network::{mse_loss, ForwardCache, LstmNetwork, NetworkGradients};
pub use optimizer::{Adam, Optimizer, SGD};
