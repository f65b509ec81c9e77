//! # Training
//!
//! End-to-end training from raw prices plus the progress and cancellation
//! plumbing shared with [`crate::model::Forecaster::fit`].
//!
//! ```rust,no_run
//! use crypto_forecast::model::ModelConfig;
//! use crypto_forecast::training::Trainer;
//!
//! let prices: Vec<f64> = (0..365).map(|i| 30_000.0 + i as f64 * 25.0).collect();
//! let handle = Trainer::new(ModelConfig::default()).spawn(prices);
//! for progress in handle.progress() {
//!     println!("epoch {} loss {:.6}", progress.epoch + 1, progress.loss);
//! }
//! let trained = handle.join()?;
//! # Ok::<(), crypto_forecast::ForecastError>(())
//! ```

mod progress;
mod trainer;

pub use progress::{
    Cancellable, CancellationToken, ChannelSink, EpochProgress, NullSink, ProgressSink, RecordingSink,
};
pub use trainer::{TrainedPipeline, Trainer, TrainingHandle};
