//! Error types for the forecasting pipeline

use thiserror::Error;

/// Errors raised by the forecasting pipeline
///
/// Input, degenerate-data and model-state errors abort the operation that
/// raised them. Individual backtest step failures never surface here, they
/// are collected in [`crate::forecast::BacktestReport::failures`].
#[derive(Error, Debug)]
pub enum ForecastError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Degenerate data: series is constant at {value}, min-max range is zero")]
    DegenerateData { value: f64 },

    #[error("Model state error: {0}")]
    ModelState(String),

    #[error("Persistence failure: {0}")]
    Persistence(String),

    #[error("Serialization failed: {0}")]
    Serialization(String),

    #[error("Training cancelled after {epoch} completed epochs")]
    Cancelled { epoch: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl ForecastError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        ForecastError::InvalidInput(msg.into())
    }

    pub(crate) fn state(msg: impl Into<String>) -> Self {
        ForecastError::ModelState(msg.into())
    }

    /// True for errors raised before any training happened
    /// (bad input, constant series, out-of-order model calls)
    pub fn is_rejected_input(&self) -> bool {
        matches!(
            self,
            ForecastError::InvalidInput(_)
                | ForecastError::DegenerateData { .. }
                | ForecastError::ModelState(_)
        )
    }
}

impl From<bincode::Error> for ForecastError {
    fn from(err: bincode::Error) -> Self {
        ForecastError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for ForecastError {
    fn from(err: serde_json::Error) -> Self {
        ForecastError::Serialization(err.to_string())
    }
}

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, ForecastError>;
