//! # Forecasting and evaluation
//!
//! - [`predict_next`]: one-step forecast in price units
//! - [`Backtester`]: walk-forward evaluation over history

mod backtest;
mod predictor;

pub use backtest::{evaluate, BacktestReport, Backtester, EvaluationRecord, NormalizationMode, StepFailure};
pub use predictor::predict_next;
