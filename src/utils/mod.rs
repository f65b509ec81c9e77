//! Utility functions

mod io;
mod metrics;

pub use io::{ensure_dir, format_size, load_json, load_prices_csv, save_json, save_prices_csv, save_records_csv};
pub use metrics::{directional_accuracy, mae, mape, mse, rmse, Metrics};
