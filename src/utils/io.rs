//! I/O Utilities
//!
//! CSV price histories, backtest exports and JSON config files.

use crate::data::PricePoint;
use crate::error::{ForecastError, Result};
use crate::forecast::EvaluationRecord;
use chrono::{TimeZone, Utc};
use csv::{Reader, Writer};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::Path;

/// Save price points to a `timestamp,price` CSV file
pub fn save_prices_csv<P: AsRef<Path>>(points: &[PricePoint], path: P) -> Result<()> {
    let mut writer = Writer::from_path(path)?;
    writer.write_record(["timestamp", "price"])?;

    for point in points {
        writer.write_record(&[point.timestamp.to_string(), point.price.to_string()])?;
    }

    writer.flush()?;
    Ok(())
}

/// Load price points from a CSV file with `timestamp` and `price` columns
///
/// Column order does not matter. Unparseable rows are errors, not zeros.
pub fn load_prices_csv<P: AsRef<Path>>(path: P) -> Result<Vec<PricePoint>> {
    let mut reader = Reader::from_path(path)?;
    let headers = reader.headers()?.clone();
    let column = |name: &str| {
        headers
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case(name))
            .ok_or_else(|| ForecastError::invalid(format!("missing '{}' column", name)))
    };
    let ts_col = column("timestamp")?;
    let price_col = column("price")?;

    let mut points = Vec::new();
    for (row, result) in reader.records().enumerate() {
        let record = result?;
        let field = |col: usize| record.get(col).map(str::trim).unwrap_or("");

        let timestamp = field(ts_col)
            .parse::<i64>()
            .map_err(|e| ForecastError::invalid(format!("row {}: bad timestamp: {}", row + 1, e)))?;
        let price = field(price_col)
            .parse::<f64>()
            .map_err(|e| ForecastError::invalid(format!("row {}: bad price: {}", row + 1, e)))?;
        points.push(PricePoint::new(timestamp, price));
    }

    Ok(points)
}

/// Export backtest records with a readable date column
pub fn save_records_csv<P: AsRef<Path>>(records: &[EvaluationRecord], path: P) -> Result<()> {
    let mut writer = Writer::from_path(path)?;
    writer.write_record(["date", "timestamp", "predicted", "actual", "error_pct"])?;

    for record in records {
        let date = Utc
            .timestamp_millis_opt(record.timestamp)
            .single()
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_default();
        writer.write_record(&[
            date,
            record.timestamp.to_string(),
            format!("{:.2}", record.predicted),
            format!("{:.2}", record.actual),
            format!("{:.4}", record.error_pct),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

/// Save any serializable data to JSON
pub fn save_json<T: Serialize, P: AsRef<Path>>(data: &T, path: P) -> Result<()> {
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, data)?;
    Ok(())
}

/// Load data from JSON
pub fn load_json<T: for<'de> Deserialize<'de>, P: AsRef<Path>>(path: P) -> Result<T> {
    let file = File::open(path)?;
    let data = serde_json::from_reader(file)?;
    Ok(data)
}

/// Create directory if it doesn't exist
pub fn ensure_dir<P: AsRef<Path>>(path: P) -> Result<()> {
    if !path.as_ref().exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}

/// Format file size for display
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;

    if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}
