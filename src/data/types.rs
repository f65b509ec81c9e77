//! Price point and validated price series

use crate::error::{ForecastError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One day in milliseconds
pub const DAY_MS: i64 = 86_400_000;

/// Single observed price
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    /// Unix timestamp in milliseconds
    pub timestamp: i64,
    /// Price in quote currency (USD)
    pub price: f64,
}

impl PricePoint {
    pub fn new(timestamp: i64, price: f64) -> Self {
        Self { timestamp, price }
    }

    /// Returns the timestamp as DateTime
    pub fn datetime(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.timestamp).unwrap_or_default()
    }

    /// Percent change relative to an earlier point
    pub fn change_pct_from(&self, earlier: &PricePoint) -> f64 {
        if earlier.price == 0.0 {
            0.0
        } else {
            (self.price - earlier.price) / earlier.price * 100.0
        }
    }
}

/// Price history ordered by ascending timestamp with no duplicates
///
/// Spacing between timestamps is not checked, the pipeline only consumes
/// the ordered price values.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PriceSeries {
    points: Vec<PricePoint>,
}

impl PriceSeries {
    /// Validates ordering and finiteness of the supplied points
    pub fn new(points: Vec<PricePoint>) -> Result<Self> {
        for (i, point) in points.iter().enumerate() {
            if !point.price.is_finite() {
                return Err(ForecastError::invalid(format!(
                    "non-finite price {} at index {}",
                    point.price, i
                )));
            }
            if i > 0 && point.timestamp <= points[i - 1].timestamp {
                return Err(ForecastError::invalid(format!(
                    "timestamps must be strictly ascending, index {} has {} after {}",
                    i,
                    point.timestamp,
                    points[i - 1].timestamp
                )));
            }
        }
        Ok(Self { points })
    }

    /// Builds a daily series from bare prices, starting at `start_ms`
    pub fn from_prices(start_ms: i64, prices: &[f64]) -> Result<Self> {
        let points = prices
            .iter()
            .enumerate()
            .map(|(i, &price)| PricePoint::new(start_ms + i as i64 * DAY_MS, price))
            .collect();
        Self::new(points)
    }

    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    pub fn prices(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.price).collect()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn last(&self) -> Option<&PricePoint> {
        self.points.last()
    }

    /// Keeps only the most recent `n` points
    pub fn tail(&self, n: usize) -> PriceSeries {
        let start = self.points.len().saturating_sub(n);
        PriceSeries {
            points: self.points[start..].to_vec(),
        }
    }

    /// Lowest and highest price, `None` for an empty series
    pub fn price_range(&self) -> Option<(f64, f64)> {
        if self.points.is_empty() {
            return None;
        }
        let min = self.points.iter().map(|p| p.price).fold(f64::INFINITY, f64::min);
        let max = self.points.iter().map(|p| p.price).fold(f64::NEG_INFINITY, f64::max);
        Some((min, max))
    }
}

impl AsRef<[PricePoint]> for PriceSeries {
    fn as_ref(&self) -> &[PricePoint] {
        &self.points
    }
}
