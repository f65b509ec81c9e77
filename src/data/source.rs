//! History sources
//!
//! The pipeline does not fetch remote data itself. Anything that can hand
//! over an ascending daily series implements [`HistorySource`].

use super::types::{PricePoint, PriceSeries, DAY_MS};
use crate::error::{ForecastError, Result};
use log::{debug, info};
use rand::rngs::StdRng;
use rand::SeedableRng;
use ndarray_rand::rand_distr::{Distribution, Normal};
use std::f64::consts::PI;
use std::path::{Path, PathBuf};

/// Supplies the last `days` daily prices, ascending by timestamp
pub trait HistorySource {
    fn fetch(&self, days: usize) -> Result<PriceSeries>;

    /// Human readable source name for logs
    fn describe(&self) -> String;
}

/// Reads `timestamp,price` rows from a CSV file
#[derive(Debug, Clone)]
pub struct CsvHistory {
    path: PathBuf,
}

impl CsvHistory {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl HistorySource for CsvHistory {
    fn fetch(&self, days: usize) -> Result<PriceSeries> {
        let points = crate::utils::load_prices_csv(&self.path)?;
        if points.is_empty() {
            return Err(ForecastError::invalid(format!(
                "no price rows in {}",
                self.path.display()
            )));
        }
        let series = PriceSeries::new(points)?.tail(days);
        info!("Loaded {} daily prices from {}", series.len(), self.path.display());
        Ok(series)
    }

    fn describe(&self) -> String {
        format!("csv:{}", self.path.display())
    }
}

/// Synthetic daily prices: geometric random walk with a slow trend and a
/// monthly cycle. Used for demos and tests without network access.
#[derive(Debug, Clone)]
pub struct SyntheticHistory {
    pub start_price: f64,
    pub daily_volatility: f64,
    pub drift: f64,
    pub start_ms: i64,
    seed: u64,
}

impl SyntheticHistory {
    pub fn new(start_price: f64) -> Self {
        Self {
            start_price,
            daily_volatility: 0.02,
            drift: 0.0005,
            start_ms: 1_700_000_000_000,
            seed: 42,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_volatility(mut self, volatility: f64) -> Self {
        self.daily_volatility = volatility;
        self
    }
}

impl HistorySource for SyntheticHistory {
    fn fetch(&self, days: usize) -> Result<PriceSeries> {
        if days == 0 {
            return Err(ForecastError::invalid("requested an empty history"));
        }
        let noise = Normal::new(0.0, self.daily_volatility)
            .map_err(|e| ForecastError::invalid(format!("bad volatility: {}", e)))?;
        let mut rng = StdRng::seed_from_u64(self.seed);

        let mut price = self.start_price;
        let mut points = Vec::with_capacity(days);
        for i in 0..days {
            let cycle = 0.003 * (2.0 * PI * i as f64 / 30.0).sin();
            price *= 1.0 + self.drift + cycle + noise.sample(&mut rng);
            points.push(PricePoint::new(self.start_ms + i as i64 * DAY_MS, price));
        }
        debug!("Generated {} synthetic prices (seed {})", days, self.seed);
        PriceSeries::new(points)
    }

    fn describe(&self) -> String {
        format!("synthetic(start={}, seed={})", self.start_price, self.seed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::save_prices_csv;

    #[test]
    fn test_synthetic_is_reproducible() {
        let a = SyntheticHistory::new(100.0).with_seed(1).fetch(50).unwrap();
        let b = SyntheticHistory::new(100.0).with_seed(1).fetch(50).unwrap();
        assert_eq!(a.prices(), b.prices());
        assert!(a.prices().iter().all(|p| *p > 0.0));
    }

    #[test]
    fn test_synthetic_volatility() {
        let calm = SyntheticHistory::new(100.0).with_seed(1).fetch(30).unwrap();
        let wild = SyntheticHistory::new(100.0).with_seed(1).with_volatility(0.1).fetch(30).unwrap();
        assert_ne!(calm.prices(), wild.prices());
        assert!(SyntheticHistory::new(100.0).with_volatility(-1.0).fetch(5).is_err());
    }

    #[test]
    fn test_synthetic_rejects_zero_days() {
        assert!(SyntheticHistory::new(100.0).fetch(0).is_err());
    }

    #[test]
    fn test_csv_history_tail() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prices.csv");
        let series = PriceSeries::from_prices(0, &[1.0, 2.0, 3.0, 4.0]).unwrap();
        save_prices_csv(series.points(), &path).unwrap();

        let loaded = CsvHistory::new(&path).fetch(2).unwrap();
        assert_eq!(loaded.prices(), vec![3.0, 4.0]);
    }
}
