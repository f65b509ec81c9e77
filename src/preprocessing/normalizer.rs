//! Min-max normalization

use crate::error::{ForecastError, Result};
use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// Bounds fitted from one series
///
/// Returned by [`NormalizationParams::fit`] and passed explicitly to
/// everything that needs to map values into or out of normalized space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizationParams {
    pub min: f64,
    pub max: f64,
}

impl NormalizationParams {
    /// Fits the bounds of `values`
    ///
    /// Fails with `InvalidInput` on an empty or non-finite series and with
    /// `DegenerateData` when every value is equal.
    pub fn fit(values: &[f64]) -> Result<Self> {
        if values.is_empty() {
            return Err(ForecastError::invalid("cannot normalize an empty series"));
        }
        if let Some(bad) = values.iter().find(|v| !v.is_finite()) {
            return Err(ForecastError::invalid(format!(
                "cannot normalize non-finite value {}",
                bad
            )));
        }

        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        if max == min {
            return Err(ForecastError::DegenerateData { value: min });
        }

        Ok(Self { min, max })
    }

    /// Fits the bounds and returns the normalized series
    pub fn fit_transform(values: &[f64]) -> Result<(Self, Array1<f64>)> {
        let params = Self::fit(values)?;
        let normalized = params.transform_all(values);
        Ok((params, normalized))
    }

    /// Bounds of width one starting at `value`
    ///
    /// Normalizing a constant series with these bounds maps every value to
    /// zero and back without loss.
    pub fn unit_range(value: f64) -> Self {
        Self {
            min: value,
            max: value + 1.0,
        }
    }

    pub fn range(&self) -> f64 {
        self.max - self.min
    }

    pub fn transform(&self, value: f64) -> f64 {
        (value - self.min) / self.range()
    }

    pub fn transform_all(&self, values: &[f64]) -> Array1<f64> {
        values.iter().map(|&v| self.transform(v)).collect()
    }

    pub fn inverse(&self, normalized: f64) -> f64 {
        normalized * self.range() + self.min
    }
}

/// Stateful normalizer that remembers the most recent fit
///
/// Every `fit_transform` overwrites the stored bounds, so `inverse` always
/// maps back with the bounds of the last fitted series.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MinMaxNormalizer {
    params: Option<NormalizationParams>,
}

impl MinMaxNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fit_transform(&mut self, values: &[f64]) -> Result<Array1<f64>> {
        let (params, normalized) = NormalizationParams::fit_transform(values)?;
        self.params = Some(params);
        Ok(normalized)
    }

    pub fn inverse(&self, normalized: f64) -> Result<f64> {
        self.params
            .map(|p| p.inverse(normalized))
            .ok_or_else(|| ForecastError::state("normalizer has not been fitted"))
    }

    pub fn params(&self) -> Option<NormalizationParams> {
        self.params
    }
}
