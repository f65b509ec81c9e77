//! Single-step forecast

use crate::error::{ForecastError, Result};
use crate::model::SequenceModel;
use crate::preprocessing::NormalizationParams;

/// Forecasts the value following `recent_raw`
///
/// The trailing `window_size` values are normalized with `params` (no
/// refit), fed to the model and the output is mapped back to price units.
/// Fewer than `window_size` values is an `InvalidInput` error.
pub fn predict_next<M: SequenceModel + ?Sized>(
    model: &M,
    recent_raw: &[f64],
    params: &NormalizationParams,
) -> Result<f64> {
    let window_size = model.window_size();
    if recent_raw.len() < window_size {
        return Err(ForecastError::invalid(format!(
            "need {} recent prices, got {}",
            window_size,
            recent_raw.len()
        )));
    }

    let window = &recent_raw[recent_raw.len() - window_size..];
    if let Some(bad) = window.iter().find(|v| !v.is_finite()) {
        return Err(ForecastError::invalid(format!("non-finite price {} in window", bad)));
    }

    let normalized: Vec<f64> = window.iter().map(|&v| params.transform(v)).collect();
    let raw = model.predict(&normalized)?;
    Ok(params.inverse(raw))
}
