//! Forecast error metrics

use crate::forecast::EvaluationRecord;
use serde::{Deserialize, Serialize};

/// Aggregate errors over a set of evaluation records
///
/// All values are NaN when computed over zero records; check `count`
/// before trusting them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    /// Mean absolute percentage error, in percent
    pub mape: f64,
    /// Root mean squared error, in price units
    pub rmse: f64,
    /// Mean absolute error, in price units
    pub mae: f64,
    /// Share of steps where the predicted move had the right sign
    pub directional_accuracy: f64,
    /// Number of records the metrics were computed over
    pub count: usize,
}

impl Metrics {
    pub fn from_records(records: &[EvaluationRecord]) -> Self {
        let actual: Vec<f64> = records.iter().map(|r| r.actual).collect();
        let predicted: Vec<f64> = records.iter().map(|r| r.predicted).collect();

        Self {
            mape: mape(&actual, &predicted),
            rmse: rmse(&actual, &predicted),
            mae: mae(&actual, &predicted),
            directional_accuracy: directional_accuracy(&actual, &predicted),
            count: records.len(),
        }
    }

    pub fn is_defined(&self) -> bool {
        self.count > 0 && self.mape.is_finite() && self.rmse.is_finite()
    }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 {
        f64::NAN
    } else {
        sum / n as f64
    }
}

/// Mean Squared Error
pub fn mse(actual: &[f64], predicted: &[f64]) -> f64 {
    mean(actual.iter().zip(predicted).map(|(a, p)| (p - a).powi(2)))
}

/// Root Mean Squared Error
pub fn rmse(actual: &[f64], predicted: &[f64]) -> f64 {
    mse(actual, predicted).sqrt()
}

/// Mean Absolute Error
pub fn mae(actual: &[f64], predicted: &[f64]) -> f64 {
    mean(actual.iter().zip(predicted).map(|(a, p)| (p - a).abs()))
}

/// Mean Absolute Percentage Error, in percent
pub fn mape(actual: &[f64], predicted: &[f64]) -> f64 {
    mean(actual.iter().zip(predicted).map(|(a, p)| ((p - a) / a).abs())) * 100.0
}

/// Share of consecutive steps where predicted and actual moved the same way
///
/// The predicted move is measured from the previous actual value, which is
/// what the forecaster saw when predicting.
pub fn directional_accuracy(actual: &[f64], predicted: &[f64]) -> f64 {
    let n = actual.len().min(predicted.len());
    if n < 2 {
        return f64::NAN;
    }
    let correct = (1..n)
        .filter(|&i| {
            let true_move = actual[i] - actual[i - 1];
            let pred_move = predicted[i] - actual[i - 1];
            true_move.signum() == pred_move.signum()
        })
        .count();
    correct as f64 / (n - 1) as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn record(predicted: f64, actual: f64) -> EvaluationRecord {
        EvaluationRecord::new(0, predicted, actual)
    }

    #[test]
    fn test_mse_and_rmse() {
        let actual = [1.0, 2.0, 3.0];
        let predicted = [1.1, 2.0, 2.9];
        assert_abs_diff_eq!(mse(&actual, &predicted), 0.006666666666666667, epsilon = 1e-10);
        assert_abs_diff_eq!(rmse(&actual, &predicted), 0.0816496580927726, epsilon = 1e-10);
    }

    #[test]
    fn test_mape() {
        let actual = [100.0, 200.0];
        let predicted = [110.0, 180.0];
        assert_abs_diff_eq!(mape(&actual, &predicted), 10.0, epsilon = 1e-10);
    }

    #[test]
    fn test_perfect_predictions_have_zero_error() {
        let records: Vec<_> = [100.0, 101.0, 99.5].iter().map(|&v| record(v, v)).collect();
        let metrics = Metrics::from_records(&records);
        assert_eq!(metrics.mape, 0.0);
        assert_eq!(metrics.rmse, 0.0);
        assert_eq!(metrics.mae, 0.0);
        assert!(metrics.is_defined());
    }

    #[test]
    fn test_metrics_are_non_negative() {
        let records = vec![record(90.0, 100.0), record(130.0, 120.0), record(50.0, 51.0)];
        let metrics = Metrics::from_records(&records);
        assert!(metrics.mape > 0.0);
        assert!(metrics.rmse > 0.0);
        assert_eq!(metrics.count, 3);
    }

    #[test]
    fn test_empty_metrics_are_nan() {
        let metrics = Metrics::from_records(&[]);
        assert!(metrics.mape.is_nan());
        assert!(metrics.rmse.is_nan());
        assert!(!metrics.is_defined());
    }

    #[test]
    fn test_directional_accuracy() {
        let actual = [100.0, 105.0, 103.0, 108.0];
        let predicted = [100.0, 104.0, 106.0, 107.0];
        // up/up, down/up, up/up
        assert_abs_diff_eq!(directional_accuracy(&actual, &predicted), 2.0 / 3.0, epsilon = 1e-12);
        assert!(directional_accuracy(&[1.0], &[1.0]).is_nan());
    }
}
