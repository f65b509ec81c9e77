//! Walk-forward backtesting
//!
//! Replays the model over history: every step sees only the preceding
//! `window_size` prices and predicts the next one.

use crate::data::PricePoint;
use crate::error::{ForecastError, Result};
use crate::model::SequenceModel;
use crate::preprocessing::NormalizationParams;
use crate::utils::Metrics;
use log::{info, warn};
use serde::{Deserialize, Serialize};

/// Default number of records kept for presentation
pub const DEFAULT_RETAINED: usize = 30;

/// One backtested step
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRecord {
    pub timestamp: i64,
    pub predicted: f64,
    pub actual: f64,
    /// `(predicted - actual) / actual * 100`
    pub error_pct: f64,
}

impl EvaluationRecord {
    pub fn new(timestamp: i64, predicted: f64, actual: f64) -> Self {
        Self {
            timestamp,
            predicted,
            actual,
            error_pct: (predicted - actual) / actual * 100.0,
        }
    }
}

/// A step whose prediction failed and was left out of the metrics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepFailure {
    /// Index of the target price in the history
    pub index: usize,
    pub timestamp: i64,
    pub reason: String,
}

/// Which bounds map history into the model's normalized space
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum NormalizationMode {
    /// Fit fresh bounds on the evaluated history
    #[default]
    Refit,
    /// Reuse bounds fitted elsewhere, typically on the training series
    Reuse(NormalizationParams),
}

/// Successful records, failed steps and the metrics over the successes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestReport {
    pub metrics: Metrics,
    /// Every successful step, oldest first
    pub records: Vec<EvaluationRecord>,
    pub failures: Vec<StepFailure>,
    /// Bounds used for this evaluation
    pub params: NormalizationParams,
    /// The history was constant and a unit range stood in for its bounds
    pub degenerate_range: bool,
    retained: usize,
}

impl BacktestReport {
    /// The most recent records, for presentation
    pub fn recent(&self) -> &[EvaluationRecord] {
        let start = self.records.len().saturating_sub(self.retained);
        &self.records[start..]
    }

    /// Steps attempted, successful or not
    pub fn attempted(&self) -> usize {
        self.records.len() + self.failures.len()
    }

    /// Some steps failed but metrics exist for the rest
    pub fn is_degraded(&self) -> bool {
        !self.failures.is_empty()
    }

    /// Every step succeeded
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty() && !self.records.is_empty()
    }
}

/// Walk-forward evaluator
#[derive(Debug, Clone)]
pub struct Backtester {
    pub window_size: usize,
    retained: usize,
    mode: NormalizationMode,
}

impl Backtester {
    pub fn new(window_size: usize) -> Self {
        Self {
            window_size,
            retained: DEFAULT_RETAINED,
            mode: NormalizationMode::Refit,
        }
    }

    /// Number of records [`BacktestReport::recent`] returns
    pub fn with_retained(mut self, retained: usize) -> Self {
        self.retained = retained;
        self
    }

    pub fn with_normalization(mut self, mode: NormalizationMode) -> Self {
        self.mode = mode;
        self
    }

    /// Evaluates `model` on every step from `window_size` to the end of `history`
    ///
    /// A failing step is recorded in [`BacktestReport::failures`] and the
    /// loop moves on. Empty or too short histories are rejected.
    pub fn evaluate<M: SequenceModel + ?Sized>(&self, model: &M, history: &[PricePoint]) -> Result<BacktestReport> {
        let w = self.window_size;
        if history.is_empty() {
            return Err(ForecastError::invalid("history is empty"));
        }
        if w == 0 || history.len() <= w {
            return Err(ForecastError::invalid(format!(
                "window size {} leaves no steps in {} prices",
                w,
                history.len()
            )));
        }
        if model.window_size() != w {
            return Err(ForecastError::invalid(format!(
                "model expects windows of {}, backtester uses {}",
                model.window_size(),
                w
            )));
        }

        let prices: Vec<f64> = history.iter().map(|p| p.price).collect();
        let mut degenerate_range = false;
        let params = match self.mode {
            NormalizationMode::Reuse(params) => params,
            NormalizationMode::Refit => match NormalizationParams::fit(&prices) {
                Ok(params) => params,
                Err(ForecastError::DegenerateData { value }) => {
                    warn!("History is constant at {}, evaluating with a unit range", value);
                    degenerate_range = true;
                    NormalizationParams::unit_range(value)
                }
                Err(e) => return Err(e),
            },
        };
        let normalized: Vec<f64> = prices.iter().map(|&v| params.transform(v)).collect();

        let mut records = Vec::with_capacity(history.len() - w);
        let mut failures = Vec::new();

        for i in w..history.len() {
            let point = &history[i];
            let outcome = model
                .predict(&normalized[i - w..i])
                .map(|raw| params.inverse(raw))
                .and_then(|predicted| {
                    if predicted.is_finite() {
                        Ok(predicted)
                    } else {
                        Err(ForecastError::invalid(format!("non-finite prediction {}", predicted)))
                    }
                });

            match outcome {
                Ok(predicted) => records.push(EvaluationRecord::new(point.timestamp, predicted, point.price)),
                Err(e) => {
                    warn!("Skipping backtest step {} ({}): {}", i, point.timestamp, e);
                    failures.push(StepFailure {
                        index: i,
                        timestamp: point.timestamp,
                        reason: e.to_string(),
                    });
                }
            }
        }

        let metrics = Metrics::from_records(&records);
        info!(
            "Backtest: {} steps, {} skipped, MAPE {:.2}%, RMSE {:.2}",
            records.len() + failures.len(),
            failures.len(),
            metrics.mape,
            metrics.rmse
        );

        Ok(BacktestReport {
            metrics,
            records,
            failures,
            params,
            degenerate_range,
            retained: self.retained,
        })
    }
}

/// Walk-forward evaluation with a refit on `history`
pub fn evaluate<M: SequenceModel + ?Sized>(
    model: &M,
    history: &[PricePoint],
    window_size: usize,
) -> Result<BacktestReport> {
    Backtester::new(window_size).evaluate(model, history)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::PriceSeries;
    use approx::assert_abs_diff_eq;

    /// Repeats the last value of the window
    struct LastValue(usize);

    impl SequenceModel for LastValue {
        fn window_size(&self) -> usize {
            self.0
        }

        fn predict(&self, window: &[f64]) -> Result<f64> {
            window
                .last()
                .copied()
                .ok_or_else(|| ForecastError::invalid("empty window"))
        }
    }

    /// Last-value model that fails whenever the window ends on `poison`
    struct Failing {
        window: usize,
        poison: f64,
    }

    impl SequenceModel for Failing {
        fn window_size(&self) -> usize {
            self.window
        }

        fn predict(&self, window: &[f64]) -> Result<f64> {
            match window.last() {
                Some(&v) if (v - self.poison).abs() < 1e-12 => Err(ForecastError::invalid("injected failure")),
                Some(&v) => Ok(v),
                None => Err(ForecastError::invalid("empty window")),
            }
        }
    }

    fn history(prices: &[f64]) -> Vec<PricePoint> {
        PriceSeries::from_prices(0, prices).unwrap().points().to_vec()
    }

    #[test]
    fn test_constant_history_with_last_value_model() {
        let report = evaluate(&LastValue(3), &history(&[100.0, 100.0, 100.0, 100.0]), 3).unwrap();

        assert_eq!(report.records.len(), 1);
        assert_eq!(report.records[0].predicted, report.records[0].actual);
        assert_eq!(report.metrics.mape, 0.0);
        assert_eq!(report.metrics.rmse, 0.0);
        assert!(report.degenerate_range);
    }

    #[test]
    fn test_record_fields() {
        let report = evaluate(&LastValue(2), &history(&[100.0, 110.0, 121.0, 120.0]), 2).unwrap();

        assert_eq!(report.records.len(), 2);
        let first = report.records[0];
        assert_eq!(first.timestamp, crate::data::DAY_MS * 2);
        assert_abs_diff_eq!(first.predicted, 110.0, epsilon = 1e-9);
        assert_eq!(first.actual, 121.0);
        assert_abs_diff_eq!(first.error_pct, (110.0 - 121.0) / 121.0 * 100.0, epsilon = 1e-9);
        assert!(!report.degenerate_range);
        assert!(report.is_complete());
    }

    #[test]
    fn test_metrics_cover_all_records_but_recent_is_capped() {
        let prices: Vec<f64> = (0..50).map(|i| 100.0 + i as f64).collect();
        let report = Backtester::new(5).evaluate(&LastValue(5), &history(&prices)).unwrap();

        assert_eq!(report.records.len(), 45);
        assert_eq!(report.recent().len(), 30);
        assert_eq!(report.recent()[29], report.records[44]);
        assert_eq!(report.metrics.count, 45);
        // Last-value forecast on a +1/day series misses by exactly 1
        assert_abs_diff_eq!(report.metrics.rmse, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_step_failure_is_excluded() {
        let prices = [10.0, 12.0, 11.0, 15.0, 14.0, 13.0];
        let points = history(&prices);
        // 15.0 normalizes to 1.0 under a refit on this history
        let model = Failing { window: 2, poison: 1.0 };
        let report = Backtester::new(2).evaluate(&model, &points).unwrap();

        assert_eq!(report.attempted(), 4);
        assert_eq!(report.records.len(), 3);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].index, 4);
        assert!(report.is_degraded());

        let expected = Metrics::from_records(&[
            EvaluationRecord::new(0, 12.0, 11.0),
            EvaluationRecord::new(0, 11.0, 15.0),
            EvaluationRecord::new(0, 14.0, 13.0),
        ]);
        assert_abs_diff_eq!(report.metrics.mape, expected.mape, epsilon = 1e-9);
        assert_abs_diff_eq!(report.metrics.rmse, expected.rmse, epsilon = 1e-9);
    }

    #[test]
    fn test_all_steps_failing_gives_nan_metrics() {
        let model = Failing { window: 1, poison: 0.0 };
        let report = evaluate(&model, &history(&[5.0, 5.0, 5.0]), 1).unwrap();
        assert!(report.records.is_empty());
        assert_eq!(report.failures.len(), 2);
        assert!(report.metrics.mape.is_nan());
        assert!(!report.metrics.is_defined());
    }

    #[test]
    fn test_reuse_training_bounds() {
        let params = NormalizationParams { min: 50.0, max: 150.0 };
        let report = Backtester::new(2)
            .with_normalization(NormalizationMode::Reuse(params))
            .evaluate(&LastValue(2), &history(&[100.0, 100.0, 100.0]))
            .unwrap();

        assert_eq!(report.params, params);
        assert!(!report.degenerate_range);
        assert_abs_diff_eq!(report.records[0].predicted, 100.0, epsilon = 1e-9);
    }

    #[test]
    fn test_rejects_short_history_and_mismatched_model() {
        assert!(matches!(
            evaluate(&LastValue(3), &history(&[1.0, 2.0, 3.0]), 3),
            Err(ForecastError::InvalidInput(_))
        ));
        assert!(matches!(
            evaluate(&LastValue(3), &[], 3),
            Err(ForecastError::InvalidInput(_))
        ));
        assert!(matches!(
            evaluate(&LastValue(4), &history(&[1.0, 2.0, 3.0, 4.0, 5.0]), 3),
            Err(ForecastError::InvalidInput(_))
        ));
    }
}
