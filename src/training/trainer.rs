//! Training orchestration: normalize, window, create, fit

use super::progress::{Cancellable, CancellationToken, ChannelSink, EpochProgress, ProgressSink};
use crate::error::{ForecastError, Result};
use crate::forecast::predict_next;
use crate::model::{Forecaster, ModelConfig, TrainingHistory};
use crate::preprocessing::{NormalizationParams, WindowDataset};
use log::info;
use std::sync::mpsc::{channel, Receiver};
use std::thread::{self, JoinHandle};

/// A trained model together with the normalization it was trained under
#[derive(Debug, Clone)]
pub struct TrainedPipeline {
    pub model: Forecaster,
    pub params: NormalizationParams,
    pub history: TrainingHistory,
    /// Raw prices the model was trained on
    pub prices: Vec<f64>,
}

impl TrainedPipeline {
    /// Forecast for the day after the training series
    pub fn forecast_next(&self) -> Result<f64> {
        predict_next(&self.model, &self.prices, &self.params)
    }
}

/// Drives a full training run from raw prices
#[derive(Debug, Clone)]
pub struct Trainer {
    config: ModelConfig,
}

impl Trainer {
    pub fn new(config: ModelConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Trains a fresh forecaster on `prices`
    pub fn train(&self, prices: &[f64], sink: &mut dyn ProgressSink) -> Result<TrainedPipeline> {
        let mut model = Forecaster::new(self.config.clone());
        let (params, history) = self.train_into(&mut model, prices, sink)?;
        Ok(TrainedPipeline {
            model,
            params,
            history,
            prices: prices.to_vec(),
        })
    }

    /// Trains `model` on `prices`, discarding whatever parameters it held
    ///
    /// Input checks run before the model is touched, so a rejected series
    /// leaves the previous parameters in place.
    pub fn train_into(
        &self,
        model: &mut Forecaster,
        prices: &[f64],
        sink: &mut dyn ProgressSink,
    ) -> Result<(NormalizationParams, TrainingHistory)> {
        let window_size = self.config.window_size;
        if prices.is_empty() {
            return Err(ForecastError::invalid("price history is empty"));
        }
        if prices.len() <= window_size {
            return Err(ForecastError::invalid(format!(
                "window size {} needs more than {} prices",
                window_size,
                prices.len()
            )));
        }

        let (params, normalized) = NormalizationParams::fit_transform(prices)?;
        let dataset = WindowDataset::build(normalized.as_slice().unwrap_or(&[]), window_size);
        info!(
            "Prepared {} windows from {} prices (range {:.2}..{:.2})",
            dataset.len(),
            prices.len(),
            params.min,
            params.max
        );

        model.create(window_size)?;
        let history = model.fit(&dataset, self.config.epochs, self.config.batch_size, sink)?;
        Ok((params, history))
    }

    /// Runs training on its own thread
    ///
    /// Progress arrives on [`TrainingHandle::progress`], one event per epoch.
    pub fn spawn(&self, prices: Vec<f64>) -> TrainingHandle {
        let (tx, rx) = channel();
        let cancel = CancellationToken::new();
        let trainer = self.clone();
        let token = cancel.clone();

        let join = thread::spawn(move || {
            let mut sink = Cancellable::new(ChannelSink::new(tx), token);
            trainer.train(&prices, &mut sink)
        });

        TrainingHandle {
            events: rx,
            cancel,
            join,
        }
    }
}

/// Handle to a training run on a background thread
pub struct TrainingHandle {
    events: Receiver<EpochProgress>,
    cancel: CancellationToken,
    join: JoinHandle<Result<TrainedPipeline>>,
}

impl TrainingHandle {
    /// Blocking iterator over progress events, ends when training stops
    pub fn progress(&self) -> impl Iterator<Item = EpochProgress> + '_ {
        self.events.iter()
    }

    /// Requests a stop at the next epoch boundary
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Waits for the run to end
    pub fn join(self) -> Result<TrainedPipeline> {
        self.join
            .join()
            .unwrap_or_else(|_| Err(ForecastError::state("training thread panicked")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ModelState, SequenceModel};
    use crate::training::{NullSink, RecordingSink};

    fn config() -> ModelConfig {
        ModelConfig::small(7).with_epochs(3).with_seed(21)
    }

    fn prices(n: usize) -> Vec<f64> {
        (0..n).map(|i| 100.0 + (i as f64 * 0.4).sin() * 5.0 + i as f64 * 0.2).collect()
    }

    #[test]
    fn test_train_reports_every_epoch() {
        let mut sink = RecordingSink::default();
        let trained = Trainer::new(config()).train(&prices(60), &mut sink).unwrap();

        assert_eq!(sink.events.len(), 3);
        assert_eq!(trained.history.epochs.len(), 3);
        assert_eq!(trained.model.state(), ModelState::Trained);
        assert!(trained.params.min < trained.params.max);
    }

    #[test]
    fn test_train_rejects_short_and_empty_series() {
        let trainer = Trainer::new(config());
        assert!(matches!(
            trainer.train(&[], &mut NullSink),
            Err(ForecastError::InvalidInput(_))
        ));
        assert!(matches!(
            trainer.train(&prices(7), &mut NullSink),
            Err(ForecastError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_train_rejects_constant_series() {
        let err = Trainer::new(config()).train(&[100.0; 30], &mut NullSink).unwrap_err();
        assert!(matches!(err, ForecastError::DegenerateData { .. }));
        assert!(err.is_rejected_input());
    }

    #[test]
    fn test_rejected_input_keeps_previous_model() {
        let trainer = Trainer::new(config());
        let mut model = Forecaster::new(config());
        trainer.train_into(&mut model, &prices(40), &mut NullSink).unwrap();

        assert!(trainer.train_into(&mut model, &[5.0; 20], &mut NullSink).is_err());
        assert!(model.is_trained());
        assert!(model.predict(&[0.5; 7]).is_ok());
    }

    #[test]
    fn test_forecast_next_is_in_price_units() {
        let trained = Trainer::new(config()).train(&prices(60), &mut NullSink).unwrap();
        let next = trained.forecast_next().unwrap();
        let (min, max) = (trained.params.min, trained.params.max);
        let span = max - min;
        assert!(next > min - span && next < max + span);
    }

    #[test]
    fn test_spawned_training_streams_progress() {
        let handle = Trainer::new(config()).spawn(prices(50));
        let events: Vec<EpochProgress> = handle.progress().collect();
        let trained = handle.join().unwrap();

        assert_eq!(events.len(), 3);
        assert_eq!(events.last().map(|e| e.epoch), Some(2));
        assert!(trained.model.is_trained());
    }

    #[test]
    fn test_spawned_training_can_be_cancelled() {
        let handle = Trainer::new(config().with_epochs(10_000)).spawn(prices(50));
        let first = handle.progress().next();
        assert!(first.is_some());
        handle.cancel();

        let err = handle.join().unwrap_err();
        assert!(matches!(err, ForecastError::Cancelled { .. }));
    }
}
