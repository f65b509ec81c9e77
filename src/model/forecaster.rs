//! Forecaster: lifecycle of the trainable sequence model
//!
//! A [`Forecaster`] starts empty, gets parameters from [`Forecaster::create`],
//! becomes usable for prediction after [`Forecaster::fit`] and can release
//! its parameters with [`Forecaster::dispose`].

use super::config::ModelConfig;
use super::network::{mse_loss, LstmNetwork};
use super::optimizer;
use crate::error::{ForecastError, Result};
use crate::preprocessing::WindowDataset;
use crate::training::{EpochProgress, ProgressSink};
use log::{debug, info, warn};
use ndarray::Array3;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Anything that maps a window of normalized values to one normalized value
pub trait SequenceModel {
    /// Number of values expected per window
    fn window_size(&self) -> usize;

    /// Raw (normalized-space) prediction for one window
    fn predict(&self, window: &[f64]) -> Result<f64>;
}

/// Lifecycle state of a [`Forecaster`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelState {
    Uncreated,
    Created,
    Trained,
    Disposed,
}

/// Outcome of one training run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrainingHistory {
    pub epochs: Vec<EpochProgress>,
    pub train_examples: usize,
    pub validation_examples: usize,
    pub elapsed_secs: f64,
}

impl TrainingHistory {
    pub fn final_loss(&self) -> Option<f64> {
        self.epochs.last().map(|e| e.loss)
    }

    pub fn final_val_loss(&self) -> Option<f64> {
        self.epochs.last().and_then(|e| e.val_loss)
    }

    /// Relative drop of the training loss from the first to the last epoch
    pub fn improvement_pct(&self) -> Option<f64> {
        let first = self.epochs.first()?.loss;
        let last = self.epochs.last()?.loss;
        if first == 0.0 {
            None
        } else {
            Some((first - last) / first * 100.0)
        }
    }
}

#[derive(Serialize, Deserialize)]
struct SavedModel {
    config: ModelConfig,
    network: LstmNetwork,
}

/// Stacked LSTM forecaster owning its parameters
#[derive(Debug, Clone)]
pub struct Forecaster {
    config: ModelConfig,
    network: Option<LstmNetwork>,
    state: ModelState,
    rng: StdRng,
}

impl Forecaster {
    /// Empty forecaster, call [`Forecaster::create`] before training
    pub fn new(config: ModelConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            config,
            network: None,
            state: ModelState::Uncreated,
            rng,
        }
    }

    /// Shorthand for `new` followed by `create` with the configured window size
    pub fn created(config: ModelConfig) -> Result<Self> {
        let window_size = config.window_size;
        let mut forecaster = Self::new(config);
        forecaster.create(window_size)?;
        Ok(forecaster)
    }

    /// (Re)initializes all trainable parameters for `window_size` inputs
    ///
    /// Previously created or trained parameters are released first.
    pub fn create(&mut self, window_size: usize) -> Result<()> {
        self.config.window_size = window_size;
        self.config.validate().map_err(ForecastError::InvalidInput)?;

        self.dispose();
        let network = LstmNetwork::new(&self.config, &mut self.rng);
        info!(
            "Created LSTM {:?} -> dense(1), window {}, {} parameters",
            network.hidden_sizes(),
            window_size,
            network.num_parameters()
        );
        self.network = Some(network);
        self.state = ModelState::Created;
        Ok(())
    }

    /// Releases the parameters
    pub fn dispose(&mut self) {
        if self.network.take().is_some() {
            debug!("Released model parameters");
            self.state = ModelState::Disposed;
        }
    }

    pub fn state(&self) -> ModelState {
        self.state
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn is_trained(&self) -> bool {
        self.state == ModelState::Trained
    }

    pub fn num_parameters(&self) -> usize {
        self.network.as_ref().map(|n| n.num_parameters()).unwrap_or(0)
    }

    /// Trains on `dataset` for `epochs` passes
    ///
    /// The final `validation_split` share of the examples (chronological
    /// order) is held out and only used for the reported validation loss.
    /// Training examples are reshuffled every epoch. `sink` receives one
    /// event per epoch and is asked for cancellation before each epoch.
    pub fn fit(
        &mut self,
        dataset: &WindowDataset,
        epochs: usize,
        batch_size: usize,
        sink: &mut dyn ProgressSink,
    ) -> Result<TrainingHistory> {
        let network = self
            .network
            .as_mut()
            .ok_or_else(|| ForecastError::state("fit called before create"))?;

        if dataset.is_empty() {
            return Err(ForecastError::invalid("training dataset has no examples"));
        }
        if dataset.window_size != network.window_size {
            return Err(ForecastError::invalid(format!(
                "dataset windows have {} values, model expects {}",
                dataset.window_size, network.window_size
            )));
        }
        if epochs == 0 || batch_size == 0 {
            return Err(ForecastError::invalid("epochs and batch_size must be positive"));
        }

        let (train, validation) = dataset.split_validation(self.config.validation_split);
        let mut optimizer = optimizer::from_config(&self.config);
        let mut indices: Vec<usize> = (0..train.len()).collect();
        let mut history = TrainingHistory {
            epochs: Vec::with_capacity(epochs),
            train_examples: train.len(),
            validation_examples: validation.len(),
            elapsed_secs: 0.0,
        };
        let started = Instant::now();

        info!(
            "Training on {} examples ({} validation), {} epochs, batch {}",
            train.len(),
            validation.len(),
            epochs,
            batch_size
        );

        for epoch in 0..epochs {
            if sink.is_cancelled() {
                info!("Training cancelled before epoch {}", epoch + 1);
                return Err(ForecastError::Cancelled { epoch });
            }

            if self.config.shuffle {
                indices.shuffle(&mut self.rng);
            }

            let mut loss_sum = 0.0;
            for chunk in indices.chunks(batch_size) {
                let (x, y) = train.select(chunk);
                let masks = network.sample_dropout_masks(chunk.len(), &mut self.rng);
                let (predictions, cache) = network.forward(&x, masks);
                let (loss, d_predictions) = mse_loss(&predictions, &y);
                loss_sum += loss * chunk.len() as f64;

                let mut grads = network.backward(&cache, &d_predictions);
                if let Some(clip) = self.config.gradient_clip {
                    grads.clip_global_norm(clip);
                }
                network.apply_gradients(&grads, optimizer.as_mut());
            }

            let loss = loss_sum / train.len() as f64;
            if !loss.is_finite() {
                warn!("Epoch {} produced a non-finite loss", epoch + 1);
            }
            let val_loss = if validation.is_empty() {
                None
            } else {
                Some(mse_loss(&network.predict(&validation.inputs), &validation.targets).0)
            };

            let progress = EpochProgress {
                epoch,
                epochs,
                loss,
                val_loss,
            };
            debug!(
                "Epoch {}/{}: loss {:.6}, val_loss {}",
                epoch + 1,
                epochs,
                loss,
                val_loss.map(|v| format!("{:.6}", v)).unwrap_or_else(|| "-".into())
            );
            history.epochs.push(progress);
            sink.on_epoch_end(&progress);
        }

        history.elapsed_secs = started.elapsed().as_secs_f64();
        self.state = ModelState::Trained;
        info!(
            "Training completed in {:.2}s, final loss {:.6}",
            history.elapsed_secs,
            history.final_loss().unwrap_or(f64::NAN)
        );
        Ok(history)
    }

    fn trained_network(&self) -> Result<&LstmNetwork> {
        match (&self.network, self.state) {
            (Some(network), ModelState::Trained) => Ok(network),
            _ => Err(ForecastError::state("model has not been trained")),
        }
    }

    /// Serializes configuration and trained parameters
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let network = self
            .trained_network()
            .map_err(|_| ForecastError::state("no trained model to save"))?;
        let saved = SavedModel {
            config: self.config.clone(),
            network: network.clone(),
        };
        Ok(bincode::serialize(&saved)?)
    }

    /// Restores a trained forecaster from [`Forecaster::to_bytes`] output
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let saved: SavedModel = bincode::deserialize(bytes)?;
        if saved.network.window_size != saved.config.window_size
            || saved.network.hidden_sizes() != saved.config.hidden_sizes
        {
            return Err(ForecastError::Serialization(
                "stored network does not match its configuration".into(),
            ));
        }
        saved.network.check_shapes().map_err(ForecastError::Serialization)?;
        let mut forecaster = Self::new(saved.config);
        forecaster.network = Some(saved.network);
        forecaster.state = ModelState::Trained;
        Ok(forecaster)
    }
}

impl SequenceModel for Forecaster {
    fn window_size(&self) -> usize {
        self.config.window_size
    }

    fn predict(&self, window: &[f64]) -> Result<f64> {
        let network = self.trained_network()?;
        if window.len() != network.window_size {
            return Err(ForecastError::invalid(format!(
                "window has {} values, model expects {}",
                window.len(),
                network.window_size
            )));
        }
        let x = Array3::from_shape_fn((1, window.len(), 1), |(_, t, _)| window[t]);
        let value = network.predict(&x)[[0, 0]];
        if value.is_finite() {
            Ok(value)
        } else {
            Err(ForecastError::invalid(format!("model produced non-finite output {}", value)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::{CancellationToken, Cancellable, NullSink, RecordingSink};

    fn linear_dataset(n: usize, window: usize) -> WindowDataset {
        let values: Vec<f64> = (0..n).map(|i| i as f64 / n as f64).collect();
        WindowDataset::build(&values, window)
    }

    fn small() -> ModelConfig {
        ModelConfig::small(5).with_seed(17)
    }

    #[test]
    fn test_lifecycle() {
        let mut model = Forecaster::new(small());
        assert_eq!(model.state(), ModelState::Uncreated);

        model.create(5).unwrap();
        assert_eq!(model.state(), ModelState::Created);
        assert!(model.num_parameters() > 0);

        model.fit(&linear_dataset(30, 5), 2, 8, &mut NullSink).unwrap();
        assert_eq!(model.state(), ModelState::Trained);

        model.dispose();
        assert_eq!(model.state(), ModelState::Disposed);
        assert_eq!(model.num_parameters(), 0);
        assert!(model.predict(&[0.0; 5]).is_err());
    }

    #[test]
    fn test_fit_before_create_is_state_error() {
        let mut model = Forecaster::new(small());
        let err = model.fit(&linear_dataset(30, 5), 1, 8, &mut NullSink).unwrap_err();
        assert!(matches!(err, ForecastError::ModelState(_)));
    }

    #[test]
    fn test_predict_before_fit_is_state_error() {
        let model = Forecaster::created(small()).unwrap();
        assert!(matches!(
            model.predict(&[0.1; 5]),
            Err(ForecastError::ModelState(_))
        ));
    }

    #[test]
    fn test_recreate_discards_training() {
        let mut model = Forecaster::created(small()).unwrap();
        model.fit(&linear_dataset(30, 5), 1, 8, &mut NullSink).unwrap();
        model.create(5).unwrap();
        assert_eq!(model.state(), ModelState::Created);
        assert!(model.predict(&[0.1; 5]).is_err());
    }

    #[test]
    fn test_fit_rejects_empty_and_mismatched_datasets() {
        let mut model = Forecaster::created(small()).unwrap();
        assert!(matches!(
            model.fit(&linear_dataset(5, 5), 1, 8, &mut NullSink),
            Err(ForecastError::InvalidInput(_))
        ));
        assert!(matches!(
            model.fit(&linear_dataset(30, 3), 1, 8, &mut NullSink),
            Err(ForecastError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_progress_once_per_epoch_with_validation() {
        let mut model = Forecaster::created(small()).unwrap();
        let mut sink = RecordingSink::default();
        let history = model.fit(&linear_dataset(45, 5), 3, 8, &mut sink).unwrap();

        assert_eq!(sink.events.len(), 3);
        assert_eq!(sink.events.iter().map(|e| e.epoch).collect::<Vec<_>>(), vec![0, 1, 2]);
        assert!(sink.events.iter().all(|e| e.loss.is_finite() && e.val_loss.is_some()));
        assert_eq!(history.train_examples, 36);
        assert_eq!(history.validation_examples, 4);
    }

    #[test]
    fn test_cancellation_between_epochs() {
        let mut model = Forecaster::created(small()).unwrap();
        let token = CancellationToken::new();
        let trigger = token.clone();
        let mut sink = Cancellable::new(
            move |p: &EpochProgress| {
                if p.epoch == 1 {
                    trigger.cancel();
                }
            },
            token,
        );

        let err = model.fit(&linear_dataset(30, 5), 10, 8, &mut sink).unwrap_err();
        assert!(matches!(err, ForecastError::Cancelled { epoch: 2 }));
        assert_ne!(model.state(), ModelState::Trained);
    }

    #[test]
    fn test_training_reduces_loss() {
        let config = small().with_learning_rate(0.01);
        let mut model = Forecaster::created(config).unwrap();
        let history = model.fit(&linear_dataset(60, 5), 30, 8, &mut NullSink).unwrap();

        assert!(history.final_loss().unwrap() < history.epochs[0].loss);
        assert!(history.improvement_pct().unwrap() > 0.0);
    }

    #[test]
    fn test_seeded_training_is_reproducible() {
        let dataset = linear_dataset(40, 5);
        let mut a = Forecaster::created(small()).unwrap();
        let mut b = Forecaster::created(small()).unwrap();
        a.fit(&dataset, 3, 8, &mut NullSink).unwrap();
        b.fit(&dataset, 3, 8, &mut NullSink).unwrap();

        let window = [0.1, 0.2, 0.3, 0.4, 0.5];
        assert_eq!(a.predict(&window).unwrap(), b.predict(&window).unwrap());
    }

    #[test]
    fn test_bytes_round_trip() {
        let mut model = Forecaster::created(small()).unwrap();
        assert!(model.to_bytes().is_err());
        model.fit(&linear_dataset(30, 5), 2, 8, &mut NullSink).unwrap();

        let restored = Forecaster::from_bytes(&model.to_bytes().unwrap()).unwrap();
        let window = [0.5, 0.55, 0.6, 0.65, 0.7];
        assert_eq!(restored.predict(&window).unwrap(), model.predict(&window).unwrap());
        assert!(Forecaster::from_bytes(b"garbage").is_err());
    }

    #[test]
    fn test_from_bytes_rejects_mismatched_layers() {
        let mut rng = StdRng::seed_from_u64(1);
        let saved = SavedModel {
            config: small(),
            network: LstmNetwork::new(&small().with_hidden_sizes(vec![16, 4]), &mut rng),
        };
        let bytes = bincode::serialize(&saved).unwrap();

        assert!(matches!(
            Forecaster::from_bytes(&bytes),
            Err(ForecastError::Serialization(_))
        ));
    }

    #[test]
    fn test_predict_rejects_wrong_window() {
        let mut model = Forecaster::created(small()).unwrap();
        model.fit(&linear_dataset(30, 5), 1, 8, &mut NullSink).unwrap();
        assert!(matches!(
            model.predict(&[0.1; 4]),
            Err(ForecastError::InvalidInput(_))
        ));
    }
}
