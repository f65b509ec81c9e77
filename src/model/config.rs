//! Model and training configuration

use crate::system::BackendInfo;
use serde::{Deserialize, Serialize};

/// Configuration of the stacked LSTM forecaster and its training loop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Number of past values fed to the network
    pub window_size: usize,
    /// Hidden units of each stacked LSTM layer, bottom first
    pub hidden_sizes: Vec<usize>,
    /// Dropout applied to the first layer's output during training
    pub dropout: f64,
    /// Full passes over the training examples
    pub epochs: usize,
    /// Examples per gradient step
    pub batch_size: usize,
    /// Trailing fraction of examples held out for validation loss
    pub validation_split: f64,
    /// Shuffle training examples each epoch
    pub shuffle: bool,
    /// Optimizer learning rate
    pub learning_rate: f64,
    /// First-moment decay (Adam) or momentum (SGD)
    pub beta1: f64,
    /// Second-moment decay (Adam)
    pub beta2: f64,
    /// Numerical-stability constant (Adam)
    pub epsilon: f64,
    /// Gradient clipping by global norm
    pub gradient_clip: Option<f64>,
    /// Weight initialization
    pub weight_init: WeightInit,
    /// Optimizer choice
    pub optimizer: OptimizerKind,
    /// RNG seed for initialization, dropout and shuffling
    pub seed: Option<u64>,
}

/// Weight initialization scheme
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum WeightInit {
    /// Normal with std `sqrt(2 / (fan_in + fan_out))`
    #[default]
    GlorotNormal,
    /// Uniform in `±sqrt(6 / (fan_in + fan_out))`
    GlorotUniform,
    /// Uniform in `[low, high)`
    Uniform { low: f64, high: f64 },
}

/// Optimizer used by [`crate::model::Forecaster::fit`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OptimizerKind {
    #[default]
    Adam,
    /// SGD with momentum taken from `beta1`
    Sgd,
}

impl ModelConfig {
    /// Default configuration for a given window size
    pub fn new(window_size: usize) -> Self {
        Self {
            window_size,
            hidden_sizes: vec![50, 30],
            dropout: 0.2,
            epochs: 50,
            batch_size: 32,
            validation_split: 0.1,
            shuffle: true,
            learning_rate: 0.001,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-7,
            gradient_clip: Some(1.0),
            weight_init: WeightInit::GlorotNormal,
            optimizer: OptimizerKind::Adam,
            seed: None,
        }
    }

    /// Small network for tests and slow backends
    pub fn small(window_size: usize) -> Self {
        Self::new(window_size)
            .with_hidden_sizes(vec![16, 8])
            .with_dropout(0.0)
            .with_batch_size(8)
    }

    /// Adjusts batch size to the execution backend
    ///
    /// Accelerated backends get larger batches, single-threaded CPUs smaller
    /// ones. The training algorithm is unchanged.
    pub fn tuned_for(mut self, backend: &BackendInfo) -> Self {
        if backend.accelerated {
            self.batch_size = self.batch_size.max(64);
        } else if backend.threads <= 1 {
            self.batch_size = self.batch_size.min(16);
        }
        self
    }

    pub fn with_hidden_sizes(mut self, hidden_sizes: Vec<usize>) -> Self {
        self.hidden_sizes = hidden_sizes;
        self
    }

    pub fn with_dropout(mut self, dropout: f64) -> Self {
        self.dropout = dropout;
        self
    }

    pub fn with_epochs(mut self, epochs: usize) -> Self {
        self.epochs = epochs;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_validation_split(mut self, split: f64) -> Self {
        self.validation_split = split;
        self
    }

    pub fn with_learning_rate(mut self, lr: f64) -> Self {
        self.learning_rate = lr;
        self
    }

    pub fn with_gradient_clip(mut self, clip: Option<f64>) -> Self {
        self.gradient_clip = clip;
        self
    }

    pub fn with_weight_init(mut self, init: WeightInit) -> Self {
        self.weight_init = init;
        self
    }

    pub fn with_optimizer(mut self, optimizer: OptimizerKind) -> Self {
        self.optimizer = optimizer;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn without_shuffle(mut self) -> Self {
        self.shuffle = false;
        self
    }

    /// Checks values that would make training meaningless
    pub fn validate(&self) -> Result<(), String> {
        if self.window_size == 0 {
            return Err("window_size must be positive".into());
        }
        if self.hidden_sizes.is_empty() || self.hidden_sizes.contains(&0) {
            return Err("hidden_sizes must contain at least one positive layer size".into());
        }
        if self.batch_size == 0 {
            return Err("batch_size must be positive".into());
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return Err(format!("dropout {} outside [0, 1)", self.dropout));
        }
        if !(0.0..1.0).contains(&self.validation_split) {
            return Err(format!(
                "validation_split {} outside [0, 1)",
                self.validation_split
            ));
        }
        if self.learning_rate <= 0.0 || !self.learning_rate.is_finite() {
            return Err(format!("learning_rate {} must be positive", self.learning_rate));
        }
        Ok(())
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self::new(7)
    }
}
