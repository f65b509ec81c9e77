//! Stacked LSTM network with a linear output unit

use super::config::ModelConfig;
use super::dense::{Dense, DenseGradients};
use super::lstm::{LstmCache, LstmGradients, LstmLayer};
use super::optimizer::Optimizer;
use ndarray::{s, Array2, Array3};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// LSTM layers stacked bottom to top, the last hidden state of the top layer
/// feeding a single linear unit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LstmNetwork {
    pub window_size: usize,
    layers: Vec<LstmLayer>,
    output: Dense,
    dropout: f64,
}

/// Everything the backward pass needs from a forward pass
#[derive(Debug, Clone)]
pub struct ForwardCache {
    layer_caches: Vec<LstmCache>,
    /// Dropout masks applied to the outputs of every layer except the top one
    masks: Vec<Vec<Array2<f64>>>,
    final_hidden: Array2<f64>,
}

#[derive(Debug, Clone)]
pub struct NetworkGradients {
    pub layers: Vec<LstmGradients>,
    pub output: DenseGradients,
}

impl LstmNetwork {
    pub fn new<R: Rng + ?Sized>(config: &ModelConfig, rng: &mut R) -> Self {
        let mut layers = Vec::with_capacity(config.hidden_sizes.len());
        let mut input_size = 1;
        for &hidden in &config.hidden_sizes {
            layers.push(LstmLayer::new(input_size, hidden, config.weight_init, rng));
            input_size = hidden;
        }
        let output = Dense::new(input_size, 1, config.weight_init, rng);

        Self {
            window_size: config.window_size,
            layers,
            output,
            dropout: config.dropout,
        }
    }

    pub fn num_parameters(&self) -> usize {
        self.layers.iter().map(|l| l.num_parameters()).sum::<usize>() + self.output.num_parameters()
    }

    pub fn hidden_sizes(&self) -> Vec<usize> {
        self.layers.iter().map(|l| l.hidden_size).collect()
    }

    /// Checks that every parameter tensor fits the layer it belongs to and
    /// that layer sizes chain from the scalar input to the single output
    pub fn check_shapes(&self) -> Result<(), String> {
        if self.layers.is_empty() {
            return Err("network has no recurrent layers".into());
        }
        let mut expected_input = 1;
        for (idx, layer) in self.layers.iter().enumerate() {
            let (input, hidden) = (layer.input_size, layer.hidden_size);
            if input != expected_input {
                return Err(format!("layer {} takes {} inputs, previous layer gives {}", idx, input, expected_input));
            }
            if layer.input_weights.dim() != (input, 4 * hidden)
                || layer.hidden_weights.dim() != (hidden, 4 * hidden)
                || layer.biases.len() != 4 * hidden
            {
                return Err(format!("layer {} parameters do not match {} -> {}", idx, input, hidden));
            }
            expected_input = hidden;
        }
        if self.output.input_size() != expected_input
            || self.output.output_size() != 1
            || self.output.biases.len() != 1
        {
            return Err(format!(
                "output layer is {}x{}, expected {}x1",
                self.output.input_size(),
                self.output.output_size(),
                expected_input
            ));
        }
        Ok(())
    }

    /// Inverted-dropout masks for one training batch
    ///
    /// One `[batch, hidden]` mask per time step for every layer below the top.
    pub fn sample_dropout_masks<R: Rng + ?Sized>(&self, batch: usize, rng: &mut R) -> Vec<Vec<Array2<f64>>> {
        if self.dropout <= 0.0 {
            return Vec::new();
        }
        let keep = 1.0 - self.dropout;
        let below_top = self.layers.len().saturating_sub(1);
        self.layers[..below_top]
            .iter()
            .map(|layer| {
                (0..self.window_size)
                    .map(|_| {
                        Array2::from_shape_fn((batch, layer.hidden_size), |_| {
                            if rng.gen::<f64>() < keep {
                                1.0 / keep
                            } else {
                                0.0
                            }
                        })
                    })
                    .collect()
            })
            .collect()
    }

    /// Forward pass for `x` shaped `[batch, steps, 1]`
    ///
    /// Pass the masks from [`LstmNetwork::sample_dropout_masks`] while
    /// training and an empty vector for inference.
    pub fn forward(&self, x: &Array3<f64>, masks: Vec<Vec<Array2<f64>>>) -> (Array2<f64>, ForwardCache) {
        let steps = x.shape()[1];
        let mut sequence: Vec<Array2<f64>> = (0..steps).map(|t| x.slice(s![.., t, ..]).to_owned()).collect();
        let mut layer_caches = Vec::with_capacity(self.layers.len());

        for (idx, layer) in self.layers.iter().enumerate() {
            let (mut outputs, cache) = layer.forward(&sequence);
            if let Some(layer_masks) = masks.get(idx) {
                for (h, mask) in outputs.iter_mut().zip(layer_masks) {
                    *h *= mask;
                }
            }
            layer_caches.push(cache);
            sequence = outputs;
        }

        let final_hidden = sequence
            .pop()
            .unwrap_or_else(|| Array2::zeros((x.shape()[0], self.output.input_size())));
        let predictions = self.output.forward(&final_hidden);

        (
            predictions,
            ForwardCache {
                layer_caches,
                masks,
                final_hidden,
            },
        )
    }

    /// Inference without dropout, returns `[batch, 1]`
    pub fn predict(&self, x: &Array3<f64>) -> Array2<f64> {
        self.forward(x, Vec::new()).0
    }

    /// Backward pass from the loss gradient with respect to the predictions
    pub fn backward(&self, cache: &ForwardCache, d_predictions: &Array2<f64>) -> NetworkGradients {
        let (output_grads, d_hidden) = self.output.backward(&cache.final_hidden, d_predictions);

        let batch = d_hidden.nrows();
        let top = self.layers.len() - 1;
        let steps = cache.layer_caches[top].len();
        let mut d_sequence: Vec<Array2<f64>> = (0..steps)
            .map(|_| Array2::zeros((batch, self.layers[top].hidden_size)))
            .collect();
        if let Some(last) = d_sequence.last_mut() {
            *last = d_hidden;
        }

        let mut layer_grads = Vec::with_capacity(self.layers.len());
        for idx in (0..self.layers.len()).rev() {
            let (grads, mut d_inputs) = self.layers[idx].backward(&cache.layer_caches[idx], &d_sequence);
            layer_grads.push(grads);

            if idx > 0 {
                if let Some(layer_masks) = cache.masks.get(idx - 1) {
                    for (d, mask) in d_inputs.iter_mut().zip(layer_masks) {
                        *d *= mask;
                    }
                }
            }
            d_sequence = d_inputs;
        }
        layer_grads.reverse();

        NetworkGradients {
            layers: layer_grads,
            output: output_grads,
        }
    }

    /// Updates every parameter tensor through `optimizer`
    pub fn apply_gradients(&mut self, grads: &NetworkGradients, optimizer: &mut dyn Optimizer) {
        optimizer.begin_step();
        let mut slot = 0;
        for (layer, g) in self.layers.iter_mut().zip(&grads.layers) {
            optimizer.update(slot, layer.input_weights.view_mut().into_dyn(), g.input_weights.view().into_dyn());
            optimizer.update(slot + 1, layer.hidden_weights.view_mut().into_dyn(), g.hidden_weights.view().into_dyn());
            optimizer.update(slot + 2, layer.biases.view_mut().into_dyn(), g.biases.view().into_dyn());
            slot += 3;
        }
        optimizer.update(slot, self.output.weights.view_mut().into_dyn(), grads.output.weights.view().into_dyn());
        optimizer.update(slot + 1, self.output.biases.view_mut().into_dyn(), grads.output.biases.view().into_dyn());
    }
}

impl NetworkGradients {
    pub fn global_norm(&self) -> f64 {
        let sum: f64 = self.layers.iter().map(|g| g.squared_norm()).sum::<f64>() + self.output.squared_norm();
        sum.sqrt()
    }

    /// Rescales all gradients so their global norm is at most `max_norm`
    pub fn clip_global_norm(&mut self, max_norm: f64) {
        let norm = self.global_norm();
        if norm > max_norm && norm.is_finite() {
            let factor = max_norm / norm;
            for g in &mut self.layers {
                g.scale(factor);
            }
            self.output.scale(factor);
        }
    }
}

/// Mean squared error and its gradient with respect to `predictions`
pub fn mse_loss(predictions: &Array2<f64>, targets: &Array2<f64>) -> (f64, Array2<f64>) {
    let diff = predictions - targets;
    let n = diff.len().max(1) as f64;
    let loss = diff.mapv(|d| d * d).sum() / n;
    (loss, diff * (2.0 / n))
}
