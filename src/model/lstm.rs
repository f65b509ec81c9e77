//! Batched LSTM layer with backpropagation through time

use super::config::WeightInit;
use super::init::init_matrix;
use ndarray::{s, Array1, Array2, Axis};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// LSTM layer processing a whole batch per time step
///
/// Gate pre-activations are `x · W_x + h · W_h + b`, with the `4 * hidden`
/// columns ordered input, forget, cell candidate, output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LstmLayer {
    pub input_size: usize,
    pub hidden_size: usize,
    /// [input_size, 4 * hidden_size]
    pub input_weights: Array2<f64>,
    /// [hidden_size, 4 * hidden_size]
    pub hidden_weights: Array2<f64>,
    /// [4 * hidden_size]
    pub biases: Array1<f64>,
}

/// Gradients of one [`LstmLayer`], same shapes as its parameters
#[derive(Debug, Clone)]
pub struct LstmGradients {
    pub input_weights: Array2<f64>,
    pub hidden_weights: Array2<f64>,
    pub biases: Array1<f64>,
}

/// Activations kept from the forward pass for the backward pass
#[derive(Debug, Clone)]
struct StepCache {
    x: Array2<f64>,
    h_prev: Array2<f64>,
    c_prev: Array2<f64>,
    i: Array2<f64>,
    f: Array2<f64>,
    g: Array2<f64>,
    o: Array2<f64>,
    tanh_c: Array2<f64>,
}

#[derive(Debug, Clone, Default)]
pub struct LstmCache {
    steps: Vec<StepCache>,
}

impl LstmCache {
    /// Number of cached time steps
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl LstmLayer {
    pub fn new<R: Rng + ?Sized>(
        input_size: usize,
        hidden_size: usize,
        init: WeightInit,
        rng: &mut R,
    ) -> Self {
        let gates = 4 * hidden_size;
        let mut biases = Array1::zeros(gates);
        // Forget gate starts open
        biases.slice_mut(s![hidden_size..2 * hidden_size]).fill(1.0);

        Self {
            input_size,
            hidden_size,
            input_weights: init_matrix(input_size, gates, init, rng),
            hidden_weights: init_matrix(hidden_size, gates, init, rng),
            biases,
        }
    }

    pub fn num_parameters(&self) -> usize {
        self.input_weights.len() + self.hidden_weights.len() + self.biases.len()
    }

    /// Runs the layer over a sequence of `[batch, input_size]` steps
    ///
    /// Returns the hidden state after every step and the cache needed by
    /// [`LstmLayer::backward`].
    pub fn forward(&self, inputs: &[Array2<f64>]) -> (Vec<Array2<f64>>, LstmCache) {
        let batch = inputs.first().map(|x| x.nrows()).unwrap_or(0);
        let hs = self.hidden_size;

        let mut h = Array2::zeros((batch, hs));
        let mut c = Array2::zeros((batch, hs));
        let mut outputs = Vec::with_capacity(inputs.len());
        let mut cache = LstmCache {
            steps: Vec::with_capacity(inputs.len()),
        };

        for x in inputs {
            let a = x.dot(&self.input_weights) + h.dot(&self.hidden_weights) + &self.biases;

            let i = sigmoid(&a.slice(s![.., 0..hs]).to_owned());
            let f = sigmoid(&a.slice(s![.., hs..2 * hs]).to_owned());
            let g = a.slice(s![.., 2 * hs..3 * hs]).mapv(f64::tanh);
            let o = sigmoid(&a.slice(s![.., 3 * hs..]).to_owned());

            let c_next = &f * &c + &i * &g;
            let tanh_c = c_next.mapv(f64::tanh);
            let h_next = &o * &tanh_c;

            cache.steps.push(StepCache {
                x: x.clone(),
                h_prev: h,
                c_prev: c,
                i,
                f,
                g,
                o,
                tanh_c,
            });

            outputs.push(h_next.clone());
            h = h_next;
            c = c_next;
        }

        (outputs, cache)
    }

    /// Backpropagation through time
    ///
    /// `d_outputs[t]` is the loss gradient arriving at the hidden output of
    /// step `t`. Returns parameter gradients and the gradient with respect
    /// to every input step.
    pub fn backward(
        &self,
        cache: &LstmCache,
        d_outputs: &[Array2<f64>],
    ) -> (LstmGradients, Vec<Array2<f64>>) {
        let hs = self.hidden_size;
        let batch = cache.steps.first().map(|s| s.x.nrows()).unwrap_or(0);

        let mut grads = LstmGradients {
            input_weights: Array2::zeros(self.input_weights.raw_dim()),
            hidden_weights: Array2::zeros(self.hidden_weights.raw_dim()),
            biases: Array1::zeros(self.biases.raw_dim()),
        };
        let mut d_inputs = Vec::with_capacity(cache.steps.len());
        let mut dh_next = Array2::<f64>::zeros((batch, hs));
        let mut dc_next = Array2::<f64>::zeros((batch, hs));

        for (step, d_out) in cache.steps.iter().zip(d_outputs).rev() {
            let dh = d_out + &dh_next;

            let d_o = &dh * &step.tanh_c;
            let dc = &dc_next + &(&dh * &step.o * &step.tanh_c.mapv(|v| 1.0 - v * v));
            let d_i = &dc * &step.g;
            let d_g = &dc * &step.i;
            let d_f = &dc * &step.c_prev;
            dc_next = &dc * &step.f;

            let mut da = Array2::zeros((batch, 4 * hs));
            da.slice_mut(s![.., 0..hs])
                .assign(&(d_i * &step.i.mapv(|v| v * (1.0 - v))));
            da.slice_mut(s![.., hs..2 * hs])
                .assign(&(d_f * &step.f.mapv(|v| v * (1.0 - v))));
            da.slice_mut(s![.., 2 * hs..3 * hs])
                .assign(&(d_g * &step.g.mapv(|v| 1.0 - v * v)));
            da.slice_mut(s![.., 3 * hs..])
                .assign(&(d_o * &step.o.mapv(|v| v * (1.0 - v))));

            grads.input_weights += &step.x.t().dot(&da);
            grads.hidden_weights += &step.h_prev.t().dot(&da);
            grads.biases += &da.sum_axis(Axis(0));

            d_inputs.push(da.dot(&self.input_weights.t()));
            dh_next = da.dot(&self.hidden_weights.t());
        }

        d_inputs.reverse();
        (grads, d_inputs)
    }
}

impl LstmGradients {
    pub fn squared_norm(&self) -> f64 {
        self.input_weights.iter().map(|g| g * g).sum::<f64>()
            + self.hidden_weights.iter().map(|g| g * g).sum::<f64>()
            + self.biases.iter().map(|g| g * g).sum::<f64>()
    }

    pub fn scale(&mut self, factor: f64) {
        self.input_weights *= factor;
        self.hidden_weights *= factor;
        self.biases *= factor;
    }
}

fn sigmoid(x: &Array2<f64>) -> Array2<f64> {
    x.mapv(|v| 1.0 / (1.0 + (-v).exp()))
}
