//! Fully connected output layer

use super::config::WeightInit;
use super::init::init_matrix;
use ndarray::{Array1, Array2, Axis};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Linear layer `y = x · W + b`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dense {
    /// [input_size, output_size]
    pub weights: Array2<f64>,
    pub biases: Array1<f64>,
}

#[derive(Debug, Clone)]
pub struct DenseGradients {
    pub weights: Array2<f64>,
    pub biases: Array1<f64>,
}

impl Dense {
    pub fn new<R: Rng + ?Sized>(
        input_size: usize,
        output_size: usize,
        init: WeightInit,
        rng: &mut R,
    ) -> Self {
        Self {
            weights: init_matrix(input_size, output_size, init, rng),
            biases: Array1::zeros(output_size),
        }
    }

    pub fn input_size(&self) -> usize {
        self.weights.nrows()
    }

    pub fn output_size(&self) -> usize {
        self.weights.ncols()
    }

    pub fn num_parameters(&self) -> usize {
        self.weights.len() + self.biases.len()
    }

    /// Forward pass for a `[batch, input_size]` input
    pub fn forward(&self, input: &Array2<f64>) -> Array2<f64> {
        input.dot(&self.weights) + &self.biases
    }

    /// Returns parameter gradients and the gradient with respect to `input`
    pub fn backward(&self, input: &Array2<f64>, d_output: &Array2<f64>) -> (DenseGradients, Array2<f64>) {
        let grads = DenseGradients {
            weights: input.t().dot(d_output),
            biases: d_output.sum_axis(Axis(0)),
        };
        let d_input = d_output.dot(&self.weights.t());
        (grads, d_input)
    }
}

impl DenseGradients {
    pub fn squared_norm(&self) -> f64 {
        self.weights.iter().map(|g| g * g).sum::<f64>() + self.biases.iter().map(|g| g * g).sum::<f64>()
    }

    pub fn scale(&mut self, factor: f64) {
        self.weights *= factor;
        self.biases *= factor;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_forward_and_backward() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut dense = Dense::new(2, 1, WeightInit::GlorotNormal, &mut rng);
        dense.weights = array![[2.0], [-1.0]];
        dense.biases = array![0.5];

        let x = array![[1.0, 1.0], [3.0, 2.0]];
        let y = dense.forward(&x);
        assert_eq!(y, array![[1.5], [4.5]]);

        let (grads, d_x) = dense.backward(&x, &array![[1.0], [1.0]]);
        assert_eq!(grads.weights, array![[4.0], [3.0]]);
        assert_eq!(grads.biases, array![2.0]);
        assert_eq!(d_x, array![[2.0, -1.0], [2.0, -1.0]]);
        assert_eq!(dense.num_parameters(), 3);
    }
}
