//! Optimization algorithms
//!
//! - Adam (Adaptive Moment Estimation), the default
//! - SGD with optional momentum
//!
//! Parameters are addressed by slot: the network hands every parameter
//! tensor to the optimizer under a stable index so per-tensor state
//! (moments, velocity) survives across steps.

use super::config::{ModelConfig, OptimizerKind};
use ndarray::{ArrayD, ArrayViewD, ArrayViewMutD, Zip};

/// Optimizer interface for weight updates
pub trait Optimizer: Send + Sync {
    /// Starts a new update step, called once per batch before any `update`
    fn begin_step(&mut self);

    /// Applies `grads` to `params`, both belonging to parameter slot `slot`
    fn update(&mut self, slot: usize, params: ArrayViewMutD<'_, f64>, grads: ArrayViewD<'_, f64>);

    /// Drops all accumulated state (for a new training run)
    fn reset(&mut self);

    fn clone_box(&self) -> Box<dyn Optimizer>;
}

/// Builds the optimizer selected in the configuration
pub fn from_config(config: &ModelConfig) -> Box<dyn Optimizer> {
    match config.optimizer {
        OptimizerKind::Adam => Box::new(
            Adam::new(config.learning_rate)
                .with_betas(config.beta1, config.beta2)
                .with_epsilon(config.epsilon),
        ),
        OptimizerKind::Sgd => Box::new(SGD::new(config.learning_rate).with_momentum(config.beta1)),
    }
}

/// Grows `slots` so that `slot` is addressable and returns it, initialized
/// to zeros shaped like `shape`
fn slot_state<'a>(slots: &'a mut Vec<Option<ArrayD<f64>>>, slot: usize, shape: &[usize]) -> &'a mut ArrayD<f64> {
    if slots.len() <= slot {
        slots.resize(slot + 1, None);
    }
    slots[slot].get_or_insert_with(|| ArrayD::zeros(shape))
}

/// Stochastic Gradient Descent with optional momentum
#[derive(Clone)]
pub struct SGD {
    pub learning_rate: f64,
    pub momentum: f64,
    velocity: Vec<Option<ArrayD<f64>>>,
}

impl SGD {
    pub fn new(learning_rate: f64) -> Self {
        Self {
            learning_rate,
            momentum: 0.0,
            velocity: Vec::new(),
        }
    }

    pub fn with_momentum(mut self, momentum: f64) -> Self {
        self.momentum = momentum;
        self
    }
}

impl Optimizer for SGD {
    fn begin_step(&mut self) {}

    fn update(&mut self, slot: usize, mut params: ArrayViewMutD<'_, f64>, grads: ArrayViewD<'_, f64>) {
        let lr = self.learning_rate;
        if self.momentum > 0.0 {
            let momentum = self.momentum;
            let v = slot_state(&mut self.velocity, slot, params.shape());
            Zip::from(&mut params).and(v).and(&grads).for_each(|p, v, &g| {
                *v = momentum * *v - lr * g;
                *p += *v;
            });
        } else {
            Zip::from(&mut params).and(&grads).for_each(|p, &g| *p -= lr * g);
        }
    }

    fn reset(&mut self) {
        self.velocity.clear();
    }

    fn clone_box(&self) -> Box<dyn Optimizer> {
        Box::new(self.clone())
    }
}

/// Adam optimizer (Adaptive Moment Estimation)
#[derive(Clone)]
pub struct Adam {
    pub learning_rate: f64,
    pub beta1: f64,
    pub beta2: f64,
    pub epsilon: f64,
    t: i32,
    m: Vec<Option<ArrayD<f64>>>,
    v: Vec<Option<ArrayD<f64>>>,
}

impl Adam {
    pub fn new(learning_rate: f64) -> Self {
        Self {
            learning_rate,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-7,
            t: 0,
            m: Vec::new(),
            v: Vec::new(),
        }
    }

    pub fn with_betas(mut self, beta1: f64, beta2: f64) -> Self {
        self.beta1 = beta1;
        self.beta2 = beta2;
        self
    }

    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    pub fn steps(&self) -> i32 {
        self.t
    }
}

impl Optimizer for Adam {
    fn begin_step(&mut self) {
        self.t += 1;
    }

    fn update(&mut self, slot: usize, mut params: ArrayViewMutD<'_, f64>, grads: ArrayViewD<'_, f64>) {
        let (beta1, beta2, eps) = (self.beta1, self.beta2, self.epsilon);
        let t = self.t.max(1);

        // Bias corrections folded into the step size
        let lr_t = self.learning_rate * (1.0 - beta2.powi(t)).sqrt() / (1.0 - beta1.powi(t));
        let v_correction = (1.0 - beta2.powi(t)).sqrt();

        let m = slot_state(&mut self.m, slot, params.shape());
        let v = slot_state(&mut self.v, slot, params.shape());

        Zip::from(&mut params)
            .and(m)
            .and(v)
            .and(&grads)
            .for_each(|p, m, v, &g| {
                *m = beta1 * *m + (1.0 - beta1) * g;
                *v = beta2 * *v + (1.0 - beta2) * g * g;
                *p -= lr_t * *m / (v.sqrt() + eps * v_correction);
            });
    }

    fn reset(&mut self) {
        self.t = 0;
        self.m.clear();
        self.v.clear();
    }

    fn clone_box(&self) -> Box<dyn Optimizer> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    #[test]
    fn test_sgd_update() {
        let mut optimizer = SGD::new(0.01);
        let mut weights = Array2::<f64>::ones((3, 2));
        let gradients = Array2::<f64>::ones((3, 2));
        optimizer.begin_step();
        optimizer.update(0, weights.view_mut().into_dyn(), gradients.view().into_dyn());

        assert!((weights[[0, 0]] - 0.99).abs() < 1e-10);
    }

    #[test]
    fn test_sgd_momentum_accumulates() {
        let mut optimizer = SGD::new(0.1).with_momentum(0.9);
        let mut w = Array2::<f64>::zeros((1, 1));
        let g = Array2::<f64>::ones((1, 1));
        for _ in 0..2 {
            optimizer.begin_step();
            optimizer.update(0, w.view_mut().into_dyn(), g.view().into_dyn());
        }
        // v1 = -0.1, v2 = -0.09 - 0.1
        assert!((w[[0, 0]] + 0.29).abs() < 1e-12);
    }

    #[test]
    fn test_adam_first_step_size() {
        let mut optimizer = Adam::new(0.001);
        let mut w = Array2::<f64>::ones((2, 2));
        let g = Array2::<f64>::from_elem((2, 2), 5.0);
        optimizer.begin_step();
        optimizer.update(0, w.view_mut().into_dyn(), g.view().into_dyn());

        // The first bias-corrected Adam step moves by ~learning_rate
        assert!((w[[0, 0]] - 0.999).abs() < 1e-6);
        assert_eq!(optimizer.steps(), 1);
    }

    #[test]
    fn test_adam_slots_are_independent() {
        let mut optimizer = Adam::new(0.01);
        let mut a = Array2::<f64>::zeros((1, 2));
        let mut b = Array2::<f64>::zeros((3, 1));
        let ga = Array2::<f64>::ones((1, 2));
        let gb = Array2::<f64>::from_elem((3, 1), -1.0);

        for _ in 0..10 {
            optimizer.begin_step();
            optimizer.update(0, a.view_mut().into_dyn(), ga.view().into_dyn());
            optimizer.update(1, b.view_mut().into_dyn(), gb.view().into_dyn());
        }

        assert!(a.iter().all(|&v| v < 0.0));
        assert!(b.iter().all(|&v| v > 0.0));

        optimizer.reset();
        assert_eq!(optimizer.steps(), 0);
    }

    #[test]
    fn test_from_config() {
        let config = ModelConfig::default();
        let mut optimizer = from_config(&config);
        let mut w = Array2::<f64>::ones((1, 1));
        let g = Array2::<f64>::ones((1, 1));
        optimizer.begin_step();
        optimizer.update(0, w.view_mut().into_dyn(), g.view().into_dyn());
        assert!(w[[0, 0]] < 1.0);
    }
}
