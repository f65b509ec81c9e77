//! Sliding-window dataset construction

use ndarray::{s, Array2, Array3, ArrayView1, Axis};

/// Windows of normalized values paired with the value that follows each one
///
/// Inputs are shaped `[samples, window_size, 1]` (one feature per step),
/// targets `[samples, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowDataset {
    pub inputs: Array3<f64>,
    pub targets: Array2<f64>,
    pub window_size: usize,
}

impl WindowDataset {
    /// Slides a window of `window_size` over `values` with stride 1
    ///
    /// A series of length `n` yields `n - window_size` examples. When
    /// `n <= window_size` (or `window_size == 0`) the dataset is empty.
    pub fn build(values: &[f64], window_size: usize) -> Self {
        let n_samples = if window_size == 0 {
            0
        } else {
            values.len().saturating_sub(window_size)
        };

        let mut inputs = Array3::zeros((n_samples, window_size, 1));
        let mut targets = Array2::zeros((n_samples, 1));

        for i in 0..n_samples {
            for t in 0..window_size {
                inputs[[i, t, 0]] = values[i + t];
            }
            targets[[i, 0]] = values[i + window_size];
        }

        Self {
            inputs,
            targets,
            window_size,
        }
    }

    pub fn len(&self) -> usize {
        self.inputs.shape()[0]
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The `i`-th input window
    pub fn window(&self, i: usize) -> ArrayView1<'_, f64> {
        self.inputs.slice(s![i, .., 0])
    }

    pub fn target(&self, i: usize) -> f64 {
        self.targets[[i, 0]]
    }

    /// Splits off the final `fraction` of examples, in chronological order,
    /// as a validation set
    ///
    /// The training part keeps `floor(n * (1 - fraction))` examples. If that
    /// would leave no training data the validation part is empty instead.
    pub fn split_validation(&self, fraction: f64) -> (WindowDataset, WindowDataset) {
        let n = self.len();
        let fraction = fraction.clamp(0.0, 1.0);
        let mut split_at = (n as f64 * (1.0 - fraction)).floor() as usize;
        if split_at == 0 {
            split_at = n;
        }

        let train = Self {
            inputs: self.inputs.slice(s![..split_at, .., ..]).to_owned(),
            targets: self.targets.slice(s![..split_at, ..]).to_owned(),
            window_size: self.window_size,
        };
        let validation = Self {
            inputs: self.inputs.slice(s![split_at.., .., ..]).to_owned(),
            targets: self.targets.slice(s![split_at.., ..]).to_owned(),
            window_size: self.window_size,
        };
        (train, validation)
    }

    /// Gathers the examples at `indices` into a batch
    pub fn select(&self, indices: &[usize]) -> (Array3<f64>, Array2<f64>) {
        (
            self.inputs.select(Axis(0), indices),
            self.targets.select(Axis(0), indices),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_count() {
        let values: Vec<f64> = (0..20).map(|v| v as f64).collect();
        for w in 1..20 {
            assert_eq!(WindowDataset::build(&values, w).len(), 20 - w);
        }
        assert!(WindowDataset::build(&values, 20).is_empty());
        assert!(WindowDataset::build(&values, 25).is_empty());
        assert!(WindowDataset::build(&values, 0).is_empty());
    }

    #[test]
    fn test_single_example_layout() {
        let values = [10.0, 11.0, 12.0, 13.0, 14.0, 15.0, 16.0, 17.0];
        let dataset = WindowDataset::build(&values, 7);

        assert_eq!(dataset.len(), 1);
        assert_eq!(dataset.inputs.shape(), &[1, 7, 1]);
        assert_eq!(dataset.window(0).to_vec(), values[..7].to_vec());
        assert_eq!(dataset.target(0), 17.0);
    }

    #[test]
    fn test_build_is_deterministic() {
        let values: Vec<f64> = (0..30).map(|v| (v as f64 * 0.3).sin()).collect();
        assert_eq!(WindowDataset::build(&values, 5), WindowDataset::build(&values, 5));
    }

    #[test]
    fn test_validation_split_is_chronological() {
        let values: Vec<f64> = (0..107).map(|v| v as f64).collect();
        let dataset = WindowDataset::build(&values, 7);
        let (train, val) = dataset.split_validation(0.1);

        assert_eq!(train.len(), 90);
        assert_eq!(val.len(), 10);
        assert_eq!(val.target(0), 97.0);
        assert_eq!(train.target(89), 96.0);
    }

    #[test]
    fn test_validation_split_never_empties_training() {
        let dataset = WindowDataset::build(&[1.0, 2.0, 3.0], 2);
        let (train, val) = dataset.split_validation(0.1);
        assert_eq!(train.len(), 1);
        assert!(val.is_empty());
    }

    #[test]
    fn test_select_batch() {
        let values: Vec<f64> = (0..10).map(|v| v as f64).collect();
        let dataset = WindowDataset::build(&values, 3);
        let (x, y) = dataset.select(&[4, 0]);
        assert_eq!(x.shape(), &[2, 3, 1]);
        assert_eq!(y[[0, 0]], 7.0);
        assert_eq!(y[[1, 0]], 3.0);
    }
}
