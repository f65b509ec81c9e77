//! Weight initialization

use super::config::WeightInit;
use ndarray::Array2;
use ndarray_rand::rand_distr::{Normal, Uniform};
use ndarray_rand::RandomExt;
use rand::Rng;

/// Initializes a `[rows, cols]` matrix with `rows` as fan-in and `cols` as fan-out
pub fn init_matrix<R: Rng + ?Sized>(
    rows: usize,
    cols: usize,
    init: WeightInit,
    rng: &mut R,
) -> Array2<f64> {
    let fan_sum = (rows + cols).max(1) as f64;

    match init {
        WeightInit::GlorotNormal => match Normal::new(0.0, (2.0 / fan_sum).sqrt()) {
            Ok(dist) => Array2::random_using((rows, cols), dist, rng),
            Err(_) => Array2::zeros((rows, cols)),
        },
        WeightInit::GlorotUniform => {
            let limit = (6.0 / fan_sum).sqrt();
            Array2::random_using((rows, cols), Uniform::new(-limit, limit), rng)
        }
        WeightInit::Uniform { low, high } if low < high => {
            Array2::random_using((rows, cols), Uniform::new(low, high), rng)
        }
        WeightInit::Uniform { low, .. } => Array2::from_elem((rows, cols), low),
    }
}
