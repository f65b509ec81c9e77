//! Execution backend capability probe

use log::info;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::thread;
use std::time::Instant;

/// What the numeric backend can do
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendInfo {
    /// Hardware acceleration (GPU or similar) is available
    pub accelerated: bool,
    /// Human-readable backend description
    pub description: String,
    /// Worker threads available to the process
    pub threads: usize,
}

/// Reports which backend training will run on
pub trait CapabilityProbe {
    fn probe(&self) -> BackendInfo;
}

/// Probe for the ndarray CPU backend
#[derive(Debug, Clone, Copy, Default)]
pub struct CpuProbe;

impl CapabilityProbe for CpuProbe {
    fn probe(&self) -> BackendInfo {
        let threads = thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
        BackendInfo {
            accelerated: false,
            description: "CPU (ndarray)".to_string(),
            threads,
        }
    }
}

/// Timing of a square matrix multiplication
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkResult {
    pub size: usize,
    pub elapsed_ms: f64,
    /// Floating point throughput, `2 * size^3 / elapsed`
    pub gflops: f64,
}

/// Multiplies two `size x size` matrices and times it
pub fn benchmark_matmul(size: usize) -> BenchmarkResult {
    let a = Array2::from_shape_fn((size, size), |(i, j)| ((i * size + j) % 7) as f64 * 0.1);
    let b = Array2::from_shape_fn((size, size), |(i, j)| ((i + j) % 5) as f64 * 0.2);

    let started = Instant::now();
    let c = a.dot(&b);
    let elapsed = started.elapsed().as_secs_f64();
    // keep the product observable
    let checksum = c.sum();

    let flops = 2.0 * (size as f64).powi(3);
    let gflops = if elapsed > 0.0 { flops / elapsed / 1e9 } else { 0.0 };
    let result = BenchmarkResult {
        size,
        elapsed_ms: elapsed * 1000.0,
        gflops,
    };
    info!(
        "Matmul {}x{}: {:.2} ms ({:.2} GFLOP/s, checksum {:.1})",
        size, size, result.elapsed_ms, gflops, checksum
    );
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cpu_probe() {
        let info = CpuProbe.probe();
        assert!(!info.accelerated);
        assert!(info.threads >= 1);
        assert!(info.description.contains("CPU"));
    }

    #[test]
    fn test_benchmark_reports_size() {
        let result = benchmark_matmul(32);
        assert_eq!(result.size, 32);
        assert!(result.elapsed_ms >= 0.0);
        assert!(result.gflops >= 0.0);
    }
}
