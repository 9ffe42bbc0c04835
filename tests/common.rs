/// Shared helpers for the integration tests.
use ndarray::{Array2, ArrayView1};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, StandardNormal};

#[allow(unused)]
/// `[n_ch, n_t]` standard-normal samples from a fixed seed.
pub fn gaussian_signal(n_ch: usize, n_t: usize, seed: u64) -> Array2<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    Array2::from_shape_simple_fn((n_ch, n_t), || StandardNormal.sample(&mut rng))
}

#[allow(unused)]
/// Sum of unit sines, one column per sample at `sfreq` Hz.
pub fn sines(freqs_hz: &[f64], n_t: usize, sfreq: f64) -> Vec<f64> {
    (0..n_t)
        .map(|i| {
            let t = i as f64 / sfreq;
            freqs_hz
                .iter()
                .map(|f| (2.0 * std::f64::consts::PI * f * t).sin())
                .sum()
        })
        .collect()
}

#[allow(unused)]
/// Population mean and standard deviation of one row.
pub fn mean_std(row: ArrayView1<f64>) -> (f64, f64) {
    let n = row.len() as f64;
    let mean = row.sum() / n;
    let var = row.iter().map(|&v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, var.sqrt())
}

#[allow(unused)]
/// Maximum absolute difference between two slices.
pub fn max_abs_diff(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).abs()).fold(0.0_f64, f64::max)
}

#[allow(unused)]
/// Root-mean-square of a slice.
pub fn rms(x: &[f64]) -> f64 {
    (x.iter().map(|v| v * v).sum::<f64>() / x.len() as f64).sqrt()
}
