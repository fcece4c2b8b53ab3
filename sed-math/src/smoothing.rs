//! 1D Gaussian smoothing.
//!
//! The filter matches the conventional `gaussian_filter1d` behaviour: a
//! normalized kernel truncated at `4σ` and "reflect" boundary handling
//! (`d c b a | a b c d | d c b a`), which keeps the sum of a smoothed signal
//! close to the sum of the input away from strong edge gradients.

/// Kernel half-width in units of sigma.
pub const DEFAULT_TRUNCATE: f64 = 4.0;

/// Create a normalized 1D Gaussian kernel.
///
/// # Arguments
/// * `sigma` - Standard deviation in samples (must be positive)
/// * `truncate` - Kernel radius in units of sigma
///
/// # Returns
/// Kernel of length `2 * radius + 1` with `radius = round(truncate * sigma)`,
/// summing to one.
pub fn gaussian_kernel1d(sigma: f64, truncate: f64) -> Vec<f64> {
    assert!(sigma > 0.0, "Gaussian sigma must be positive");

    let radius = (truncate * sigma + 0.5) as isize;
    let mut kernel: Vec<f64> = (-radius..=radius)
        .map(|i| (-0.5 * (i * i) as f64 / (sigma * sigma)).exp())
        .collect();

    let sum: f64 = kernel.iter().sum();
    if sum > 0.0 {
        kernel.iter_mut().for_each(|v| *v /= sum);
    }
    kernel
}

/// Map an out-of-range index back into `[0, n)` with reflect semantics.
fn reflect_index(mut i: isize, n: isize) -> usize {
    let period = 2 * n;
    i = i.rem_euclid(period);
    if i >= n {
        i = period - i - 1;
    }
    i as usize
}

/// Smooth `data` with a Gaussian of width `sigma` samples.
///
/// `sigma <= 0` returns the input unchanged.
pub fn gaussian_filter1d(data: &[f64], sigma: f64) -> Vec<f64> {
    if sigma <= 0.0 || data.is_empty() {
        return data.to_vec();
    }

    let kernel = gaussian_kernel1d(sigma, DEFAULT_TRUNCATE);
    let radius = (kernel.len() / 2) as isize;
    let n = data.len() as isize;

    (0..n)
        .map(|i| {
            kernel
                .iter()
                .enumerate()
                .map(|(k, w)| w * data[reflect_index(i + k as isize - radius, n)])
                .sum()
        })
        .collect()
}
