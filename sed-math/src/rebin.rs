//! Edge-aware rebinning of sampled densities.
//!
//! [`trapz_rebin`] treats `y(x)` as a piecewise-linear density and returns
//! its exact average over each output bin. Because the integral is computed
//! segment by segment (with the bin edges interpolated onto the input
//! segments), the total `Σ width · value` over bins that lie inside the
//! input range equals the trapezoidal integral of the input.

use thiserror::Error;

/// Errors that can occur while rebinning.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RebinError {
    #[error("Input x and y must have the same length (got {0} and {1})")]
    MismatchedLengths(usize, usize),
    #[error("Need at least 2 input samples and 2 bin edges")]
    InsufficientData,
    #[error("Input x values must be strictly ascending")]
    UnsortedInput,
    #[error("Bin edges must be strictly ascending")]
    UnsortedEdges,
    #[error("Bin [{lower}, {upper}] does not overlap input range [{min}, {max}]")]
    BinOutsideInput {
        lower: f64,
        upper: f64,
        min: f64,
        max: f64,
    },
}

/// Index of the bin containing each value, numpy `digitize` style.
///
/// Returns `i` such that `edges[i-1] <= value < edges[i]`; `0` below the
/// first edge and `edges.len()` at or above the last.
///
/// ```rust
/// use sed_math::digitize;
///
/// let edges = [0.0, 1.0, 2.0];
/// assert_eq!(digitize(0.5, &edges), 1);
/// assert_eq!(digitize(1.0, &edges), 2);
/// assert_eq!(digitize(-1.0, &edges), 0);
/// assert_eq!(digitize(2.0, &edges), 3);
/// ```
pub fn digitize(value: f64, edges: &[f64]) -> usize {
    edges.partition_point(|&e| e <= value)
}

/// Bin edges for a set of bin centers: midpoints between neighbours plus
/// outer edges placed half a spacing beyond the first and last center.
pub fn centers_to_edges(centers: &[f64]) -> Vec<f64> {
    let n = centers.len();
    if n == 0 {
        return Vec::new();
    }
    if n == 1 {
        return vec![centers[0] - 0.5, centers[0] + 0.5];
    }

    let mut edges = Vec::with_capacity(n + 1);
    edges.push(centers[0] - 0.5 * (centers[1] - centers[0]));
    for w in centers.windows(2) {
        edges.push(0.5 * (w[0] + w[1]));
    }
    edges.push(centers[n - 1] + 0.5 * (centers[n - 1] - centers[n - 2]));
    edges
}

fn lerp(x: &[f64], y: &[f64], i: usize, at: f64) -> f64 {
    y[i] + (at - x[i]) * (y[i + 1] - y[i]) / (x[i + 1] - x[i])
}

/// Average of the piecewise-linear density `y(x)` over each bin.
///
/// # Arguments
/// * `x` - Input sample positions (strictly ascending)
/// * `y` - Density values at `x`
/// * `edges` - Output bin edges (strictly ascending)
///
/// # Returns
/// One value per bin: the integral of `y` over the bin divided by the
/// covered bin width. Bins that only partially overlap the input range are
/// averaged over the overlap; bins entirely outside it are an error.
pub fn trapz_rebin(x: &[f64], y: &[f64], edges: &[f64]) -> Result<Vec<f64>, RebinError> {
    if x.len() != y.len() {
        return Err(RebinError::MismatchedLengths(x.len(), y.len()));
    }
    if x.len() < 2 || edges.len() < 2 {
        return Err(RebinError::InsufficientData);
    }
    if x.windows(2).any(|w| w[1] <= w[0]) {
        return Err(RebinError::UnsortedInput);
    }
    if edges.windows(2).any(|w| w[1] <= w[0]) {
        return Err(RebinError::UnsortedEdges);
    }

    let x_min = x[0];
    let x_max = x[x.len() - 1];
    let last_segment = x.len() - 2;

    let mut out = Vec::with_capacity(edges.len() - 1);
    let mut j = 0;

    for w in edges.windows(2) {
        let lo = w[0].max(x_min);
        let hi = w[1].min(x_max);
        if hi <= lo {
            return Err(RebinError::BinOutsideInput {
                lower: w[0],
                upper: w[1],
                min: x_min,
                max: x_max,
            });
        }

        // advance to the segment containing lo
        while j < last_segment && x[j + 1] <= lo {
            j += 1;
        }

        let mut area = 0.0;
        let mut k = j;
        let mut left = lo;
        let mut y_left = lerp(x, y, k, lo);
        loop {
            let seg_end = x[k + 1];
            if hi <= seg_end || k == last_segment {
                let y_right = lerp(x, y, k, hi);
                area += 0.5 * (y_left + y_right) * (hi - left);
                break;
            }
            area += 0.5 * (y_left + y[k + 1]) * (seg_end - left);
            left = seg_end;
            y_left = y[k + 1];
            k += 1;
        }

        out.push(area / (hi - lo));
    }

    Ok(out)
}
