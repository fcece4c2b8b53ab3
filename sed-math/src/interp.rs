//! Linear interpolation on tabulated 1D data.
//!
//! Two flavours are provided:
//!
//! - [`interp`]: a validated one-shot lookup that refuses to extrapolate
//! - [`LinearInterpolant`]: a validated table that extends its first and last
//!   segments linearly outside the tabulated range (degree-1 spline semantics)

use thiserror::Error;

/// Errors that can occur during interpolation operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InterpError {
    #[error("Value {0} is out of bounds for interpolation range [{1}, {2}]")]
    OutOfBounds(f64, f64, f64),
    #[error("Input vectors must have at least 2 points")]
    InsufficientData,
    #[error("Input vectors must have the same length")]
    MismatchedLengths,
    #[error("X values must be sorted in ascending order")]
    UnsortedData,
}

pub(crate) fn validate(xs: &[f64], ys: &[f64]) -> Result<(), InterpError> {
    if xs.len() != ys.len() {
        return Err(InterpError::MismatchedLengths);
    }
    if xs.len() < 2 {
        return Err(InterpError::InsufficientData);
    }
    if xs.windows(2).any(|w| w[1] <= w[0]) {
        return Err(InterpError::UnsortedData);
    }
    Ok(())
}

/// Performs linear interpolation on 1D data using binary search.
///
/// # Arguments
///
/// * `x` - The x-coordinate at which to interpolate
/// * `xs` - Array of x-coordinates (strictly ascending)
/// * `ys` - Array of corresponding y-values
///
/// # Returns
///
/// * `Ok(f64)` - The interpolated y-value at position x
/// * `Err(InterpError)` - Mismatched/short/unsorted input, or x outside
///   `[xs[0], xs[n-1]]`
///
/// # Examples
///
/// ```rust
/// use sed_math::interp::interp;
///
/// let xs = vec![0.0, 1.0, 2.0, 3.0];
/// let ys = vec![0.0, 2.0, 4.0, 6.0];
/// assert_eq!(interp(1.5, &xs, &ys).unwrap(), 3.0);
/// assert!(interp(4.0, &xs, &ys).is_err());
/// ```
pub fn interp(x: f64, xs: &[f64], ys: &[f64]) -> Result<f64, InterpError> {
    validate(xs, ys)?;

    if x < xs[0] || x > xs[xs.len() - 1] {
        return Err(InterpError::OutOfBounds(x, xs[0], xs[xs.len() - 1]));
    }

    Ok(lerp_segment(xs, ys, segment_index(xs, x), x))
}

/// Index `i` of the segment `[xs[i], xs[i+1]]` used for `x`, clamped to the
/// first/last segment outside the table.
pub(crate) fn segment_index(xs: &[f64], x: f64) -> usize {
    // partition_point returns the index of the first element > x
    let idx = xs.partition_point(|&val| val <= x);
    idx.saturating_sub(1).min(xs.len() - 2)
}

fn lerp_segment(xs: &[f64], ys: &[f64], i: usize, x: f64) -> f64 {
    let t = (x - xs[i]) / (xs[i + 1] - xs[i]);
    ys[i] + t * (ys[i + 1] - ys[i])
}

/// Piecewise-linear interpolant that extrapolates linearly.
///
/// Mirrors a degree-1 interpolating spline: exact at the knots, linear
/// between them, and continuing the end segments beyond the table.
#[derive(Debug, Clone)]
pub struct LinearInterpolant {
    xs: Vec<f64>,
    ys: Vec<f64>,
}

impl LinearInterpolant {
    /// Build an interpolant, validating the table once.
    pub fn new(xs: Vec<f64>, ys: Vec<f64>) -> Result<Self, InterpError> {
        validate(&xs, &ys)?;
        Ok(Self { xs, ys })
    }

    /// Evaluate at `x`, extrapolating outside the tabulated range.
    pub fn evaluate(&self, x: f64) -> f64 {
        lerp_segment(&self.xs, &self.ys, segment_index(&self.xs, x), x)
    }

    /// Tabulated range `(x_min, x_max)`.
    pub fn domain(&self) -> (f64, f64) {
        (self.xs[0], self.xs[self.xs.len() - 1])
    }
}
