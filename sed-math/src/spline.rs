//! Interpolating cubic spline with not-a-knot end conditions.
//!
//! The third derivative is continuous across the second and the
//! second-to-last knots, so the first two and last two segments each share
//! one cubic. Any cubic polynomial is reproduced exactly. Outside the knot
//! range the end polynomials are continued.
//!
//! Used for the cosmology tables (age(z), z(age), luminosity distance) and
//! for degree-3 interpolation of star-formation basis vectors.
//!
//! # Examples
//!
//! ```rust
//! use sed_math::spline::CubicSpline;
//!
//! let x = vec![0.0, 1.0, 2.0, 3.0];
//! let y = vec![0.0, 1.0, 8.0, 27.0];
//! let spline = CubicSpline::new(x, y).unwrap();
//!
//! assert!((spline.evaluate(1.5) - 3.375).abs() < 1e-12);
//! assert!((spline.evaluate(4.0) - 64.0).abs() < 1e-9);
//! ```

use crate::interp::{segment_index, validate, InterpError};

#[derive(Debug, Clone)]
pub struct CubicSpline {
    x: Vec<f64>,
    /// `[a, b, c, d]` of `a + b·t + c·t² + d·t³` with `t = x - x[i]`
    coeffs: Vec<[f64; 4]>,
}

impl CubicSpline {
    /// Fit the spline through `(x, y)`.
    ///
    /// Two points give a straight line and three give the interpolating
    /// parabola.
    ///
    /// # Errors
    /// Mismatched lengths, fewer than two points, or `x` not strictly
    /// increasing.
    pub fn new(x: Vec<f64>, y: Vec<f64>) -> Result<Self, InterpError> {
        validate(&x, &y)?;
        let moments = second_derivatives(&x, &y);

        let coeffs = (0..x.len() - 1)
            .map(|i| {
                let h = x[i + 1] - x[i];
                let (m0, m1) = (moments[i], moments[i + 1]);
                let slope = (y[i + 1] - y[i]) / h - h * (2.0 * m0 + m1) / 6.0;
                [y[i], slope, 0.5 * m0, (m1 - m0) / (6.0 * h)]
            })
            .collect();

        Ok(Self { x, coeffs })
    }

    /// Value at `x`, continuing the end cubics outside the knot range.
    pub fn evaluate(&self, x: f64) -> f64 {
        let i = segment_index(&self.x, x);
        let t = x - self.x[i];
        let [a, b, c, d] = self.coeffs[i];
        a + t * (b + t * (c + t * d))
    }

    /// Knot range `(x_min, x_max)`.
    pub fn domain(&self) -> (f64, f64) {
        (self.x[0], self.x[self.x.len() - 1])
    }
}

/// Second derivative at every knot.
fn second_derivatives(x: &[f64], y: &[f64]) -> Vec<f64> {
    let n = x.len();
    let h: Vec<f64> = x.windows(2).map(|w| w[1] - w[0]).collect();
    let slopes: Vec<f64> = y
        .windows(2)
        .zip(&h)
        .map(|(w, hi)| (w[1] - w[0]) / hi)
        .collect();

    match n {
        2 => return vec![0.0; 2],
        3 => return vec![2.0 * (slopes[1] - slopes[0]) / (h[0] + h[1]); 3],
        _ => {}
    }

    // Interior rows h[i-1]·M[i-1] + 2(h[i-1]+h[i])·M[i] + h[i]·M[i+1] = r[i],
    // with M[0] and M[n-1] eliminated through the not-a-knot conditions.
    let m = n - 2;
    let mut lower = vec![0.0; m];
    let mut diag = vec![0.0; m];
    let mut upper = vec![0.0; m];
    let mut rhs = vec![0.0; m];
    for k in 0..m {
        let i = k + 1;
        lower[k] = h[i - 1];
        diag[k] = 2.0 * (h[i - 1] + h[i]);
        upper[k] = h[i];
        rhs[k] = 6.0 * (slopes[i] - slopes[i - 1]);
    }

    let (h0, h1) = (h[0], h[1]);
    diag[0] = (h0 + h1) * (h0 + 2.0 * h1) / h1;
    upper[0] = (h1 - h0) * (h1 + h0) / h1;

    let (a, b) = (h[n - 3], h[n - 2]);
    lower[m - 1] = (a - b) * (a + b) / a;
    diag[m - 1] = (a + b) * (2.0 * a + b) / a;

    let interior = solve_tridiagonal(&lower, &diag, &upper, &rhs);

    let mut moments = Vec::with_capacity(n);
    moments.push(((h0 + h1) * interior[0] - h0 * interior[1]) / h1);
    moments.extend_from_slice(&interior);
    moments.push(((a + b) * interior[m - 1] - b * interior[m - 2]) / a);
    moments
}

/// Thomas algorithm. `lower[0]` and `upper[n-1]` are ignored.
fn solve_tridiagonal(lower: &[f64], diag: &[f64], upper: &[f64], rhs: &[f64]) -> Vec<f64> {
    let n = diag.len();
    let mut c = vec![0.0; n];
    let mut d = vec![0.0; n];
    c[0] = upper[0] / diag[0];
    d[0] = rhs[0] / diag[0];
    for i in 1..n {
        let denom = diag[i] - lower[i] * c[i - 1];
        c[i] = upper[i] / denom;
        d[i] = (rhs[i] - lower[i] * d[i - 1]) / denom;
    }

    let mut out = d;
    for i in (0..n - 1).rev() {
        out[i] -= c[i] * out[i + 1];
    }
    out
}
