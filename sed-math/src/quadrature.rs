//! Quadrature rules and grid constructors.

/// `n` evenly spaced points from `start` to `stop` inclusive.
pub fn linspace(start: f64, stop: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (stop - start) / (n - 1) as f64;
            (0..n)
                .map(|i| if i == n - 1 { stop } else { start + i as f64 * step })
                .collect()
        }
    }
}

/// Values `start, start + step, ...` strictly below `stop`.
///
/// Points are computed as `start + i * step` to avoid accumulating
/// rounding error over long grids.
pub fn arange(start: f64, stop: f64, step: f64) -> Vec<f64> {
    assert!(step > 0.0, "arange step must be positive");
    if stop <= start {
        return Vec::new();
    }
    let n = ((stop - start) / step).ceil() as usize;
    (0..n)
        .map(|i| start + i as f64 * step)
        .filter(|&v| v < stop)
        .collect()
}

/// Trapezoidal integral of tabulated samples.
pub fn trapezoid(x: &[f64], y: &[f64]) -> f64 {
    assert_eq!(x.len(), y.len(), "X and Y vectors must have same length");
    x.windows(2)
        .zip(y.windows(2))
        .map(|(xw, yw)| 0.5 * (yw[0] + yw[1]) * (xw[1] - xw[0]))
        .sum()
}

/// Composite Simpson integral of `f` over `[a, b]` with `intervals`
/// sub-intervals (rounded up to the next even number).
pub fn simpson<F>(f: F, a: f64, b: f64, intervals: usize) -> f64
where
    F: Fn(f64) -> f64,
{
    let n = (intervals.max(2) + 1) & !1;
    let h = (b - a) / n as f64;

    let mut sum = f(a) + f(b);
    for i in 1..n {
        let weight = if i % 2 == 1 { 4.0 } else { 2.0 };
        sum += weight * f(a + i as f64 * h);
    }
    sum * h / 3.0
}
