//! Input transforms between model parameters and emulator inputs.

use crate::error::{ModelError, ModelResult};
use crate::params::{Theta, SIMPLEX_TOLERANCE};

/// Floor applied to stick-breaking denominators
const STICK_FLOOR: f64 = 1e-8;

/// Map four simplex coefficients to three stick-breaking ratios.
///
/// ```text
/// t0 = 1 - b1
/// t1 = 1 - b2 / t0
/// t2 = 1 - b3 / (t0 · t1)
/// ```
///
/// Denominators are floored at `1e-8` so that corners of the simplex
/// (e.g. `b3 = b4 = 0`) map to finite ratios.
pub fn stick_breaking(beta: &[f64; 4]) -> ModelResult<[f64; 3]> {
    let sum: f64 = beta.iter().sum();
    if (sum - 1.0).abs() > SIMPLEX_TOLERANCE || beta.iter().any(|&b| b < 0.0) {
        return Err(ModelError::precondition(format!(
            "SFH basis coefficients must be non-negative and sum to 1 (got {beta:?})"
        )));
    }

    let t0 = (1.0 - beta[0]).max(STICK_FLOOR);
    let t1 = 1.0 - beta[1] / t0;
    let t2 = 1.0 - beta[2] / (t0 * t1).max(STICK_FLOOR);

    let ratios = [t0, t1, t2];
    if ratios.iter().any(|r| !r.is_finite()) {
        return Err(ModelError::precondition(format!(
            "stick-breaking transform of {beta:?} is not finite"
        )));
    }
    Ok(ratios)
}

/// Inverse of [`stick_breaking`] for ratios away from the floor.
pub fn simplex_from_sticks(t: &[f64; 3]) -> [f64; 4] {
    let b1 = 1.0 - t[0];
    let b2 = t[0] * (1.0 - t[1]);
    let b3 = t[0] * t[1] * (1.0 - t[2]);
    [b1, b2, b3, 1.0 - b1 - b2 - b3]
}

/// Nine continuous-emulator inputs:
/// `[t0, t1, t2, gamma1, gamma2, dust1, dust2, dust_index, zred]`.
pub fn continuous_inputs(theta: &Theta, zred: f64) -> ModelResult<Vec<f64>> {
    let sticks = stick_breaking(&theta.beta)?;
    let mut x = Vec::with_capacity(9);
    x.extend_from_slice(&sticks);
    x.extend_from_slice(&theta.gamma);
    x.extend_from_slice(&[theta.dust1, theta.dust2, theta.dust_index, zred]);
    Ok(x)
}

/// Four burst-emulator inputs: `[log10 tburst, log10 zburst, dust2, dust_index]`.
pub fn burst_inputs(theta: &Theta, tburst: f64, zburst: f64) -> Vec<f64> {
    vec![
        tburst.log10(),
        zburst.log10(),
        theta.dust2,
        theta.dust_index,
    ]
}
