//! Parameter schema and parsed parameter vectors.
//!
//! A model takes rows of 10 parameters (no burst) or 12 parameters (with a
//! starburst). [`ParameterSchema`] fixes the column order and
//! [`Theta`] is the parsed, named view of one row.

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};

/// Column names without a starburst
pub const NMF_PARAMETERS: [&str; 10] = [
    "logmstar",
    "beta1_sfh",
    "beta2_sfh",
    "beta3_sfh",
    "beta4_sfh",
    "gamma1_zh",
    "gamma2_zh",
    "dust1",
    "dust2",
    "dust_index",
];

/// Column names with a starburst
pub const NMF_BURST_PARAMETERS: [&str; 12] = [
    "logmstar",
    "beta1_sfh",
    "beta2_sfh",
    "beta3_sfh",
    "beta4_sfh",
    "fburst",
    "tburst",
    "gamma1_zh",
    "gamma2_zh",
    "dust1",
    "dust2",
    "dust_index",
];

/// Allowed deviation of `Σ β` from one
pub const SIMPLEX_TOLERANCE: f64 = 1e-5;

/// Ordered parameter layout of a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterSchema {
    pub burst: bool,
}

impl ParameterSchema {
    pub fn new(burst: bool) -> Self {
        Self { burst }
    }

    pub fn names(&self) -> &'static [&'static str] {
        if self.burst {
            &NMF_BURST_PARAMETERS
        } else {
            &NMF_PARAMETERS
        }
    }

    pub fn len(&self) -> usize {
        self.names().len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Parse one parameter row.
    ///
    /// # Errors
    /// [`ModelError::PreconditionViolation`] if the row length does not
    /// match the schema.
    pub fn parse(&self, row: &[f64]) -> ModelResult<Theta> {
        if row.len() != self.len() {
            return Err(ModelError::precondition(format!(
                "expected {} parameters ({}), got {}",
                self.len(),
                self.names().join(", "),
                row.len()
            )));
        }

        let beta = [row[1], row[2], row[3], row[4]];
        let (burst, rest) = if self.burst {
            (
                Some(Burst {
                    fburst: row[5],
                    tburst: row[6],
                }),
                &row[7..],
            )
        } else {
            (None, &row[5..])
        };

        Ok(Theta {
            logmstar: row[0],
            beta,
            burst,
            gamma: [rest[0], rest[1]],
            dust1: rest[2],
            dust2: rest[3],
            dust_index: rest[4],
        })
    }
}

/// Starburst component of a parameter row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Burst {
    /// Fraction of the total formed mass produced in the burst
    pub fburst: f64,

    /// Lookback time of the burst in Gyr
    pub tburst: f64,
}

/// Named view of one parameter row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Theta {
    /// log10 of total stellar mass formed (Msun)
    pub logmstar: f64,

    /// SFH basis coefficients
    pub beta: [f64; 4],

    pub burst: Option<Burst>,

    /// ZH basis coefficients
    pub gamma: [f64; 2],

    /// Birth-cloud dust optical depth
    pub dust1: f64,

    /// Diffuse dust optical depth
    pub dust2: f64,

    /// Attenuation curve slope offset
    pub dust_index: f64,
}

impl Theta {
    /// Total formed mass in Msun
    pub fn mass(&self) -> f64 {
        10f64.powf(self.logmstar)
    }

    /// Check that the SFH coefficients lie on the unit simplex.
    pub fn check_simplex(&self) -> ModelResult<()> {
        let sum: f64 = self.beta.iter().sum();
        if (sum - 1.0).abs() > SIMPLEX_TOLERANCE {
            return Err(ModelError::precondition(format!(
                "SFH basis coefficients must sum to 1 (got {sum})"
            )));
        }
        Ok(())
    }

    /// Burst parameters when the burst carries mass and forms before the
    /// observation: `fburst > 0` and `tburst < tage`.
    pub fn active_burst(&self, tage: f64) -> Option<Burst> {
        self.burst.filter(|b| b.fburst > 0.0 && b.tburst < tage)
    }
}

/// Epoch at which a galaxy is observed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeReference {
    /// Observed redshift; the age follows from the cosmology
    Redshift(f64),

    /// Age of the galaxy (cosmic age at observation) in Gyr
    Age(f64),
}
