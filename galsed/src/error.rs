//! Error and warning taxonomy for model evaluation.
//!
//! Fatal conditions surface as [`ModelError`]; non-fatal numerical domain
//! conditions are logged and handed back to the caller as
//! [`DomainWarning`]s alongside the (fallback) result.

use std::fmt;

use sed_math::RebinError;
use thiserror::Error;

use crate::basis::BasisError;
use crate::config::ConfigError;
use crate::emulator::EmulatorError;
use crate::photometry::FilterError;
use crate::resolution::ResolutionError;
use crate::ssp::SspError;

/// Errors raised by model construction and evaluation
#[derive(Debug, Error)]
pub enum ModelError {
    /// Shape mismatches, schema mismatches, out-of-contract arguments
    #[error("Precondition violated: {0}")]
    PreconditionViolation(String),

    /// Unknown basis family, unimplemented model variant, missing bundles
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The reference path was requested but the SSP engine failed to start
    #[error("SSP engine unavailable: {0}")]
    EngineUnavailable(String),

    #[error(transparent)]
    Basis(BasisError),

    #[error(transparent)]
    Emulator(#[from] EmulatorError),

    #[error(transparent)]
    Ssp(#[from] SspError),

    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error(transparent)]
    Rebin(#[from] RebinError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<BasisError> for ModelError {
    fn from(err: BasisError) -> Self {
        match err {
            BasisError::UnknownFamily(_) => ModelError::Configuration(err.to_string()),
            other => ModelError::Basis(other),
        }
    }
}

impl ModelError {
    pub(crate) fn precondition(msg: impl Into<String>) -> Self {
        ModelError::PreconditionViolation(msg.into())
    }

    pub(crate) fn configuration(msg: impl Into<String>) -> Self {
        ModelError::Configuration(msg.into())
    }
}

/// Result alias used throughout the crate
pub type ModelResult<T> = Result<T, ModelError>;

/// Non-fatal numerical domain conditions.
///
/// The computation proceeds with a well-defined fallback and the condition
/// is reported both to the log and to the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum DomainWarning {
    /// Burst lookback time past the range the burst emulator was trained
    /// on; the burst contributes zero flux.
    BurstBeyondEmulatorRange { tburst: f64 },

    /// Metallicity history values clipped to the isochrone bounds.
    MetallicityClipped { bins: usize },

    /// Metallicity at the burst lookback time clipped to the isochrone
    /// bounds.
    BurstMetallicityClipped { tburst: f64 },
}

impl fmt::Display for DomainWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DomainWarning::BurstBeyondEmulatorRange { tburst } => write!(
                f,
                "tburst = {tburst:.3} Gyr is beyond the burst emulator range; burst flux set to 0"
            ),
            DomainWarning::MetallicityClipped { bins } => {
                write!(f, "metallicity clipped to isochrone bounds in {bins} bins")
            }
            DomainWarning::BurstMetallicityClipped { tburst } => write!(
                f,
                "burst metallicity at tburst = {tburst:.3} Gyr clipped to isochrone bounds"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_family_maps_to_configuration() {
        let err: ModelError = BasisError::UnknownFamily("bogus".into()).into();
        assert!(matches!(err, ModelError::Configuration(_)));
    }

    #[test]
    fn test_warning_display() {
        let w = DomainWarning::BurstBeyondEmulatorRange { tburst: 14.0 };
        assert!(w.to_string().contains("14.000"));
        let w = DomainWarning::MetallicityClipped { bins: 3 };
        assert!(w.to_string().contains("3 bins"));
        let w = DomainWarning::BurstMetallicityClipped { tburst: 2.5 };
        assert!(w.to_string().contains("2.500 Gyr"));
    }
}
