//! Rest-frame spectrum evaluation: surrogate path and path selection.
//!
//! [`SpectrumEvaluator`] dispatches statically between the reference SSP
//! sum ([`ReferenceEvaluator`]) and the emulator ([`SurrogateEvaluator`]).
//! Both return the same [`RestFrameSpectrum`] so the SED assembly is
//! shared.

use log::{debug, warn};
use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::cosmology::CosmologyAdapter;
use crate::emulator::{burst_inputs, continuous_inputs, PcaEmulator};
use crate::error::{DomainWarning, ModelError, ModelResult};
use crate::params::Theta;
use crate::sfh::SfhEngine;
use crate::ssp::{ReferenceEvaluator, SspEngine, SspError, MIN_BURST_AGE_GYR};

/// Rest-frame luminosity of one galaxy.
#[derive(Debug, Clone, PartialEq)]
pub struct RestFrameSpectrum {
    /// Rest-frame wavelength (Å)
    pub wavelength: Array1<f64>,

    /// Luminosity density (L_sun/Å) for the full stellar mass
    pub luminosity: Array1<f64>,

    pub warnings: Vec<DomainWarning>,
}

/// Which evaluation path a model prefers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvaluatorKind {
    #[default]
    Reference,
    Surrogate,
}

/// Emulator-backed evaluation of the continuous and burst components.
#[derive(Debug, Clone)]
pub struct SurrogateEvaluator {
    continuous: PcaEmulator,
    burst: Option<PcaEmulator>,
}

impl SurrogateEvaluator {
    /// Oldest burst the burst emulator was trained on (Gyr)
    pub const BURST_MAX_TBURST_GYR: f64 = 13.27;

    /// Inputs expected by the continuous emulator
    pub const N_CONTINUOUS_INPUTS: usize = 9;

    /// Inputs expected by the burst emulator
    pub const N_BURST_INPUTS: usize = 4;

    /// # Errors
    /// [`ModelError::Configuration`] if the input counts are wrong or the
    /// burst emulator covers a different number of wavelengths.
    pub fn new(continuous: PcaEmulator, burst: Option<PcaEmulator>) -> ModelResult<Self> {
        if continuous.n_parameters() != Self::N_CONTINUOUS_INPUTS {
            return Err(ModelError::configuration(format!(
                "continuous emulator takes {} inputs, expected {}",
                continuous.n_parameters(),
                Self::N_CONTINUOUS_INPUTS
            )));
        }
        if let Some(b) = &burst {
            if b.n_parameters() != Self::N_BURST_INPUTS {
                return Err(ModelError::configuration(format!(
                    "burst emulator takes {} inputs, expected {}",
                    b.n_parameters(),
                    Self::N_BURST_INPUTS
                )));
            }
            if b.wavelengths().len() != continuous.wavelengths().len() {
                return Err(ModelError::configuration(format!(
                    "burst emulator covers {} wavelengths but the continuous emulator covers {}",
                    b.wavelengths().len(),
                    continuous.wavelengths().len()
                )));
            }
        }
        Ok(Self { continuous, burst })
    }

    pub fn has_burst(&self) -> bool {
        self.burst.is_some()
    }

    pub fn wavelengths(&self) -> &Array1<f64> {
        self.continuous.wavelengths()
    }

    /// Rest-frame luminosity (L_sun/Å) of a galaxy of age `tage` Gyr.
    pub fn luminosity(
        &self,
        sfh: &SfhEngine,
        cosmology: &CosmologyAdapter,
        theta: &Theta,
        tage: f64,
    ) -> ModelResult<RestFrameSpectrum> {
        theta.check_simplex()?;
        let zred = cosmology.redshift_at_age(tage);
        let inputs = continuous_inputs(theta, zred)?;
        let mut luminosity = self.continuous.luminosity(&inputs)?;
        let mut warnings = Vec::new();

        if let Some(burst) = theta.active_burst(tage) {
            let (burst_lum, warning) = self.burst_luminosity(sfh, theta, burst.tburst)?;
            warnings.extend(warning);
            luminosity *= 1.0 - burst.fburst;
            luminosity.scaled_add(burst.fburst, &burst_lum);
        }

        luminosity *= theta.mass();
        debug!("Surrogate spectrum at tage = {tage:.4} Gyr (z = {zred:.4})");

        Ok(RestFrameSpectrum {
            wavelength: self.wavelengths().clone(),
            luminosity,
            warnings,
        })
    }

    /// Burst luminosity for one solar mass formed at lookback time `tburst`.
    ///
    /// Past the emulator's trained range the burst contributes nothing and a
    /// [`DomainWarning::BurstBeyondEmulatorRange`] is returned. A clipped
    /// burst metallicity is reported as
    /// [`DomainWarning::BurstMetallicityClipped`].
    pub fn burst_luminosity(
        &self,
        sfh: &SfhEngine,
        theta: &Theta,
        tburst: f64,
    ) -> ModelResult<(Array1<f64>, Option<DomainWarning>)> {
        let emulator = self.burst.as_ref().ok_or_else(|| {
            ModelError::configuration("burst parameters given but no burst emulator is loaded")
        })?;

        if tburst > Self::BURST_MAX_TBURST_GYR {
            let warning = DomainWarning::BurstBeyondEmulatorRange { tburst };
            warn!("{warning}");
            return Ok((Array1::zeros(emulator.wavelengths().len()), Some(warning)));
        }
        if !(tburst > MIN_BURST_AGE_GYR) {
            return Err(ModelError::precondition(format!(
                "bursts are only supported for tburst > {MIN_BURST_AGE_GYR} Gyr (got {tburst})"
            )));
        }

        let (zburst, warning) = sfh.burst_metallicity(theta, tburst);
        let lum = emulator.luminosity(&burst_inputs(theta, tburst, zburst))?;
        Ok((lum, warning))
    }
}

/// The evaluation path a model runs.
#[derive(Debug, Clone)]
pub enum SpectrumEvaluator<E> {
    Reference(ReferenceEvaluator<E>),
    Surrogate(SurrogateEvaluator),
}

impl<E: SspEngine> SpectrumEvaluator<E> {
    /// Pick the evaluation path.
    ///
    /// A failed engine degrades to the surrogate (with a warning) when one
    /// is available; otherwise it is fatal.
    pub fn select(
        preference: EvaluatorKind,
        engine: Result<E, SspError>,
        surrogate: Option<SurrogateEvaluator>,
    ) -> ModelResult<Self> {
        match (preference, engine, surrogate) {
            (EvaluatorKind::Reference, Ok(engine), _) => {
                Ok(SpectrumEvaluator::Reference(ReferenceEvaluator::new(engine)))
            }
            (EvaluatorKind::Reference, Err(err), Some(surrogate)) => {
                warn!("{err}; falling back to the emulator");
                Ok(SpectrumEvaluator::Surrogate(surrogate))
            }
            (EvaluatorKind::Reference, Err(err), None) => {
                Err(ModelError::EngineUnavailable(err.to_string()))
            }
            (EvaluatorKind::Surrogate, _, Some(surrogate)) => {
                Ok(SpectrumEvaluator::Surrogate(surrogate))
            }
            (EvaluatorKind::Surrogate, _, None) => Err(ModelError::configuration(
                "surrogate evaluation requested but no emulator bundles are available",
            )),
        }
    }

    pub fn kind(&self) -> EvaluatorKind {
        match self {
            SpectrumEvaluator::Reference(_) => EvaluatorKind::Reference,
            SpectrumEvaluator::Surrogate(_) => EvaluatorKind::Surrogate,
        }
    }

    /// Rest-frame luminosity through whichever path is selected.
    pub fn luminosity(
        &self,
        sfh: &SfhEngine,
        cosmology: &CosmologyAdapter,
        theta: &Theta,
        tage: f64,
    ) -> ModelResult<RestFrameSpectrum> {
        match self {
            SpectrumEvaluator::Reference(r) => r.luminosity(sfh, theta, tage),
            SpectrumEvaluator::Surrogate(s) => s.luminosity(sfh, cosmology, theta, tage),
        }
    }
}
