//! Reference evaluation through a simple stellar population (SSP) engine.
//!
//! The engine is an external capability: given a metallicity, dust
//! settings and an age it returns the rest-frame luminosity density of a
//! population that formed one solar mass. The reference evaluator sums
//! one SSP per lookback-time bin, weighted by the mass formed in that bin,
//! and optionally mixes in a burst SSP.

use log::debug;
use ndarray::Array1;
use thiserror::Error;

use crate::error::{DomainWarning, ModelError, ModelResult};
use crate::evaluator::RestFrameSpectrum;
use crate::params::Theta;
use crate::sfh::SfhEngine;

/// Solar metallicity used to express `logzsol`
pub const Z_SUN: f64 = 0.0190;

/// Youngest SSP age passed to the engine (Gyr)
pub const MIN_SSP_AGE_GYR: f64 = 1e-8;

/// Bursts younger than this are outside the supported range (Gyr)
pub const MIN_BURST_AGE_GYR: f64 = 1e-2;

/// Errors reported by SSP engines
#[derive(Debug, Error)]
pub enum SspError {
    #[error("SSP engine initialization failed: {0}")]
    Initialization(String),

    #[error("SSP engine evaluation failed: {0}")]
    Evaluation(String),

    #[error("SSP engine returned {wave} wavelengths but {lum} luminosities")]
    ShapeMismatch { wave: usize, lum: usize },

    #[error("SSP engine changed its wavelength grid between calls ({got} points, expected {expected})")]
    InconsistentGrid { got: usize, expected: usize },
}

/// Settable engine fields for one SSP evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SspParams {
    /// log10(Z / Z_sun)
    pub logzsol: f64,
    pub dust1: f64,
    pub dust2: f64,
    pub dust_index: f64,
}

/// Rest-frame SSP spectrum normalized to one solar mass formed.
#[derive(Debug, Clone, PartialEq)]
pub struct SspSpectrum {
    /// Rest-frame wavelength (Å)
    pub wavelength: Array1<f64>,

    /// Luminosity density (L_sun/Å)
    pub luminosity: Array1<f64>,
}

/// Stellar population synthesis capability.
pub trait SspEngine {
    /// Spectrum of a population of age `age_gyr` with the given settings.
    fn spectrum(&self, params: &SspParams, age_gyr: f64) -> Result<SspSpectrum, SspError>;
}

/// Placeholder engine for models that only run the surrogate path.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableEngine;

impl SspEngine for UnavailableEngine {
    fn spectrum(&self, _params: &SspParams, _age_gyr: f64) -> Result<SspSpectrum, SspError> {
        Err(SspError::Initialization("no SSP engine linked".into()))
    }
}

/// Sums per-bin SSP spectra weighted by the star formation history.
#[derive(Debug, Clone)]
pub struct ReferenceEvaluator<E> {
    engine: E,
}

impl<E: SspEngine> ReferenceEvaluator<E> {
    pub fn new(engine: E) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    fn checked_spectrum(&self, params: &SspParams, age: f64) -> ModelResult<SspSpectrum> {
        let spec = self.engine.spectrum(params, age)?;
        if spec.wavelength.len() != spec.luminosity.len() {
            return Err(SspError::ShapeMismatch {
                wave: spec.wavelength.len(),
                lum: spec.luminosity.len(),
            }
            .into());
        }
        Ok(spec)
    }

    /// Rest-frame luminosity (L_sun/Å) of a galaxy of age `tage` Gyr.
    pub fn luminosity(
        &self,
        sfh: &SfhEngine,
        theta: &Theta,
        tage: f64,
    ) -> ModelResult<RestFrameSpectrum> {
        theta.check_simplex()?;

        let history = sfh.continuous_history(theta, tage)?;
        let zh = sfh.metallicity_history(theta, tage)?;
        let mut warnings: Vec<_> = zh.warning().into_iter().collect();

        let mut accumulated: Option<(Array1<f64>, Array1<f64>)> = None;
        let mut n_ssp = 0;
        for (i, (age, mass)) in history
            .centers()
            .into_iter()
            .zip(history.bin_masses())
            .enumerate()
        {
            if mass == 0.0 && i != 0 {
                continue;
            }
            let params = SspParams {
                logzsol: (zh.metallicity[i] / Z_SUN).log10(),
                dust1: theta.dust1,
                dust2: theta.dust2,
                dust_index: theta.dust_index,
            };
            let spec = self.checked_spectrum(&params, age)?;
            n_ssp += 1;

            match accumulated.as_mut() {
                None => accumulated = Some((spec.wavelength, spec.luminosity * mass)),
                Some((wave, lum)) => {
                    if spec.wavelength != *wave {
                        return Err(SspError::InconsistentGrid {
                            got: spec.wavelength.len(),
                            expected: wave.len(),
                        }
                        .into());
                    }
                    lum.scaled_add(mass, &spec.luminosity);
                }
            }
        }
        let (wavelength, mut luminosity) = accumulated
            .ok_or_else(|| ModelError::precondition("no lookback-time bins to evaluate"))?;
        debug!("Summed {n_ssp} SSPs for tage = {tage:.4} Gyr");

        if let Some(burst) = theta.active_burst(tage) {
            let (burst_spec, warning) = self.burst_luminosity(sfh, theta, burst.tburst)?;
            warnings.extend(warning);
            if burst_spec.wavelength != wavelength {
                return Err(SspError::InconsistentGrid {
                    got: burst_spec.wavelength.len(),
                    expected: wavelength.len(),
                }
                .into());
            }
            luminosity *= 1.0 - burst.fburst;
            luminosity.scaled_add(burst.fburst, &burst_spec.luminosity);
        }

        luminosity *= theta.mass();

        Ok(RestFrameSpectrum {
            wavelength,
            luminosity,
            warnings,
        })
    }

    /// Burst SSP (one solar mass formed) at lookback time `tburst`.
    ///
    /// No birth-cloud attenuation is applied to the burst population. A
    /// clipped burst metallicity comes back as a warning.
    pub fn burst_luminosity(
        &self,
        sfh: &SfhEngine,
        theta: &Theta,
        tburst: f64,
    ) -> ModelResult<(SspSpectrum, Option<DomainWarning>)> {
        if !(tburst > MIN_BURST_AGE_GYR) {
            return Err(ModelError::precondition(format!(
                "bursts are only supported for tburst > {MIN_BURST_AGE_GYR} Gyr (got {tburst})"
            )));
        }

        let (zburst, warning) = sfh.burst_metallicity(theta, tburst);
        let params = SspParams {
            logzsol: (zburst / Z_SUN).log10(),
            dust1: 0.0,
            dust2: theta.dust2,
            dust_index: theta.dust_index,
        };
        let spec = self.checked_spectrum(&params, tburst.max(MIN_SSP_AGE_GYR))?;
        Ok((spec, warning))
    }
}
