//! Observer-frame SED assembly.
//!
//! Turns a rest-frame luminosity spectrum into an observed spectrum:
//!
//! 1. Redshift the wavelengths by `(1 + z)` and dim the luminosity by the
//!    luminosity distance, giving flux in units of 1e-17 erg s⁻¹ cm⁻² Å⁻¹
//! 2. Optionally smooth by a velocity dispersion on a log-wavelength grid
//! 3. Optionally resample onto a target grid and apply resolution blocks
//! 4. Optionally integrate the dimmed, un-smoothed flux through filters

use std::f64::consts::PI;

use log::debug;
use ndarray::{Array1, Array2, Axis};
use sed_math::{arange, centers_to_edges, gaussian_filter1d, trapz_rebin};

use crate::cosmology::CosmologyAdapter;
use crate::error::{DomainWarning, ModelError, ModelResult};
use crate::evaluator::RestFrameSpectrum;
use crate::photometry::{Bandpass, CGS, FLUX_UNIT, SPEED_OF_LIGHT_KMS};
use crate::resolution::{apply_blocks, ResolutionMatrix};

/// Pixel width of the velocity-dispersion grid (km/s)
pub const VDISP_PIXEL_KMS: f64 = 10.0;

/// Margin trimmed from each end of the spectrum before log rebinning (Å)
const VDISP_EDGE_MARGIN_AA: f64 = 10.0;

/// Per-call options shared by every sample.
#[derive(Clone, Copy, Default)]
pub struct SedOptions<'a> {
    /// Velocity dispersion in km/s: empty (no smoothing), one value for
    /// every sample, or one per sample
    pub vdisp: &'a [f64],

    /// Target observed-frame wavelength grid (Å)
    pub wavelength: Option<&'a [f64]>,

    /// Resolution blocks tiling the target grid
    pub resolution: &'a [ResolutionMatrix],

    pub filters: Option<&'a dyn Bandpass>,
}

impl SedOptions<'_> {
    /// Velocity dispersion of sample `i` out of `n`.
    pub fn vdisp_for(&self, i: usize, n: usize) -> ModelResult<f64> {
        match self.vdisp.len() {
            0 => Ok(0.0),
            1 => Ok(self.vdisp[0]),
            len if len == n => Ok(self.vdisp[i]),
            len => Err(ModelError::precondition(format!(
                "vdisp has {len} values for {n} samples; expected 1 or {n}"
            ))),
        }
    }
}

/// Observed spectrum of one sample.
#[derive(Debug, Clone, PartialEq)]
pub struct SpectrumResult {
    /// Observed-frame wavelength (Å)
    pub wavelength: Array1<f64>,

    /// Flux density in units of 1e-17 erg s⁻¹ cm⁻² Å⁻¹
    pub flux: Array1<f64>,

    /// Nanomaggies per filter, when filters were given
    pub photometry: Option<Array1<f64>>,

    pub warnings: Vec<DomainWarning>,
}

/// Spectra of several samples stacked row-wise.
#[derive(Debug, Clone, PartialEq)]
pub struct StackedSed {
    pub wavelength: Array2<f64>,
    pub flux: Array2<f64>,
    pub photometry: Option<Array2<f64>>,
}

/// Result of a `sed` call: unstacked for one sample.
#[derive(Debug, Clone, PartialEq)]
pub enum SedOutput {
    Single(SpectrumResult),
    Batch(Vec<SpectrumResult>),
}

impl SedOutput {
    pub(crate) fn from_results(mut results: Vec<SpectrumResult>) -> Self {
        if results.len() == 1 {
            if let Some(only) = results.pop() {
                return SedOutput::Single(only);
            }
        }
        SedOutput::Batch(results)
    }

    pub fn results(&self) -> &[SpectrumResult] {
        match self {
            SedOutput::Single(r) => std::slice::from_ref(r),
            SedOutput::Batch(rs) => rs,
        }
    }

    pub fn into_results(self) -> Vec<SpectrumResult> {
        match self {
            SedOutput::Single(r) => vec![r],
            SedOutput::Batch(rs) => rs,
        }
    }

    /// Stack every sample into `[N, Nwave]` arrays.
    ///
    /// # Errors
    /// Samples on different wavelength grids (or with photometry missing
    /// for some of them) cannot be stacked.
    pub fn stack(&self) -> ModelResult<StackedSed> {
        let results = self.results();
        let first = results
            .first()
            .ok_or_else(|| ModelError::precondition("no spectra to stack"))?;
        let nwave = first.wavelength.len();
        if results
            .iter()
            .any(|r| r.wavelength.len() != nwave || r.flux.len() != nwave)
        {
            return Err(ModelError::precondition(
                "spectra have different wavelength grids and cannot be stacked",
            ));
        }

        let rows = |f: fn(&SpectrumResult) -> &Array1<f64>| -> ModelResult<Array2<f64>> {
            let views: Vec<_> = results.iter().map(|r| f(r).view()).collect();
            ndarray::stack(Axis(0), &views).map_err(|e| ModelError::precondition(e.to_string()))
        };

        let photometry = match first.photometry {
            None => None,
            Some(_) => {
                let phot: Option<Vec<_>> =
                    results.iter().map(|r| r.photometry.as_ref().map(|p| p.view())).collect();
                let phot = phot.ok_or_else(|| {
                    ModelError::precondition("photometry missing for some samples")
                })?;
                Some(
                    ndarray::stack(Axis(0), &phot)
                        .map_err(|e| ModelError::precondition(e.to_string()))?,
                )
            }
        };

        Ok(StackedSed {
            wavelength: rows(|r| &r.wavelength)?,
            flux: rows(|r| &r.flux)?,
            photometry,
        })
    }
}

/// Converts rest-frame luminosities into observed spectra.
#[derive(Debug, Clone, Copy)]
pub struct SedAssembler<'a> {
    cosmology: &'a CosmologyAdapter,
}

impl<'a> SedAssembler<'a> {
    pub fn new(cosmology: &'a CosmologyAdapter) -> Self {
        Self { cosmology }
    }

    /// Redshifted wavelength and dimmed flux (1e-17 erg s⁻¹ cm⁻² Å⁻¹).
    pub fn redshift(
        &self,
        rest: &RestFrameSpectrum,
        zred: f64,
    ) -> ModelResult<(Array1<f64>, Array1<f64>)> {
        if !(zred > 0.0) {
            return Err(ModelError::precondition(format!(
                "redshift must be positive to define a luminosity distance (got {zred})"
            )));
        }
        let d_lum = self.cosmology.luminosity_distance_cm(zred);
        let wave = &rest.wavelength * (1.0 + zred);
        let dimming = CGS::SOLAR_LUMINOSITY / (4.0 * PI * d_lum * d_lum) / (1.0 + zred) / FLUX_UNIT;
        Ok((wave, &rest.luminosity * dimming))
    }

    /// Assemble the observed spectrum of one sample.
    pub fn assemble(
        &self,
        rest: RestFrameSpectrum,
        zred: f64,
        vdisp: f64,
        options: &SedOptions<'_>,
    ) -> ModelResult<SpectrumResult> {
        let (wave_z, flux_z) = self.redshift(&rest, zred)?;
        let (wave_smooth, flux_smooth) = apply_vdisp(&wave_z, &flux_z, vdisp)?;

        let (wavelength, flux) = match options.wavelength {
            None => {
                if !options.resolution.is_empty() {
                    return Err(ModelError::precondition(
                        "resolution blocks require a target wavelength grid",
                    ));
                }
                (wave_smooth, flux_smooth)
            }
            Some(target) => {
                let resampled = Array1::from(resample(&wave_smooth, &flux_smooth, target)?);
                let flux = if options.resolution.is_empty() {
                    resampled
                } else {
                    apply_blocks(options.resolution, resampled.view())?
                };
                (Array1::from(target.to_vec()), flux)
            }
        };

        let photometry = match options.filters {
            Some(filters) => Some(photometry(filters, &wave_z, &flux_z)?),
            None => None,
        };
        debug!(
            "Assembled SED at z = {zred:.4}: {} wavelengths{}",
            wavelength.len(),
            if photometry.is_some() { " with photometry" } else { "" }
        );

        Ok(SpectrumResult {
            wavelength,
            flux,
            photometry,
            warnings: rest.warnings,
        })
    }
}

/// Edge-aware resample of `(wave, flux)` onto bins centred on `target`.
pub fn resample(wave: &Array1<f64>, flux: &Array1<f64>, target: &[f64]) -> ModelResult<Vec<f64>> {
    let edges = centers_to_edges(target);
    Ok(trapz_rebin(&wave.to_vec(), &flux.to_vec(), &edges)?)
}

/// Smooth by a Gaussian velocity dispersion `vdisp` (km/s).
///
/// The spectrum is first rebinned onto a log-wavelength grid with
/// 10 km/s pixels, trimmed by 10 Å at each end. `vdisp <= 0` returns the
/// input unchanged.
pub fn apply_vdisp(
    wave: &Array1<f64>,
    flux: &Array1<f64>,
    vdisp: f64,
) -> ModelResult<(Array1<f64>, Array1<f64>)> {
    if !(vdisp > 0.0) {
        return Ok((wave.clone(), flux.clone()));
    }

    let (min, max) = wave
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &w| (lo.min(w), hi.max(w)));
    let dlogwave = VDISP_PIXEL_KMS / SPEED_OF_LIGHT_KMS / std::f64::consts::LN_10;
    let wlog: Vec<f64> = arange(
        (min + VDISP_EDGE_MARGIN_AA).log10(),
        (max - VDISP_EDGE_MARGIN_AA).log10(),
        dlogwave,
    )
    .into_iter()
    .map(|e| 10f64.powf(e))
    .collect();
    if wlog.len() < 2 {
        return Err(ModelError::precondition(format!(
            "spectrum over [{min}, {max}] Å is too short for velocity-dispersion smoothing"
        )));
    }

    let flux_wlog = resample(wave, flux, &wlog)?;
    let smooth = gaussian_filter1d(&flux_wlog, vdisp / VDISP_PIXEL_KMS);
    Ok((Array1::from(wlog), Array1::from(smooth)))
}

/// Nanomaggies of the dimmed observed-frame spectrum through `filters`.
fn photometry(
    filters: &dyn Bandpass,
    wave_z: &Array1<f64>,
    flux_z: &Array1<f64>,
) -> ModelResult<Array1<f64>> {
    let flux_cgs: Vec<f64> = flux_z.iter().map(|f| f * FLUX_UNIT).collect();
    let (flux, wave) = filters.pad_spectrum(&flux_cgs, &wave_z.to_vec())?;
    let maggies = filters.ab_maggies(&flux, &wave)?;
    Ok(maggies.into_iter().map(|m| m * 1e9).collect())
}
