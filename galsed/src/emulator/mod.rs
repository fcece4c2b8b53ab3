//! Piecewise PCA-neural spectrum emulator.
//!
//! A [`PcaEmulator`] is an ordered list of [`EmulatorBundle`]s, each
//! covering one wavelength sub-range. Evaluating it runs every bundle on
//! the same input vector and concatenates the log-luminosity pieces in
//! wavelength order.

pub mod bundle;
pub mod transform;

use std::path::Path;

use log::info;
use ndarray::{concatenate, Array1, ArrayView1, Axis};

pub use bundle::{gated_activation, EmulatorBundle, EmulatorError, EmulatorManifest};
pub use transform::{burst_inputs, continuous_inputs, simplex_from_sticks, stick_breaking};

/// Bundles covering consecutive wavelength sub-ranges.
#[derive(Debug, Clone)]
pub struct PcaEmulator {
    bundles: Vec<EmulatorBundle>,
    wavelengths: Array1<f64>,
}

impl PcaEmulator {
    /// Assemble an emulator from validated bundles in wavelength order.
    ///
    /// # Errors
    /// No bundles, inconsistent bundle shapes, bundles disagreeing on the
    /// number of input parameters, or wavelengths that do not increase
    /// strictly across the concatenated bundles.
    pub fn new(bundles: Vec<EmulatorBundle>) -> Result<Self, EmulatorError> {
        let first = bundles.first().ok_or(EmulatorError::Empty)?;
        let n_params = first.n_parameters();

        for (i, b) in bundles.iter().enumerate() {
            b.validate()?;
            if b.n_parameters() != n_params {
                return Err(EmulatorError::Shape(format!(
                    "bundle {i} takes {} parameters, bundle 0 takes {n_params}",
                    b.n_parameters()
                )));
            }
        }

        let pieces: Vec<ArrayView1<f64>> = bundles.iter().map(|b| b.wavelengths.view()).collect();
        let wavelengths = concatenate(Axis(0), &pieces)
            .map_err(|e| EmulatorError::Shape(e.to_string()))?;
        let out_of_order = wavelengths
            .iter()
            .zip(wavelengths.iter().skip(1))
            .position(|(a, b)| b <= a);
        if let Some(i) = out_of_order {
            return Err(EmulatorError::Shape(format!(
                "wavelengths must increase across bundles (index {} has {} after {})",
                i + 1,
                wavelengths[i + 1],
                wavelengths[i]
            )));
        }

        Ok(Self {
            bundles,
            wavelengths,
        })
    }

    /// Load every bundle listed in a JSON manifest.
    pub fn from_manifest(path: &Path) -> Result<Self, EmulatorError> {
        let manifest = EmulatorManifest::load_from_file(path)?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        let bundles = manifest
            .resolve(base)
            .iter()
            .map(|p| EmulatorBundle::from_npz(p))
            .collect::<Result<Vec<_>, _>>()?;

        let emulator = Self::new(bundles)?;
        info!(
            "Loaded emulator from {}: {} bundles, {} parameters, {} wavelengths",
            path.display(),
            emulator.bundles.len(),
            emulator.n_parameters(),
            emulator.wavelengths.len()
        );
        Ok(emulator)
    }

    pub fn n_parameters(&self) -> usize {
        self.bundles[0].n_parameters()
    }

    pub fn n_bundles(&self) -> usize {
        self.bundles.len()
    }

    /// Concatenated rest-frame wavelengths (Å)
    pub fn wavelengths(&self) -> &Array1<f64> {
        &self.wavelengths
    }

    /// Natural-log luminosity over the full wavelength range.
    pub fn log_luminosity(&self, inputs: &[f64]) -> Result<Array1<f64>, EmulatorError> {
        let x = ArrayView1::from(inputs);
        let pieces = self
            .bundles
            .iter()
            .map(|b| b.log_spectrum(x))
            .collect::<Result<Vec<_>, _>>()?;
        let views: Vec<ArrayView1<f64>> = pieces.iter().map(|p| p.view()).collect();
        concatenate(Axis(0), &views).map_err(|e| EmulatorError::Shape(e.to_string()))
    }

    /// Luminosity (`exp` of [`Self::log_luminosity`]).
    pub fn luminosity(&self, inputs: &[f64]) -> Result<Array1<f64>, EmulatorError> {
        Ok(self.log_luminosity(inputs)?.mapv(f64::exp))
    }
}
