//! Synthetic fixtures shared by unit and integration tests.
//!
//! Nothing here reads from disk: the basis is analytic, the SSP engine is a
//! toy power law and emulator bundles are built in memory. Compiled for
//! this crate's tests and, for other crates, behind the `test-util` feature.

use ndarray::{Array1, Array2};
use once_cell::sync::Lazy;
use sed_math::linspace;

use crate::basis::{BasisSet, BasisStore, Interpolation};
use crate::cosmology::{CosmologyAdapter, FlatLambdaCdm};
use crate::emulator::{EmulatorBundle, PcaEmulator};
use crate::model::{Model, ModelBuilder};
use crate::sfh::{LookbackBinning, MetallicityBounds, SfhEngine};
use crate::ssp::{SspEngine, SspError, SspParams, SspSpectrum};

static SYNTHETIC_BASIS: Lazy<BasisStore> = Lazy::new(|| {
    let t = linspace(0.0, 14.0, 141);
    let sfh = vec![
        t.iter().map(|_| 1.0).collect(),
        t.iter().map(|&x| (-x / 2.0).exp() + 0.05).collect(),
        t.iter().map(|&x| (-(14.0 - x) / 3.0).exp() + 0.05).collect(),
        t.iter().map(|&x| 1.0 + 0.5 * x.sin()).collect(),
    ];
    let zh = vec![
        t.iter().map(|_| 0.01).collect(),
        t.iter().map(|&x| 0.01 * (1.0 + x / 14.0)).collect(),
    ];
    BasisStore::from_sets(
        BasisSet::new(t.clone(), sfh).expect("synthetic SFH basis is well formed"),
        BasisSet::new(t, zh).expect("synthetic ZH basis is well formed"),
        Interpolation::Linear,
    )
    .expect("synthetic basis is well formed")
});

/// Four strictly positive SFH components and two ZH components on
/// `[0, 14]` Gyr. `gamma = [0.5, 0.5]` stays inside the MIST metallicity
/// bounds; `gamma = [100, 100]` exceeds them everywhere.
pub fn synthetic_basis() -> BasisStore {
    SYNTHETIC_BASIS.clone()
}

pub fn synthetic_sfh_engine() -> SfhEngine {
    SfhEngine::new(
        synthetic_basis(),
        LookbackBinning::default(),
        MetallicityBounds::default(),
    )
}

pub fn planck13() -> CosmologyAdapter {
    CosmologyAdapter::new(FlatLambdaCdm::planck13()).expect("Planck13 is monotonic")
}

/// Analytic SSP engine.
///
/// The spectrum is a power law in wavelength attenuated by a simple dust
/// curve. When `age_dependent` is set it also fades with age and brightens
/// with metallicity; otherwise every population has the same spectrum,
/// which makes reference sums directly comparable with a constant
/// emulator.
#[derive(Debug, Clone)]
pub struct ToySspEngine {
    pub wavelength: Array1<f64>,
    pub age_dependent: bool,
}

impl Default for ToySspEngine {
    fn default() -> Self {
        Self {
            wavelength: Array1::linspace(1000.0, 10000.0, 901),
            age_dependent: true,
        }
    }
}

impl ToySspEngine {
    /// Age- and metallicity-independent engine on `wavelength`.
    pub fn template(wavelength: Array1<f64>) -> Self {
        Self {
            wavelength,
            age_dependent: false,
        }
    }

    /// Dust-free luminosity of the template mode (L_sun/Å per Msun)
    pub fn template_luminosity(&self) -> Array1<f64> {
        self.wavelength.mapv(|w| 1e-3 * (w / 5000.0).powf(-1.5))
    }
}

impl SspEngine for ToySspEngine {
    fn spectrum(&self, params: &SspParams, age_gyr: f64) -> Result<SspSpectrum, SspError> {
        if !(age_gyr > 0.0) {
            return Err(SspError::Evaluation(format!("age must be positive, got {age_gyr}")));
        }
        let evolution = if self.age_dependent {
            age_gyr.max(1e-3).powf(-0.7) * (1.0 + 0.05 * params.logzsol)
        } else {
            1.0
        };
        let slope = params.dust_index - 0.7;
        let luminosity = self
            .template_luminosity()
            .iter()
            .zip(self.wavelength.iter())
            .map(|(l, w)| {
                let tau = (params.dust1 + params.dust2) * (w / 5500.0).powf(slope);
                l * evolution * (-tau).exp()
            })
            .collect();
        Ok(SspSpectrum {
            wavelength: self.wavelength.clone(),
            luminosity,
        })
    }
}

/// Single-layer bundle whose output is `log_template` for any input.
///
/// The network and PCA basis are all zeros, so the spectrum shift alone
/// sets the result.
pub fn constant_bundle(
    wavelengths: Array1<f64>,
    log_template: Array1<f64>,
    n_params: usize,
) -> EmulatorBundle {
    let n_wave = wavelengths.len();
    EmulatorBundle {
        weights: vec![Array2::zeros((n_params, 1))],
        biases: vec![Array1::zeros(1)],
        alphas: vec![],
        betas: vec![],
        parameters_shift: Array1::zeros(n_params),
        parameters_scale: Array1::ones(n_params),
        pca_shift: Array1::zeros(1),
        pca_scale: Array1::ones(1),
        spectrum_shift: log_template,
        spectrum_scale: Array1::ones(n_wave),
        pca_transform_matrix: Array2::zeros((1, n_wave)),
        wavelengths,
        n_layers: 1,
    }
}

/// Constant emulator split into `n_bundles` consecutive sub-ranges.
pub fn constant_emulator(
    wavelengths: &Array1<f64>,
    log_template: &Array1<f64>,
    n_params: usize,
    n_bundles: usize,
) -> PcaEmulator {
    let n = wavelengths.len();
    let bundles = (0..n_bundles)
        .map(|k| {
            let (lo, hi) = (k * n / n_bundles, (k + 1) * n / n_bundles);
            constant_bundle(
                wavelengths.slice(ndarray::s![lo..hi]).to_owned(),
                log_template.slice(ndarray::s![lo..hi]).to_owned(),
                n_params,
            )
        })
        .collect();
    PcaEmulator::new(bundles).expect("constant bundles are consistent")
}

/// Reference-path model on the synthetic basis with the age-dependent toy
/// engine.
pub fn toy_model(burst: bool) -> Model<ToySspEngine> {
    ModelBuilder::new(synthetic_basis())
        .engine(Ok(ToySspEngine::default()))
        .burst(burst)
        .build()
        .expect("toy model builds")
}
