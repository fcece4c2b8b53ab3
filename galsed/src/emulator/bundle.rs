//! PCA-neural emulator bundles and their on-disk format.
//!
//! One bundle covers one wavelength sub-range. It holds a small dense
//! network mapping standardized physical parameters to normalized PCA
//! coefficients, plus the PCA basis and the scalings needed to turn those
//! coefficients back into a natural-log luminosity spectrum.
//!
//! Bundles are stored as `.npz` archives with the arrays `W_{i}`, `b_{i}`,
//! `alphas_{i}`, `betas_{i}`, `parameters_shift`, `parameters_scale`,
//! `pca_shift`, `pca_scale`, `spectrum_shift`, `spectrum_scale`,
//! `pca_transform_matrix`, `wavelengths` and `n_layers`.

use std::fs::File;
use std::path::{Path, PathBuf};

use log::debug;
use ndarray::{arr1, Array1, Array2, ArrayView1, Dimension, Ix1, Ix2, OwnedRepr, Zip};
use ndarray_npy::{NpzReader, NpzWriter};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur loading or evaluating emulator bundles
#[derive(Debug, Error)]
pub enum EmulatorError {
    #[error("Failed to read emulator bundle {path}: {reason}")]
    Read { path: PathBuf, reason: String },

    #[error("Failed to write emulator bundle {path}: {reason}")]
    Write { path: PathBuf, reason: String },

    #[error("Emulator bundle shape error: {0}")]
    Shape(String),

    #[error("Emulator expects {expected} inputs, got {got}")]
    InputLength { expected: usize, got: usize },

    #[error("No emulator bundles provided")]
    Empty,

    #[error("Invalid emulator manifest {path}: {reason}")]
    Manifest { path: PathBuf, reason: String },
}

/// Network weights, PCA basis and scalings for one wavelength sub-range.
#[derive(Debug, Clone)]
pub struct EmulatorBundle {
    /// Layer weights, shape `[n_in, n_out]` (applied as `x · W`)
    pub weights: Vec<Array2<f64>>,
    pub biases: Vec<Array1<f64>>,

    /// Activation parameters of each hidden layer
    pub alphas: Vec<Array1<f64>>,
    pub betas: Vec<Array1<f64>>,

    pub parameters_shift: Array1<f64>,
    pub parameters_scale: Array1<f64>,
    pub pca_shift: Array1<f64>,
    pub pca_scale: Array1<f64>,
    pub spectrum_shift: Array1<f64>,
    pub spectrum_scale: Array1<f64>,

    /// PCA basis, shape `[n_pca, n_wavelengths]`
    pub pca_transform_matrix: Array2<f64>,

    /// Rest-frame wavelengths of this sub-range (Å)
    pub wavelengths: Array1<f64>,

    pub n_layers: usize,
}

fn shape_err(msg: String) -> EmulatorError {
    EmulatorError::Shape(msg)
}

impl EmulatorBundle {
    pub fn n_parameters(&self) -> usize {
        self.parameters_shift.len()
    }

    pub fn n_pca(&self) -> usize {
        self.pca_transform_matrix.nrows()
    }

    pub fn n_wavelengths(&self) -> usize {
        self.wavelengths.len()
    }

    /// Check that every array is consistent with the layer chain.
    pub fn validate(&self) -> Result<(), EmulatorError> {
        let n = self.n_layers;
        if n == 0 {
            return Err(shape_err("n_layers must be at least 1".into()));
        }
        if self.weights.len() != n || self.biases.len() != n {
            return Err(shape_err(format!(
                "expected {n} weight and bias arrays, got {} and {}",
                self.weights.len(),
                self.biases.len()
            )));
        }
        if self.alphas.len() != n - 1 || self.betas.len() != n - 1 {
            return Err(shape_err(format!(
                "expected {} hidden-layer activations, got {} alphas and {} betas",
                n - 1,
                self.alphas.len(),
                self.betas.len()
            )));
        }

        let n_params = self.parameters_shift.len();
        if self.parameters_scale.len() != n_params {
            return Err(shape_err("parameters_shift and parameters_scale differ in length".into()));
        }

        let mut width = n_params;
        for (i, (w, b)) in self.weights.iter().zip(&self.biases).enumerate() {
            if w.nrows() != width {
                return Err(shape_err(format!(
                    "W_{i} has {} rows but the layer input has {width} values",
                    w.nrows()
                )));
            }
            width = w.ncols();
            if b.len() != width {
                return Err(shape_err(format!("b_{i} has {} values, expected {width}", b.len())));
            }
            if i < n - 1 && (self.alphas[i].len() != width || self.betas[i].len() != width) {
                return Err(shape_err(format!(
                    "alphas_{i}/betas_{i} must have {width} values"
                )));
            }
        }

        let n_pca = self.pca_transform_matrix.nrows();
        if width != n_pca || self.pca_shift.len() != n_pca || self.pca_scale.len() != n_pca {
            return Err(shape_err(format!(
                "network output ({width}), pca_shift ({}), pca_scale ({}) and PCA basis rows ({n_pca}) must agree",
                self.pca_shift.len(),
                self.pca_scale.len()
            )));
        }

        let n_wave = self.pca_transform_matrix.ncols();
        if self.wavelengths.len() != n_wave
            || self.spectrum_shift.len() != n_wave
            || self.spectrum_scale.len() != n_wave
        {
            return Err(shape_err(format!(
                "wavelengths ({}), spectrum_shift ({}), spectrum_scale ({}) and PCA basis columns ({n_wave}) must agree",
                self.wavelengths.len(),
                self.spectrum_shift.len(),
                self.spectrum_scale.len()
            )));
        }
        Ok(())
    }

    /// Natural-log luminosity for one (already transformed) input vector.
    pub fn log_spectrum(&self, params: ArrayView1<f64>) -> Result<Array1<f64>, EmulatorError> {
        if params.len() != self.n_parameters() {
            return Err(EmulatorError::InputLength {
                expected: self.n_parameters(),
                got: params.len(),
            });
        }

        let mut x = (&params - &self.parameters_shift) / &self.parameters_scale;
        for i in 0..self.n_layers - 1 {
            let z = x.dot(&self.weights[i]) + &self.biases[i];
            x = gated_activation(&z, &self.alphas[i], &self.betas[i]);
        }
        let last = self.n_layers - 1;
        let coeffs = x.dot(&self.weights[last]) + &self.biases[last];

        let pca = coeffs * &self.pca_scale + &self.pca_shift;
        Ok(pca.dot(&self.pca_transform_matrix) * &self.spectrum_scale + &self.spectrum_shift)
    }

    /// Load and validate a bundle from an `.npz` archive.
    pub fn from_npz(path: &Path) -> Result<Self, EmulatorError> {
        let read_err = |reason: String| EmulatorError::Read {
            path: path.to_path_buf(),
            reason,
        };
        let file = File::open(path).map_err(|e| read_err(e.to_string()))?;
        let mut npz = NpzReader::new(file).map_err(|e| read_err(e.to_string()))?;
        let names = npz.names().map_err(|e| read_err(e.to_string()))?;

        let n_weights = names
            .iter()
            .filter(|n| n.starts_with("W_"))
            .count();
        let n_layers = read_layer_count(&mut npz)
            .map_err(shape_err)?
            .unwrap_or(n_weights);

        let mut weights = Vec::with_capacity(n_layers);
        let mut biases = Vec::with_capacity(n_layers);
        let mut alphas = Vec::new();
        let mut betas = Vec::new();
        for i in 0..n_layers {
            weights.push(read_array::<Ix2>(&mut npz, &format!("W_{i}")).map_err(read_err)?);
            biases.push(read_array::<Ix1>(&mut npz, &format!("b_{i}")).map_err(read_err)?);
            if i + 1 < n_layers {
                alphas.push(read_array::<Ix1>(&mut npz, &format!("alphas_{i}")).map_err(read_err)?);
                betas.push(read_array::<Ix1>(&mut npz, &format!("betas_{i}")).map_err(read_err)?);
            }
        }

        let mut vector = |key: &str| read_array::<Ix1>(&mut npz, key).map_err(read_err);
        let parameters_shift = vector("parameters_shift")?;
        let parameters_scale = vector("parameters_scale")?;
        let pca_shift = vector("pca_shift")?;
        let pca_scale = vector("pca_scale")?;
        let spectrum_shift = vector("spectrum_shift")?;
        let spectrum_scale = vector("spectrum_scale")?;
        let wavelengths = vector("wavelengths")?;
        let pca_transform_matrix =
            read_array::<Ix2>(&mut npz, "pca_transform_matrix").map_err(read_err)?;

        let bundle = Self {
            weights,
            biases,
            alphas,
            betas,
            parameters_shift,
            parameters_scale,
            pca_shift,
            pca_scale,
            spectrum_shift,
            spectrum_scale,
            pca_transform_matrix,
            wavelengths,
            n_layers,
        };
        bundle.validate()?;
        debug!(
            "Loaded emulator bundle {}: {} layers, {} PCA components, {} wavelengths",
            path.display(),
            bundle.n_layers,
            bundle.n_pca(),
            bundle.n_wavelengths()
        );
        Ok(bundle)
    }

    /// Write the bundle as an `.npz` archive readable by [`Self::from_npz`].
    pub fn write_npz(&self, path: &Path) -> Result<(), EmulatorError> {
        let write_err = |reason: String| EmulatorError::Write {
            path: path.to_path_buf(),
            reason,
        };
        let file = File::create(path).map_err(|e| write_err(e.to_string()))?;
        let mut npz = NpzWriter::new(file);

        for i in 0..self.n_layers {
            npz.add_array(format!("W_{i}"), &self.weights[i])
                .map_err(|e| write_err(e.to_string()))?;
            npz.add_array(format!("b_{i}"), &self.biases[i])
                .map_err(|e| write_err(e.to_string()))?;
        }
        for (i, (a, b)) in self.alphas.iter().zip(&self.betas).enumerate() {
            npz.add_array(format!("alphas_{i}"), a)
                .map_err(|e| write_err(e.to_string()))?;
            npz.add_array(format!("betas_{i}"), b)
                .map_err(|e| write_err(e.to_string()))?;
        }
        let vectors = [
            ("parameters_shift", &self.parameters_shift),
            ("parameters_scale", &self.parameters_scale),
            ("pca_shift", &self.pca_shift),
            ("pca_scale", &self.pca_scale),
            ("spectrum_shift", &self.spectrum_shift),
            ("spectrum_scale", &self.spectrum_scale),
            ("wavelengths", &self.wavelengths),
        ];
        for (name, arr) in vectors {
            npz.add_array(name, arr).map_err(|e| write_err(e.to_string()))?;
        }
        npz.add_array("pca_transform_matrix", &self.pca_transform_matrix)
            .map_err(|e| write_err(e.to_string()))?;
        npz.add_array("n_layers", &arr1(&[self.n_layers as i64]))
            .map_err(|e| write_err(e.to_string()))?;
        npz.finish().map_err(|e| write_err(e.to_string()))?;
        Ok(())
    }
}

/// `y = (β + (1 - β) · sigmoid(α · z)) · z`, elementwise
pub fn gated_activation(z: &Array1<f64>, alpha: &Array1<f64>, beta: &Array1<f64>) -> Array1<f64> {
    Zip::from(z).and(alpha).and(beta).map_collect(|&z, &a, &b| {
        let sigmoid = 1.0 / (1.0 + (-a * z).exp());
        (b + (1.0 - b) * sigmoid) * z
    })
}

fn read_array<D: Dimension>(
    npz: &mut NpzReader<File>,
    key: &str,
) -> Result<ndarray::Array<f64, D>, String> {
    npz.by_name::<OwnedRepr<f64>, D>(&format!("{key}.npy"))
        .or_else(|_| npz.by_name::<OwnedRepr<f64>, D>(key))
        .map_err(|e| format!("failed to read {key}: {e}"))
}

/// Largest layer count accepted from an archive
pub const MAX_LAYERS: usize = 64;

/// `n_layers` is stored as a length-1 integer array (or a scalar).
///
/// `Ok(None)` when the archive does not store it.
fn read_layer_count(npz: &mut NpzReader<File>) -> Result<Option<usize>, String> {
    let from_int = |n: i64| usize::try_from(n).map_err(|_| format!("n_layers = {n} is negative"));
    let stored = if let Ok(a) = npz.by_name::<OwnedRepr<i64>, Ix1>("n_layers.npy") {
        a.first().map(|&n| from_int(n))
    } else if let Ok(a) = npz.by_name::<OwnedRepr<i64>, ndarray::Ix0>("n_layers.npy") {
        Some(from_int(a.into_scalar()))
    } else if let Ok(a) = npz.by_name::<OwnedRepr<f64>, Ix1>("n_layers.npy") {
        a.first().map(|&n| {
            if n.fract() == 0.0 && (0.0..=MAX_LAYERS as f64).contains(&n) {
                Ok(n as usize)
            } else {
                Err(format!("n_layers = {n} is not a layer count"))
            }
        })
    } else {
        None
    };

    match stored.transpose()? {
        Some(n) if !(1..=MAX_LAYERS).contains(&n) => {
            Err(format!("n_layers = {n} must lie in 1..={MAX_LAYERS}"))
        }
        n => Ok(n),
    }
}

/// Ordered list of bundle archives covering consecutive wavelength ranges.
///
/// Relative paths resolve against the manifest's directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmulatorManifest {
    pub bundles: Vec<PathBuf>,
}

impl EmulatorManifest {
    pub fn load_from_file(path: &Path) -> Result<Self, EmulatorError> {
        let manifest_err = |reason: String| EmulatorError::Manifest {
            path: path.to_path_buf(),
            reason,
        };
        let text = std::fs::read_to_string(path).map_err(|e| manifest_err(e.to_string()))?;
        let manifest: Self =
            serde_json::from_str(&text).map_err(|e| manifest_err(e.to_string()))?;
        if manifest.bundles.is_empty() {
            return Err(manifest_err("lists no bundles".into()));
        }
        Ok(manifest)
    }

    pub fn save_to_file(&self, path: &Path) -> Result<(), EmulatorError> {
        let manifest_err = |reason: String| EmulatorError::Manifest {
            path: path.to_path_buf(),
            reason,
        };
        let json = serde_json::to_string_pretty(self).map_err(|e| manifest_err(e.to_string()))?;
        std::fs::write(path, json).map_err(|e| manifest_err(e.to_string()))
    }

    /// Bundle paths resolved against `base`
    pub fn resolve(&self, base: &Path) -> Vec<PathBuf> {
        self.bundles
            .iter()
            .map(|p| if p.is_absolute() { p.clone() } else { base.join(p) })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::constant_bundle;
    use approx::assert_relative_eq;
    use ndarray::{array, Array1};

    /// 2 inputs -> 2 hidden -> 1 PCA coefficient -> 3 wavelengths
    fn tiny_bundle() -> EmulatorBundle {
        EmulatorBundle {
            weights: vec![array![[1.0, 0.0], [0.0, 2.0]], array![[1.0], [1.0]]],
            biases: vec![array![0.0, 0.5], array![0.1]],
            alphas: vec![array![1.0, 1.0]],
            betas: vec![array![0.0, 1.0]],
            parameters_shift: array![1.0, 0.0],
            parameters_scale: array![2.0, 1.0],
            pca_shift: array![0.0],
            pca_scale: array![2.0],
            spectrum_shift: array![1.0, 1.0, 1.0],
            spectrum_scale: array![1.0, 0.5, 2.0],
            pca_transform_matrix: array![[1.0, 2.0, 3.0]],
            wavelengths: array![1000.0, 2000.0, 3000.0],
            n_layers: 2,
        }
    }

    #[test]
    fn test_activation_limits() {
        let z = array![2.0, -3.0];
        // beta = 1 gives the identity, beta = 0 and alpha = 1 gives z·sigmoid(z)
        let y = gated_activation(&z, &array![1.0, 1.0], &array![1.0, 0.0]);
        assert_relative_eq!(y[0], 2.0);
        assert_relative_eq!(y[1], -3.0 / (1.0 + 3.0_f64.exp()), epsilon = 1e-15);
    }

    #[test]
    fn test_forward_pass_by_hand() {
        let bundle = tiny_bundle();
        bundle.validate().unwrap();

        // standardized: [(3-1)/2, 0.25] = [1, 0.25]
        // hidden pre-activation: [1, 0.5 + 0.5] = [1, 1]
        // hidden: [1·sigmoid(1), 1]
        let s = 1.0 / (1.0 + (-1.0_f64).exp());
        let coeff = s + 1.0 + 0.1;
        let pca = coeff * 2.0;
        let expected = [pca * 1.0 + 1.0, pca * 2.0 * 0.5 + 1.0, pca * 3.0 * 2.0 + 1.0];

        let out = bundle.log_spectrum(array![3.0, 0.25].view()).unwrap();
        for (o, e) in out.iter().zip(expected) {
            assert_relative_eq!(*o, e, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_wrong_input_length() {
        let bundle = tiny_bundle();
        assert!(matches!(
            bundle.log_spectrum(array![1.0].view()),
            Err(EmulatorError::InputLength { expected: 2, got: 1 })
        ));
    }

    #[test]
    fn test_validate_catches_bad_chain() {
        let mut bundle = tiny_bundle();
        bundle.weights[1] = array![[1.0], [1.0], [1.0]];
        assert!(matches!(bundle.validate(), Err(EmulatorError::Shape(_))));

        let mut bundle = tiny_bundle();
        bundle.alphas.clear();
        assert!(bundle.validate().is_err());

        let mut bundle = tiny_bundle();
        bundle.wavelengths = array![1.0, 2.0];
        assert!(bundle.validate().is_err());
    }

    #[test]
    fn test_npz_round_trip_preserves_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bundle0.npz");
        let bundle = tiny_bundle();
        bundle.write_npz(&path).unwrap();

        let loaded = EmulatorBundle::from_npz(&path).unwrap();
        assert_eq!(loaded.n_layers, 2);
        let x = array![0.3, -1.2];
        let a = bundle.log_spectrum(x.view()).unwrap();
        let b = loaded.log_spectrum(x.view()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_bad_layer_count_is_shape_error() {
        let dir = tempfile::tempdir().unwrap();
        let write = |name: &str, n_layers: ndarray::Array1<i64>| {
            let path = dir.path().join(name);
            let mut npz = NpzWriter::new(File::create(&path).unwrap());
            npz.add_array("n_layers", &n_layers).unwrap();
            npz.finish().unwrap();
            path
        };

        for (name, n) in [("negative.npz", -1), ("huge.npz", 1 << 40), ("zero.npz", 0)] {
            let path = write(name, array![n]);
            assert!(
                matches!(EmulatorBundle::from_npz(&path), Err(EmulatorError::Shape(_))),
                "n_layers = {n}"
            );
        }

        let path = dir.path().join("fractional.npz");
        let mut npz = NpzWriter::new(File::create(&path).unwrap());
        npz.add_array("n_layers", &array![2.5]).unwrap();
        npz.finish().unwrap();
        assert!(matches!(
            EmulatorBundle::from_npz(&path),
            Err(EmulatorError::Shape(_))
        ));
    }

    #[test]
    fn test_missing_archive() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            EmulatorBundle::from_npz(&dir.path().join("nope.npz")),
            Err(EmulatorError::Read { .. })
        ));
    }

    #[test]
    fn test_constant_bundle_reproduces_template() {
        let wave = Array1::linspace(1000.0, 2000.0, 11);
        let log_template = wave.mapv(|w: f64| (w / 1000.0).ln());
        let bundle = constant_bundle(wave, log_template.clone(), 9);
        let out = bundle.log_spectrum(Array1::from_elem(9, 0.7).view()).unwrap();
        assert_eq!(out, log_template);
    }

    #[test]
    fn test_manifest_round_trip_and_resolve() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("manifest.json");
        let manifest = EmulatorManifest {
            bundles: vec!["a.npz".into(), "/abs/b.npz".into()],
        };
        manifest.save_to_file(&path).unwrap();

        let loaded = EmulatorManifest::load_from_file(&path).unwrap();
        assert_eq!(loaded, manifest);
        let resolved = loaded.resolve(dir.path());
        assert_eq!(resolved[0], dir.path().join("a.npz"));
        assert_eq!(resolved[1], PathBuf::from("/abs/b.npz"));
    }
}
