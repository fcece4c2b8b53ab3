//! Location of basis tables and emulator bundles on disk.
//!
//! The data root is taken from, in order: an explicit path, the
//! `GALSED_DATA_DIR` environment variable, or `~/.galsed/`. Basis tables
//! live under `basis/` and emulator manifests under `emulators/`.

use std::path::{Path, PathBuf};

use crate::basis::{BasisFamily, BasisStore, Interpolation};
use crate::error::{ModelError, ModelResult};

/// Environment variable overriding the default data root
pub const DATA_DIR_ENV: &str = "GALSED_DATA_DIR";

/// Resolved data directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataStore {
    root_path: PathBuf,
}

impl DataStore {
    /// Resolve the data root, preferring `explicit` when given.
    pub fn resolve(explicit: Option<&Path>) -> ModelResult<Self> {
        if let Some(path) = explicit {
            return Ok(Self::with_path(path.to_path_buf()));
        }
        if let Some(dir) = std::env::var_os(DATA_DIR_ENV) {
            return Ok(Self::with_path(PathBuf::from(dir)));
        }
        let home = std::env::var_os("HOME").ok_or_else(|| {
            ModelError::configuration(format!("neither {DATA_DIR_ENV} nor HOME is set"))
        })?;
        Ok(Self::with_path(PathBuf::from(home).join(".galsed")))
    }

    pub fn with_path(root_path: PathBuf) -> Self {
        Self { root_path }
    }

    pub fn root_path(&self) -> &Path {
        &self.root_path
    }

    pub fn basis_dir(&self) -> PathBuf {
        self.root_path.join("basis")
    }

    pub fn emulator_dir(&self) -> PathBuf {
        self.root_path.join("emulators")
    }

    /// Resolve a configured path: absolute paths are kept, relative ones
    /// are taken relative to the emulator directory.
    pub fn emulator_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.emulator_dir().join(path)
        }
    }

    /// Basis files of `family` that are not present.
    pub fn missing_basis_files(&self, family: BasisFamily) -> Vec<PathBuf> {
        let dir = self.basis_dir();
        family
            .files()
            .iter()
            .map(|f| dir.join(f))
            .filter(|p| !p.exists())
            .collect()
    }

    /// Load the basis tables of `family`.
    ///
    /// # Errors
    /// [`ModelError::Configuration`] naming every missing file, or the
    /// basis parse error.
    pub fn load_basis(
        &self,
        family: BasisFamily,
        interpolation: Interpolation,
    ) -> ModelResult<BasisStore> {
        let missing = self.missing_basis_files(family);
        if !missing.is_empty() {
            let names: Vec<String> = missing.iter().map(|p| p.display().to_string()).collect();
            return Err(ModelError::configuration(format!(
                "{family} basis files not found: {}",
                names.join(", ")
            )));
        }
        Ok(BasisStore::load(&self.basis_dir(), family, interpolation)?)
    }
}
