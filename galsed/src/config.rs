//! Model configuration stored as JSON.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::basis::{BasisFamily, Interpolation};
use crate::cosmology::FlatLambdaCdm;
use crate::evaluator::EvaluatorKind;
use crate::sfh::{LookbackBinning, MetallicityBounds};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write config {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Emulator manifests for the surrogate path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmulatorConfig {
    /// Manifest listing the continuous (NMF) bundles
    pub continuous: PathBuf,

    /// Manifest listing the burst bundles
    #[serde(default)]
    pub burst: Option<PathBuf>,
}

/// Everything needed to construct a [`crate::Model`].
///
/// Relative paths are resolved against the data directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// `tojeiro.4comp`, `tng.4comp` or `tng.6comp`
    pub basis_family: String,

    #[serde(default)]
    pub interpolation: Interpolation,

    /// Whether parameter rows carry `fburst` and `tburst`
    #[serde(default = "default_burst")]
    pub burst: bool,

    #[serde(default)]
    pub evaluator: EvaluatorKind,

    #[serde(default)]
    pub emulator: Option<EmulatorConfig>,

    #[serde(default)]
    pub cosmology: FlatLambdaCdm,

    #[serde(default)]
    pub binning: LookbackBinning,

    #[serde(default)]
    pub metallicity_bounds: MetallicityBounds,

    /// Data directory override (see [`crate::data_store::DataStore`])
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

fn default_burst() -> bool {
    true
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            basis_family: BasisFamily::Tojeiro4.name().to_string(),
            interpolation: Interpolation::default(),
            burst: true,
            evaluator: EvaluatorKind::default(),
            emulator: None,
            cosmology: FlatLambdaCdm::default(),
            binning: LookbackBinning::default(),
            metallicity_bounds: MetallicityBounds::default(),
            data_dir: None,
        }
    }
}

impl ModelConfig {
    /// Parse the basis family name.
    pub fn family(&self) -> Result<BasisFamily, crate::basis::BasisError> {
        self.basis_family.parse()
    }

    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&json)?)
    }

    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_json_uses_defaults() {
        let config: ModelConfig = serde_json::from_str(r#"{"basis_family": "tng.4comp"}"#).unwrap();
        assert_eq!(config.family().unwrap(), BasisFamily::Tng4);
        assert!(config.burst);
        assert_eq!(config.evaluator, EvaluatorKind::Reference);
        assert_eq!(config.interpolation, Interpolation::Linear);
        assert_eq!(config.binning, LookbackBinning::default());
        assert_eq!(config.cosmology, FlatLambdaCdm::planck13());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        let config = ModelConfig {
            burst: false,
            evaluator: EvaluatorKind::Surrogate,
            emulator: Some(EmulatorConfig {
                continuous: "nmf.json".into(),
                burst: None,
            }),
            ..Default::default()
        };
        config.save_to_file(&path).unwrap();
        assert_eq!(ModelConfig::load_from_file(&path).unwrap(), config);
    }

    #[test]
    fn test_unknown_family_rejected() {
        let config = ModelConfig {
            basis_family: "bogus".into(),
            ..Default::default()
        };
        assert!(config.family().is_err());
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            ModelConfig::load_from_file(Path::new("/nonexistent/model.json")),
            Err(ConfigError::Read { .. })
        ));
    }
}
