//! Galaxy SED forward model with non-parametric star formation histories
//!
//! This crate computes galaxy spectral energy distributions from a compact
//! parameter vector: star formation and metallicity histories expressed in
//! an NMF basis, dust attenuation and an optional starburst. Spectra are
//! evaluated either by summing simple stellar populations from an external
//! engine or through a PCA-neural emulator, then redshifted, smoothed,
//! resampled and optionally integrated into broadband photometry.

pub mod assembler;
pub mod basis;
pub mod config;
pub mod cosmology;
pub mod data_store;
pub mod emulator;
pub mod error;
pub mod evaluator;
pub mod model;
pub mod params;
pub mod photometry;
pub mod resolution;
pub mod sfh;
pub mod ssp;
#[cfg(any(test, feature = "test-util"))]
pub mod test_util;
pub mod units;

// Re-exports for easier access
pub use assembler::{SedAssembler, SedOptions, SedOutput, SpectrumResult, StackedSed};
pub use basis::{BasisFamily, BasisStore, Interpolation};
pub use config::{EmulatorConfig, ModelConfig};
pub use cosmology::{Cosmology, CosmologyAdapter, FlatLambdaCdm};
pub use data_store::DataStore;
pub use emulator::{EmulatorBundle, PcaEmulator};
pub use error::{DomainWarning, ModelError, ModelResult};
pub use evaluator::{EvaluatorKind, RestFrameSpectrum, SpectrumEvaluator, SurrogateEvaluator};
pub use model::{Model, ModelBuilder};
pub use params::{ParameterSchema, Theta, TimeReference};
pub use photometry::{Bandpass, FilterResponse, FilterSet};
pub use resolution::ResolutionMatrix;
pub use sfh::{LookbackBinning, MetallicityBounds, SfhEngine};
pub use ssp::{ReferenceEvaluator, SspEngine, SspError, SspParams, SspSpectrum};
