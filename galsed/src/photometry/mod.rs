//! Photometry models and utilities

pub mod filter_response;
pub mod filters;
pub mod spectrum;

pub use filter_response::{FilterError, FilterResponse};
pub use filters::{Bandpass, FilterSet};
pub use spectrum::{Band, CGS, FLUX_UNIT, SPEED_OF_LIGHT_KMS};
