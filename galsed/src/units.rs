//! Type-safe physical units for SED modeling
//!
//! Distances flow through the `uom` crate so that the cosmology layer can
//! hand out a `Length` and the flux calculation decides which unit it
//! needs (centimeters for CGS flux densities).

use uom::si::f64::Length as UomLength;
use uom::si::length::{centimeter, meter, nanometer};

/// Type alias for length measurements with convenient methods
pub type Length = UomLength;

/// Meters in one megaparsec
pub const METERS_PER_MEGAPARSEC: f64 = 3.085_677_581_491_367e22;

/// Extension trait for length conversions used in cosmology and spectroscopy
pub trait LengthExt {
    /// Create length from megaparsecs (cosmological distances)
    fn from_megaparsecs(mpc: f64) -> Self;

    /// Get length in megaparsecs
    fn as_megaparsecs(&self) -> f64;

    /// Create length from centimeters
    fn from_centimeters(cm: f64) -> Self;

    /// Get length in centimeters
    fn as_centimeters(&self) -> f64;

    /// Create length from angstroms (wavelengths)
    fn from_angstroms(aa: f64) -> Self;

    /// Get length in angstroms
    fn as_angstroms(&self) -> f64;
}

impl LengthExt for Length {
    fn from_megaparsecs(mpc: f64) -> Self {
        Length::new::<meter>(mpc * METERS_PER_MEGAPARSEC)
    }

    fn as_megaparsecs(&self) -> f64 {
        self.get::<meter>() / METERS_PER_MEGAPARSEC
    }

    fn from_centimeters(cm: f64) -> Self {
        Length::new::<centimeter>(cm)
    }

    fn as_centimeters(&self) -> f64 {
        self.get::<centimeter>()
    }

    fn from_angstroms(aa: f64) -> Self {
        Length::new::<nanometer>(aa * 0.1)
    }

    fn as_angstroms(&self) -> f64 {
        self.get::<nanometer>() * 10.0
    }
}
