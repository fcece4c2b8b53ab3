//! Physical constants and wavelength bands for synthetic photometry.
//!
//! All flux calculations use CGS units:
//! - **Luminosity density**: L_sun Å⁻¹ (as produced by the SSP engines)
//! - **Flux density**: erg s⁻¹ cm⁻² Å⁻¹
//! - **Wavelengths**: Ångström, following stellar population conventions

/// Physical constants in CGS units for astronomical calculations.
pub struct CGS {}

impl CGS {
    /// AB magnitude system zero-point flux density
    /// Units: 3631e-23 erg s⁻¹ cm⁻² Hz⁻¹
    pub const AB_ZERO_POINT_FLUX_DENSITY: f64 = 3631e-23;

    /// 1 Jansky in CGS units
    /// Units: 1e-23 erg s⁻¹ cm⁻² Hz⁻¹
    pub const JANSKY_IN_CGS: f64 = 1e-23;

    /// Speed of light in vacuum
    /// Units: 2.99792458e10 cm/s
    pub const SPEED_OF_LIGHT: f64 = 2.99792458e10;

    /// Speed of light in Å/s, used for f_ν ↔ f_λ conversions
    pub const SPEED_OF_LIGHT_AA: f64 = 2.99792458e18;

    /// Solar luminosity
    /// Units: 3.846e33 erg s⁻¹
    pub const SOLAR_LUMINOSITY: f64 = 3.846e33;
}

/// Speed of light in km/s used for velocity-space pixel widths
pub const SPEED_OF_LIGHT_KMS: f64 = 2.998e5;

/// Flux unit of the returned spectra: 1e-17 erg s⁻¹ cm⁻² Å⁻¹
pub const FLUX_UNIT: f64 = 1e-17;

/// Wavelength range specification in Ångström.
///
/// Used to describe filter supports and spectral coverage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Band {
    /// Lower wavelength bound in Ångström
    pub lower_aa: f64,

    /// Upper wavelength bound in Ångström
    pub upper_aa: f64,
}

impl Band {
    /// Create a new Band directly from lower and upper bounds
    ///
    /// # Panics
    /// Non-finite, negative or inverted bounds are programming errors.
    pub fn from_aa_bounds(lower_aa: f64, upper_aa: f64) -> Self {
        if !lower_aa.is_finite() || !upper_aa.is_finite() {
            panic!("Wavelength range cannot contain non-finite values");
        }
        if lower_aa > upper_aa {
            panic!(
                "Invalid wavelength range: start must be less than end, got {}..{}",
                lower_aa, upper_aa,
            );
        }
        if lower_aa < 0.0 {
            panic!("Wavelengths must be non-negative");
        }

        Self { lower_aa, upper_aa }
    }

    /// Width of the band in Ångström
    pub fn width(&self) -> f64 {
        self.upper_aa - self.lower_aa
    }

    /// Center of the band in Ångström
    pub fn center(&self) -> f64 {
        0.5 * (self.lower_aa + self.upper_aa)
    }

    /// Whether `other` lies entirely within this band
    pub fn covers(&self, other: &Band) -> bool {
        self.lower_aa <= other.lower_aa && self.upper_aa >= other.upper_aa
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_band_geometry() {
        let band = Band::from_aa_bounds(4000.0, 5000.0);
        assert_relative_eq!(band.width(), 1000.0);
        assert_relative_eq!(band.center(), 4500.0);
    }

    #[test]
    fn test_band_covers() {
        let wide = Band::from_aa_bounds(3000.0, 9000.0);
        let narrow = Band::from_aa_bounds(4000.0, 5000.0);
        assert!(wide.covers(&narrow));
        assert!(!narrow.covers(&wide));
    }

    #[test]
    #[should_panic(expected = "Invalid wavelength range")]
    fn test_inverted_band_panics() {
        Band::from_aa_bounds(5000.0, 4000.0);
    }

    #[test]
    fn test_speed_of_light_units_agree() {
        assert_relative_eq!(CGS::SPEED_OF_LIGHT * 1e8, CGS::SPEED_OF_LIGHT_AA);
        assert_relative_eq!(CGS::SPEED_OF_LIGHT / 1e5, SPEED_OF_LIGHT_KMS, max_relative = 1e-3);
    }
}
