//! Background cosmology: cosmic age and luminosity distance.
//!
//! [`FlatLambdaCdm`] integrates the Friedmann equation directly.
//! [`CosmologyAdapter`] wraps any [`Cosmology`] and tabulates it on a
//! coarse redshift grid so that per-sample lookups (redshift ↔ age,
//! luminosity distance) are cheap spline evaluations.

use log::debug;
use sed_math::{linspace, simpson, CubicSpline};
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};
use crate::units::{Length, LengthExt};

/// Hubble time in Gyr for H0 = 1 km/s/Mpc
const HUBBLE_TIME_GYR_UNIT_H0: f64 = 977.792_221_680_789_1;

/// Hubble distance in Mpc for H0 = 1 km/s/Mpc
const HUBBLE_DISTANCE_MPC_UNIT_H0: f64 = 299_792.458;

/// Provider of cosmic age and luminosity distance as functions of redshift.
pub trait Cosmology {
    /// Age of the universe at redshift `z`, in Gyr
    fn age_gyr(&self, z: f64) -> f64;

    /// Luminosity distance to redshift `z`
    fn luminosity_distance(&self, z: f64) -> Length;
}

/// Spatially flat ΛCDM with an optional radiation term.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FlatLambdaCdm {
    /// Hubble constant in km/s/Mpc
    pub h0: f64,

    /// Matter density parameter today
    pub omega_m: f64,

    /// Radiation density parameter today (photons plus massless neutrinos)
    #[serde(default)]
    pub omega_r: f64,
}

impl Default for FlatLambdaCdm {
    fn default() -> Self {
        Self::planck13()
    }
}

impl FlatLambdaCdm {
    /// Planck 2013 parameters (H0 = 67.77, Ωm = 0.30712)
    pub const fn planck13() -> Self {
        Self {
            h0: 67.77,
            omega_m: 0.30712,
            omega_r: 7.86e-5,
        }
    }

    /// Dark energy density, closing the universe
    pub fn omega_lambda(&self) -> f64 {
        1.0 - self.omega_m - self.omega_r
    }

    /// Dimensionless Hubble parameter E(z) = H(z)/H0
    pub fn efunc(&self, z: f64) -> f64 {
        let zp1 = 1.0 + z;
        (self.omega_r * zp1.powi(4) + self.omega_m * zp1.powi(3) + self.omega_lambda()).sqrt()
    }

    pub fn hubble_time_gyr(&self) -> f64 {
        HUBBLE_TIME_GYR_UNIT_H0 / self.h0
    }

    pub fn hubble_distance_mpc(&self) -> f64 {
        HUBBLE_DISTANCE_MPC_UNIT_H0 / self.h0
    }

    /// Line-of-sight comoving distance in Mpc
    pub fn comoving_distance_mpc(&self, z: f64) -> f64 {
        if z <= 0.0 {
            return 0.0;
        }
        let intervals = ((z * 400.0).ceil() as usize).max(64);
        self.hubble_distance_mpc() * simpson(|zz| 1.0 / self.efunc(zz), 0.0, z, intervals)
    }
}

impl Cosmology for FlatLambdaCdm {
    fn age_gyr(&self, z: f64) -> f64 {
        // t = ∫_0^a da' / (a' E(a')) with a = u² to tame the a → 0 end
        let a_max = 1.0 / (1.0 + z);
        let (om, or, ol) = (self.omega_m, self.omega_r, self.omega_lambda());
        let integrand = |u: f64| {
            if u <= 0.0 {
                return 0.0;
            }
            let u2 = u * u;
            2.0 * u2 * u / (or + om * u2 + ol * u2 * u2 * u2 * u2).sqrt()
        };
        self.hubble_time_gyr() * simpson(integrand, 0.0, a_max.sqrt(), 2000)
    }

    fn luminosity_distance(&self, z: f64) -> Length {
        Length::from_megaparsecs((1.0 + z) * self.comoving_distance_mpc(z))
    }
}

/// Cosmology with precomputed interpolators over a redshift grid.
///
/// The model uses the exact [`Cosmology::age_gyr`] for the per-sample
/// redshift → age conversion and the tabulated splines for the inverse
/// (age → redshift, needed by the surrogate inputs) and for luminosity
/// distance. All splines extrapolate past the grid.
pub struct CosmologyAdapter {
    cosmology: Box<dyn Cosmology + Send + Sync>,
    age_of_z: CubicSpline,
    z_of_age: CubicSpline,
    dlum_cm_of_z: CubicSpline,
}

impl std::fmt::Debug for CosmologyAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CosmologyAdapter")
            .field("z_domain", &self.age_of_z.domain())
            .finish()
    }
}

impl CosmologyAdapter {
    /// Upper end of the tabulated redshift grid
    pub const Z_MAX: f64 = 0.5;

    /// Number of tabulated redshifts
    pub const N_GRID: usize = 100;

    /// Tabulate `cosmology` over `z ∈ [0, 0.5]`.
    ///
    /// # Errors
    /// [`ModelError::Configuration`] if age is not strictly decreasing or
    /// luminosity distance not strictly increasing over the grid.
    pub fn new<C>(cosmology: C) -> ModelResult<Self>
    where
        C: Cosmology + Send + Sync + 'static,
    {
        let z = linspace(0.0, Self::Z_MAX, Self::N_GRID);
        let ages: Vec<f64> = z.iter().map(|&zz| cosmology.age_gyr(zz)).collect();
        let dlum: Vec<f64> = z
            .iter()
            .map(|&zz| cosmology.luminosity_distance(zz).as_centimeters())
            .collect();

        if ages.windows(2).any(|w| w[1] >= w[0]) {
            return Err(ModelError::configuration(
                "cosmic age must decrease monotonically with redshift",
            ));
        }
        if dlum.windows(2).any(|w| w[1] <= w[0]) {
            return Err(ModelError::configuration(
                "luminosity distance must increase monotonically with redshift",
            ));
        }
        debug!(
            "Tabulated cosmology: age(0) = {:.4} Gyr, age({}) = {:.4} Gyr",
            ages[0],
            Self::Z_MAX,
            ages[ages.len() - 1]
        );

        // age decreases with z, so the inverse table runs reversed
        let ages_rev: Vec<f64> = ages.iter().rev().copied().collect();
        let z_rev: Vec<f64> = z.iter().rev().copied().collect();

        let table = |x: Vec<f64>, y: Vec<f64>| {
            CubicSpline::new(x, y).map_err(|e| ModelError::configuration(e.to_string()))
        };
        Ok(Self {
            cosmology: Box::new(cosmology),
            age_of_z: table(z.clone(), ages)?,
            z_of_age: table(ages_rev, z_rev)?,
            dlum_cm_of_z: table(z, dlum)?,
        })
    }

    /// Exact age of the universe at `z` (Gyr)
    pub fn age(&self, z: f64) -> f64 {
        self.cosmology.age_gyr(z)
    }

    /// Interpolated age of the universe at `z` (Gyr)
    pub fn age_interpolated(&self, z: f64) -> f64 {
        self.age_of_z.evaluate(z)
    }

    /// Redshift at which the universe has age `tage` Gyr
    pub fn redshift_at_age(&self, tage: f64) -> f64 {
        self.z_of_age.evaluate(tage)
    }

    /// Interpolated luminosity distance in cm
    pub fn luminosity_distance_cm(&self, z: f64) -> f64 {
        self.dlum_cm_of_z.evaluate(z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_planck13_present_age() {
        let cosmo = FlatLambdaCdm::planck13();
        // 13.80 Gyr for Planck 2013
        assert_relative_eq!(cosmo.age_gyr(0.0), 13.80, max_relative = 3e-3);
    }

    #[test]
    fn test_matter_only_age_analytic() {
        // Einstein-de Sitter: t(z) = 2 / (3 H0) (1 + z)^-1.5
        let eds = FlatLambdaCdm {
            h0: 70.0,
            omega_m: 1.0,
            omega_r: 0.0,
        };
        let expected = 2.0 / 3.0 * eds.hubble_time_gyr() * 1.5_f64.powf(-1.5);
        assert_relative_eq!(eds.age_gyr(0.5), expected, max_relative = 1e-6);
    }

    #[test]
    fn test_luminosity_distance_low_z_hubble_law() {
        let cosmo = FlatLambdaCdm::planck13();
        let z = 1e-3;
        let d = cosmo.luminosity_distance(z).as_megaparsecs();
        assert_relative_eq!(d, z * cosmo.hubble_distance_mpc(), max_relative = 2e-3);
    }

    #[test]
    fn test_luminosity_distance_z01() {
        let d = FlatLambdaCdm::planck13().luminosity_distance(0.1);
        assert_relative_eq!(d.as_megaparsecs(), 475.19, max_relative = 1e-3);
    }

    #[test]
    fn test_adapter_round_trip() {
        let adapter = CosmologyAdapter::new(FlatLambdaCdm::planck13()).unwrap();
        for z in [0.01, 0.1, 0.25, 0.45] {
            let tage = adapter.age(z);
            assert_relative_eq!(adapter.age_interpolated(z), tage, max_relative = 1e-6);
            assert_relative_eq!(adapter.redshift_at_age(tage), z, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_adapter_distance_matches_exact() {
        let cosmo = FlatLambdaCdm::planck13();
        let adapter = CosmologyAdapter::new(cosmo).unwrap();
        let exact = cosmo.luminosity_distance(0.173).as_centimeters();
        assert_relative_eq!(adapter.luminosity_distance_cm(0.173), exact, max_relative = 1e-6);
    }

    #[test]
    fn test_adapter_extrapolates() {
        let adapter = CosmologyAdapter::new(FlatLambdaCdm::planck13()).unwrap();
        let d = adapter.luminosity_distance_cm(0.6);
        assert!(d > adapter.luminosity_distance_cm(0.5));
        assert!(adapter.age_interpolated(0.6) < adapter.age_interpolated(0.5));
    }

    #[test]
    fn test_rejects_non_monotonic_cosmology() {
        struct Static;
        impl Cosmology for Static {
            fn age_gyr(&self, _z: f64) -> f64 {
                10.0
            }
            fn luminosity_distance(&self, z: f64) -> Length {
                Length::from_megaparsecs(z * 4000.0)
            }
        }
        assert!(matches!(
            CosmologyAdapter::new(Static),
            Err(ModelError::Configuration(_))
        ));
    }
}
