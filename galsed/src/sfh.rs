//! Star formation and metallicity histories on a log-spaced lookback grid.
//!
//! The continuous SFH is a linear combination of the high-resolution SFH
//! basis tabulations, integrated onto lookback-time bins derived from the
//! galaxy age and normalized to unit formed mass. An optional starburst
//! adds a single-bin spike. Metallicity histories combine the ZH basis at
//! bin centers and are clipped to the isochrone metallicity range.

use log::warn;
use sed_math::{arange, digitize, trapz_rebin};
use serde::{Deserialize, Serialize};

use crate::basis::BasisStore;
use crate::error::{DomainWarning, ModelError, ModelResult};
use crate::params::Theta;

/// Log-spaced lookback-time binning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LookbackBinning {
    /// First non-zero edge in Gyr
    pub min_edge_gyr: f64,

    /// Edge spacing in dex
    pub dex_step: f64,
}

impl Default for LookbackBinning {
    fn default() -> Self {
        Self {
            min_edge_gyr: 1e-2,
            dex_step: 0.05,
        }
    }
}

impl LookbackBinning {
    /// Bin edges `[0, min_edge, min_edge·10^step, ..., tage]`.
    ///
    /// # Errors
    /// `tage` must exceed the first non-zero edge.
    pub fn edges(&self, tage: f64) -> ModelResult<Vec<f64>> {
        if !(tage > self.min_edge_gyr) || !tage.is_finite() {
            return Err(ModelError::precondition(format!(
                "galaxy age {tage} Gyr must exceed the first lookback bin edge {} Gyr",
                self.min_edge_gyr
            )));
        }

        let mut edges = vec![0.0];
        edges.extend(
            arange(self.min_edge_gyr.log10(), tage.log10(), self.dex_step)
                .into_iter()
                .map(|e| 10f64.powf(e))
                .filter(|&t| t < tage),
        );
        edges.push(tage);
        Ok(edges)
    }
}

/// Isochrone metallicity bounds (absolute Z).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetallicityBounds {
    pub min: f64,
    pub max: f64,
}

impl Default for MetallicityBounds {
    /// MIST isochrone range
    fn default() -> Self {
        Self {
            min: 4.490_434_31e-5,
            max: 4.490_434_31e-2,
        }
    }
}

impl MetallicityBounds {
    pub fn clip(&self, z: f64) -> f64 {
        z.clamp(self.min, self.max)
    }

    pub fn contains(&self, z: f64) -> bool {
        (self.min..=self.max).contains(&z)
    }
}

/// Piecewise-constant star formation rate on lookback-time bins.
#[derive(Debug, Clone, PartialEq)]
pub struct StarFormationHistory {
    /// Bin edges in Gyr of lookback time, from 0 to the galaxy age
    pub edges: Vec<f64>,

    /// Star formation rate per bin (Msun/Gyr, or unit mass when normalized)
    pub sfr: Vec<f64>,
}

impl StarFormationHistory {
    pub fn widths(&self) -> Vec<f64> {
        self.edges.windows(2).map(|w| w[1] - w[0]).collect()
    }

    pub fn centers(&self) -> Vec<f64> {
        self.edges.windows(2).map(|w| 0.5 * (w[0] + w[1])).collect()
    }

    /// Mass formed in each bin
    pub fn bin_masses(&self) -> Vec<f64> {
        self.edges
            .windows(2)
            .zip(&self.sfr)
            .map(|(w, s)| (w[1] - w[0]) * s)
            .collect()
    }

    /// `Σ Δt · sfr`
    pub fn total_mass(&self) -> f64 {
        self.bin_masses().iter().sum()
    }
}

/// Metallicity per lookback-time bin.
#[derive(Debug, Clone, PartialEq)]
pub struct MetallicityHistory {
    pub edges: Vec<f64>,
    pub metallicity: Vec<f64>,

    /// Number of bins clipped to the isochrone bounds
    pub clipped_bins: usize,
}

impl MetallicityHistory {
    pub fn warning(&self) -> Option<DomainWarning> {
        (self.clipped_bins > 0).then_some(DomainWarning::MetallicityClipped {
            bins: self.clipped_bins,
        })
    }
}

/// Single-bin starburst placement: `1/Δt` in the bin containing `tburst`.
///
/// Bursts at or beyond the last edge produce an all-zero history.
pub fn burst_history(tburst: f64, edges: &[f64]) -> Vec<f64> {
    let mut sfr = vec![0.0; edges.len().saturating_sub(1)];
    let Some(&t_max) = edges.last() else {
        return sfr;
    };
    if tburst < t_max && tburst >= edges[0] {
        let i = digitize(tburst, edges) - 1;
        sfr[i] = 1.0 / (edges[i + 1] - edges[i]);
    }
    sfr
}

/// Star formation and metallicity history calculator for one basis.
#[derive(Debug, Clone)]
pub struct SfhEngine {
    basis: BasisStore,
    binning: LookbackBinning,
    bounds: MetallicityBounds,
}

impl SfhEngine {
    pub fn new(basis: BasisStore, binning: LookbackBinning, bounds: MetallicityBounds) -> Self {
        Self {
            basis,
            binning,
            bounds,
        }
    }

    pub fn basis(&self) -> &BasisStore {
        &self.basis
    }

    pub fn binning(&self) -> &LookbackBinning {
        &self.binning
    }

    pub fn bounds(&self) -> &MetallicityBounds {
        &self.bounds
    }

    /// Continuous SFH with unit formed mass: no burst, no stellar mass.
    pub fn continuous_history(&self, theta: &Theta, tage: f64) -> ModelResult<StarFormationHistory> {
        let edges = self.binning.edges(tage)?;
        let sfh_hr = self.basis.high_res_combination(&theta.beta);
        let mut sfr = trapz_rebin(self.basis.high_res_grid(), &sfh_hr, &edges)?;

        let norm: f64 = edges
            .windows(2)
            .zip(&sfr)
            .map(|(w, s)| (w[1] - w[0]) * s)
            .sum();
        if !(norm > 0.0) || !norm.is_finite() {
            return Err(ModelError::precondition(format!(
                "SFH coefficients {:?} give no star formation before {tage} Gyr",
                theta.beta
            )));
        }
        sfr.iter_mut().for_each(|s| *s /= norm);

        Ok(StarFormationHistory { edges, sfr })
    }

    /// Full SFH: continuous part, optional burst, scaled by `10^logmstar`.
    ///
    /// The burst counts only if `tburst < tage`; otherwise the continuous
    /// part keeps the full mass.
    pub fn history(&self, theta: &Theta, tage: f64) -> ModelResult<StarFormationHistory> {
        let mut sfh = self.continuous_history(theta, tage)?;

        if let Some(burst) = theta.active_burst(tage) {
            check_tburst(burst.tburst)?;
            let spike = burst_history(burst.tburst, &sfh.edges);
            for (s, b) in sfh.sfr.iter_mut().zip(spike) {
                *s = (1.0 - burst.fburst) * *s + burst.fburst * b;
            }
        }

        let mass = theta.mass();
        sfh.sfr.iter_mut().for_each(|s| *s *= mass);
        Ok(sfh)
    }

    /// Metallicity at lookback time `t`, clipped. Returns the value and
    /// whether clipping occurred.
    pub fn metallicity_at(&self, theta: &Theta, t: f64) -> (f64, bool) {
        let z = self.basis.metallicity(&theta.gamma, t);
        let clipped = self.bounds.clip(z);
        (clipped, clipped != z)
    }

    /// Clipped metallicity of a burst at lookback time `tburst`, with a
    /// warning when the clip was applied.
    pub fn burst_metallicity(&self, theta: &Theta, tburst: f64) -> (f64, Option<DomainWarning>) {
        let (z, clipped) = self.metallicity_at(theta, tburst);
        let warning = clipped.then_some(DomainWarning::BurstMetallicityClipped { tburst });
        if let Some(w) = &warning {
            warn!("{w}");
        }
        (z, warning)
    }

    /// Metallicity history at bin centers.
    pub fn metallicity_history(&self, theta: &Theta, tage: f64) -> ModelResult<MetallicityHistory> {
        let edges = self.binning.edges(tage)?;
        let mut clipped_bins = 0;
        let metallicity = edges
            .windows(2)
            .map(|w| {
                let (z, clipped) = self.metallicity_at(theta, 0.5 * (w[0] + w[1]));
                clipped_bins += usize::from(clipped);
                z
            })
            .collect();

        let zh = MetallicityHistory {
            edges,
            metallicity,
            clipped_bins,
        };
        if let Some(w) = zh.warning() {
            warn!("{w}");
        }
        Ok(zh)
    }

    /// Mass-weighted metallicity `Σ Δt · sfr · Z / 10^logmstar`.
    pub fn mass_weighted_metallicity(&self, theta: &Theta, tage: f64) -> ModelResult<f64> {
        let sfh = self.history(theta, tage)?;
        let zh = self.metallicity_history(theta, tage)?;
        let weighted: f64 = sfh
            .bin_masses()
            .iter()
            .zip(&zh.metallicity)
            .map(|(m, z)| m * z)
            .sum();
        Ok(weighted / theta.mass())
    }

    /// Stellar mass formed within the most recent `dt` Gyr of lookback time.
    ///
    /// A burst counts iff `tburst <= dt`, independently of the age.
    ///
    /// # Errors
    /// `dt` must lie strictly inside `(0, tage)`.
    pub fn mass_formed_within(&self, theta: &Theta, tage: f64, dt: f64) -> ModelResult<f64> {
        let sfh = self.continuous_history(theta, tage)?;
        let edges = &sfh.edges;
        let t_max = edges[edges.len() - 1];
        if !(dt > 0.0 && dt < t_max) {
            return Err(ModelError::precondition(format!(
                "averaging window dt = {dt} Gyr must lie strictly between 0 and the oldest bin edge {t_max} Gyr"
            )));
        }

        let i_dt = digitize(dt, edges) - 1;
        let mut mass: f64 = sfh.bin_masses()[..i_dt].iter().sum();
        mass += (dt - edges[i_dt]) * sfh.sfr[i_dt];

        if let Some(burst) = theta.burst {
            let fburst = if burst.tburst > dt { 0.0 } else { burst.fburst };
            mass = mass * (1.0 - fburst) + fburst;
        }

        Ok(mass * theta.mass())
    }

    /// Average star formation rate over the most recent `dt` Gyr (Msun/Gyr).
    pub fn average_sfr(&self, theta: &Theta, tage: f64, dt: f64) -> ModelResult<f64> {
        Ok(self.mass_formed_within(theta, tage, dt)? / dt)
    }
}

fn check_tburst(tburst: f64) -> ModelResult<()> {
    if !(tburst >= 0.0) {
        return Err(ModelError::precondition(format!(
            "burst lookback time must be non-negative, got {tburst}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{Burst, ParameterSchema};
    use crate::test_util::synthetic_basis;
    use approx::assert_relative_eq;

    fn engine() -> SfhEngine {
        SfhEngine::new(
            synthetic_basis(),
            LookbackBinning::default(),
            MetallicityBounds::default(),
        )
    }

    fn theta(burst: Option<Burst>) -> Theta {
        let schema = ParameterSchema::new(false);
        let mut theta = schema
            .parse(&[10.0, 0.25, 0.25, 0.25, 0.25, 0.5, 0.5, 0.0, 0.0, 0.0])
            .unwrap();
        theta.burst = burst;
        theta
    }

    #[test]
    fn test_edges_layout() {
        let edges = LookbackBinning::default().edges(13.8).unwrap();
        assert_eq!(edges[0], 0.0);
        assert_relative_eq!(edges[1], 1e-2, max_relative = 1e-12);
        assert_relative_eq!(edges[2], 10f64.powf(-1.95), max_relative = 1e-12);
        assert_eq!(edges[edges.len() - 1], 13.8);
        assert_eq!(edges.len(), 65);
        assert!(edges.windows(2).all(|w| w[1] > w[0]));
    }

    #[test]
    fn test_edges_reject_young_galaxy() {
        assert!(LookbackBinning::default().edges(0.01).is_err());
        assert!(LookbackBinning::default().edges(-1.0).is_err());
    }

    #[test]
    fn test_continuous_history_normalized() {
        let sfh = engine().continuous_history(&theta(None), 10.0).unwrap();
        assert_relative_eq!(sfh.total_mass(), 1.0, max_relative = 1e-10);
        assert!(sfh.sfr.iter().all(|&s| s >= 0.0));
    }

    #[test]
    fn test_history_mass_scaling() {
        let sfh = engine().history(&theta(None), 10.0).unwrap();
        assert_relative_eq!(sfh.total_mass(), 1e10, max_relative = 1e-10);
    }

    #[test]
    fn test_burst_spike_in_single_bin() {
        let edges = LookbackBinning::default().edges(13.8).unwrap();
        let spike = burst_history(2.0, &edges);
        let nonzero: Vec<usize> = (0..spike.len()).filter(|&i| spike[i] > 0.0).collect();
        assert_eq!(nonzero.len(), 1);
        let i = nonzero[0];
        assert!(edges[i] <= 2.0 && 2.0 < edges[i + 1]);
        assert_relative_eq!(spike[i] * (edges[i + 1] - edges[i]), 1.0, max_relative = 1e-12);

        assert!(burst_history(13.8, &edges).iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_burst_conserves_mass() {
        let burst = Burst {
            fburst: 0.3,
            tburst: 1.0,
        };
        let sfh = engine().history(&theta(Some(burst)), 10.0).unwrap();
        assert_relative_eq!(sfh.total_mass(), 1e10, max_relative = 1e-10);
    }

    #[test]
    fn test_burst_at_tage_contributes_nothing() {
        let engine = engine();
        let without = engine.history(&theta(None), 10.0).unwrap();
        let at_edge = engine
            .history(
                &theta(Some(Burst {
                    fburst: 0.5,
                    tburst: 10.0,
                })),
                10.0,
            )
            .unwrap();
        assert_eq!(without, at_edge);
    }

    #[test]
    fn test_metallicity_clipped_to_bounds() {
        let engine = engine();
        let mut t = theta(None);
        t.gamma = [100.0, 100.0];
        let zh = engine.metallicity_history(&t, 10.0).unwrap();
        assert!(zh.metallicity.iter().all(|&z| z == engine.bounds().max));
        assert_eq!(zh.clipped_bins, zh.metallicity.len());
        assert!(zh.warning().is_some());

        t.gamma = [0.5, 0.5];
        let zh = engine.metallicity_history(&t, 10.0).unwrap();
        assert!(zh.metallicity.iter().all(|&z| engine.bounds().contains(z)));
        assert_eq!(zh.clipped_bins, 0);
    }

    #[test]
    fn test_mass_weighted_metallicity_constant_history() {
        // constant Z in bounds gives Z_MW = Z for any SFH
        let engine = engine();
        let t = theta(None);
        let zh = engine.metallicity_history(&t, 10.0).unwrap();
        let z_mw = engine.mass_weighted_metallicity(&t, 10.0).unwrap();
        let (lo, hi) = zh
            .metallicity
            .iter()
            .fold((f64::MAX, f64::MIN), |(lo, hi), &z| (lo.min(z), hi.max(z)));
        assert!(z_mw >= lo * (1.0 - 1e-12) && z_mw <= hi * (1.0 + 1e-12));
    }

    #[test]
    fn test_average_sfr_window_bounds() {
        let engine = engine();
        let t = theta(None);
        let edges = LookbackBinning::default().edges(10.0).unwrap();
        let last = edges[edges.len() - 1];
        assert!(matches!(
            engine.average_sfr(&t, 10.0, last),
            Err(ModelError::PreconditionViolation(_))
        ));
        assert!(engine.average_sfr(&t, 10.0, 0.0).is_err());
        assert!(engine.average_sfr(&t, 10.0, 1.0).is_ok());
    }

    #[test]
    fn test_mass_formed_within_monotonic() {
        let engine = engine();
        let t = theta(None);
        let m1 = engine.mass_formed_within(&t, 10.0, 1.0).unwrap();
        let m5 = engine.mass_formed_within(&t, 10.0, 5.0).unwrap();
        let m_all = engine.mass_formed_within(&t, 10.0, 9.999_999).unwrap();
        assert!(m1 < m5);
        assert_relative_eq!(m_all, 1e10, max_relative = 1e-5);
    }

    #[test]
    fn test_average_sfr_burst_window() {
        let engine = engine();
        let inside = theta(Some(Burst {
            fburst: 0.5,
            tburst: 0.5,
        }));
        let outside = theta(Some(Burst {
            fburst: 0.5,
            tburst: 2.0,
        }));
        let plain = engine.mass_formed_within(&theta(None), 10.0, 1.0).unwrap();

        let m_in = engine.mass_formed_within(&inside, 10.0, 1.0).unwrap();
        assert_relative_eq!(m_in, 0.5 * plain + 0.5 * 1e10, max_relative = 1e-12);

        let m_out = engine.mass_formed_within(&outside, 10.0, 1.0).unwrap();
        assert_relative_eq!(m_out, plain, max_relative = 1e-12);

        let sfr = engine.average_sfr(&inside, 10.0, 1.0).unwrap();
        assert_relative_eq!(sfr, m_in, max_relative = 1e-12);
    }
}
