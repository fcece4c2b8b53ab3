//! Synthetic broadband photometry in AB maggies.
//!
//! A [`Bandpass`] turns an observed-frame spectrum (erg s⁻¹ cm⁻² Å⁻¹) into
//! one AB maggie per filter:
//!
//! ```text
//! maggies = ∫ f_λ R(λ) λ dλ / ∫ f_λ,AB R(λ) λ dλ,   f_λ,AB = 3631 Jy · c / λ²
//! ```
//!
//! Spectra that do not span every filter must be padded first; evaluating
//! an uncovered filter is an error rather than a silent truncation.

use std::path::Path;

use sed_math::interp;

use super::filter_response::{FilterError, FilterResponse};
use super::spectrum::{Band, CGS};

/// A set of filters that can produce broadband photometry from a spectrum.
pub trait Bandpass {
    /// Filter names in output order
    fn names(&self) -> Vec<&str>;

    /// Extend `(flux, wavelength)` with zero flux so that every filter is
    /// covered. Returns the (possibly unchanged) pair.
    fn pad_spectrum(
        &self,
        flux: &[f64],
        wavelength: &[f64],
    ) -> Result<(Vec<f64>, Vec<f64>), FilterError>;

    /// AB maggies of the spectrum through each filter.
    fn ab_maggies(&self, flux: &[f64], wavelength: &[f64]) -> Result<Vec<f64>, FilterError>;
}

/// Ordered collection of filter curves.
#[derive(Debug, Clone, Default)]
pub struct FilterSet {
    filters: Vec<FilterResponse>,
}

impl FilterSet {
    pub fn new(filters: Vec<FilterResponse>) -> Self {
        Self { filters }
    }

    /// Load every curve in `paths` (see [`FilterResponse::from_file`]).
    pub fn load<P: AsRef<Path>>(paths: &[P]) -> Result<Self, FilterError> {
        let filters = paths
            .iter()
            .map(|p| FilterResponse::from_file(p.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { filters })
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn filters(&self) -> &[FilterResponse] {
        &self.filters
    }

    /// Union of the filter supports, if any filters are present
    pub fn support(&self) -> Option<Band> {
        self.filters.iter().map(FilterResponse::band).reduce(|a, b| Band {
            lower_aa: a.lower_aa.min(b.lower_aa),
            upper_aa: a.upper_aa.max(b.upper_aa),
        })
    }
}

fn check_shape(flux: &[f64], wavelength: &[f64]) -> Result<(), FilterError> {
    if flux.len() != wavelength.len() || wavelength.len() < 2 {
        return Err(FilterError::SpectrumShape {
            flux: flux.len(),
            wave: wavelength.len(),
        });
    }
    Ok(())
}

/// Integrate `g(λ) R(λ) λ` over the filter support on the merged grid of
/// filter knots and spectrum samples.
fn integrate_through<G>(filter: &FilterResponse, wavelength: &[f64], g: G) -> f64
where
    G: Fn(f64) -> f64,
{
    let band = filter.band();
    let mut grid: Vec<f64> = filter
        .wavelengths()
        .iter()
        .chain(
            wavelength
                .iter()
                .filter(|&&w| w > band.lower_aa && w < band.upper_aa),
        )
        .copied()
        .collect();
    grid.sort_by(f64::total_cmp);
    grid.dedup();

    grid.windows(2)
        .map(|w| {
            let ya = g(w[0]) * filter.at(w[0]) * w[0];
            let yb = g(w[1]) * filter.at(w[1]) * w[1];
            0.5 * (ya + yb) * (w[1] - w[0])
        })
        .sum()
}

impl Bandpass for FilterSet {
    fn names(&self) -> Vec<&str> {
        self.filters.iter().map(FilterResponse::name).collect()
    }

    fn pad_spectrum(
        &self,
        flux: &[f64],
        wavelength: &[f64],
    ) -> Result<(Vec<f64>, Vec<f64>), FilterError> {
        check_shape(flux, wavelength)?;
        let mut flux = flux.to_vec();
        let mut wave = wavelength.to_vec();

        let Some(support) = self.support() else {
            return Ok((flux, wave));
        };

        if support.lower_aa < wave[0] {
            wave.insert(0, support.lower_aa);
            flux.insert(0, 0.0);
        }
        if support.upper_aa > wave[wave.len() - 1] {
            wave.push(support.upper_aa);
            flux.push(0.0);
        }
        Ok((flux, wave))
    }

    fn ab_maggies(&self, flux: &[f64], wavelength: &[f64]) -> Result<Vec<f64>, FilterError> {
        check_shape(flux, wavelength)?;
        let (min, max) = (wavelength[0], wavelength[wavelength.len() - 1]);

        self.filters
            .iter()
            .map(|filter| {
                let band = filter.band();
                if band.lower_aa < min || band.upper_aa > max {
                    return Err(FilterError::NotCovered {
                        name: filter.name().to_string(),
                        lower: band.lower_aa,
                        upper: band.upper_aa,
                        min,
                        max,
                    });
                }

                let source = integrate_through(filter, wavelength, |w| {
                    interp(w, wavelength, flux).unwrap_or(0.0)
                });
                let reference = integrate_through(filter, wavelength, |w| {
                    CGS::AB_ZERO_POINT_FLUX_DENSITY * CGS::SPEED_OF_LIGHT_AA / (w * w)
                });
                Ok(if reference > 0.0 { source / reference } else { 0.0 })
            })
            .collect()
    }
}
