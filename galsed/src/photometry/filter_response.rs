//! Wavelength-dependent transmission curves for photometric filters.
//!
//! Curves are piecewise linear in wavelength (Ångström), zero outside
//! their tabulated range, and must start and end at zero transmission so
//! that integrals over the curve do not depend on where the spectrum stops.

use std::fs;
use std::path::Path;

use thiserror::Error;

use super::Band;

/// Errors that can occur building or applying filter curves
#[derive(Debug, Error)]
pub enum FilterError {
    #[error("Wavelength and response vectors must have the same length (and at least two points)")]
    LengthMismatch,

    #[error("Wavelengths must be in ascending order")]
    NotAscending,

    #[error("First and last response values must be 0.0")]
    BoundaryNotZero,

    #[error("Response values must be between 0.0 and 1.0")]
    OutOfRange,

    #[error("Filter {name} spans {lower:.1}-{upper:.1} Å but the spectrum covers {min:.1}-{max:.1} Å")]
    NotCovered {
        name: String,
        lower: f64,
        upper: f64,
        min: f64,
        max: f64,
    },

    #[error("Spectrum has {flux} flux values but {wave} wavelengths")]
    SpectrumShape { flux: usize, wave: usize },

    #[error("Failed to read filter curve {path}: {reason}")]
    Read { path: String, reason: String },
}

/// Transmission curve of a single photometric filter.
#[derive(Debug, Clone)]
pub struct FilterResponse {
    name: String,

    /// Wavelengths in Ångström
    wavelengths: Vec<f64>,

    /// Transmission values (0.0 to 1.0)
    responses: Vec<f64>,
}

impl FilterResponse {
    /// Create a filter curve from wavelength and response tables.
    ///
    /// # Errors
    /// - The vectors have different lengths or fewer than two points
    /// - Wavelengths are not in ascending order
    /// - First or last response value is not 0.0
    /// - Any response value is outside [0.0, 1.0]
    pub fn from_table(
        name: impl Into<String>,
        wavelengths: Vec<f64>,
        responses: Vec<f64>,
    ) -> Result<Self, FilterError> {
        if wavelengths.len() != responses.len() || wavelengths.len() < 2 {
            return Err(FilterError::LengthMismatch);
        }

        if wavelengths.windows(2).any(|w| w[1] <= w[0]) {
            return Err(FilterError::NotAscending);
        }

        if responses[0] != 0.0 || responses[responses.len() - 1] != 0.0 {
            return Err(FilterError::BoundaryNotZero);
        }

        if responses.iter().any(|r| !(0.0..=1.0).contains(r)) {
            return Err(FilterError::OutOfRange);
        }

        Ok(Self {
            name: name.into(),
            wavelengths,
            responses,
        })
    }

    /// Rectangular passband with sharp cutoffs at the band edges.
    pub fn from_notch(
        name: impl Into<String>,
        band: &Band,
        response: f64,
    ) -> Result<Self, FilterError> {
        if !(0.0..=1.0).contains(&response) {
            return Err(FilterError::OutOfRange);
        }

        // Small compared to any real filter edge
        let smol = 1e-6;
        let wavelengths = vec![
            band.lower_aa - smol,
            band.lower_aa,
            band.upper_aa,
            band.upper_aa + smol,
        ];
        Self::from_table(name, wavelengths, vec![0.0, response, response, 0.0])
    }

    /// Load a two-column (wavelength Å, response) text curve.
    ///
    /// Blank lines and `#` comments are skipped. The filter is named after
    /// the file stem.
    pub fn from_file(path: &Path) -> Result<Self, FilterError> {
        let read_err = |reason: String| FilterError::Read {
            path: path.display().to_string(),
            reason,
        };
        let text = fs::read_to_string(path).map_err(|e| read_err(e.to_string()))?;

        let mut wavelengths = Vec::new();
        let mut responses = Vec::new();
        for (lineno, line) in text.lines().enumerate() {
            let line = line.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            let cols: Vec<f64> = line
                .split(|c: char| c.is_whitespace() || c == ',')
                .filter(|s| !s.is_empty())
                .map(str::parse)
                .collect::<Result<_, _>>()
                .map_err(|e| read_err(format!("line {}: {e}", lineno + 1)))?;
            if cols.len() < 2 {
                return Err(read_err(format!("line {}: expected two columns", lineno + 1)));
            }
            wavelengths.push(cols[0]);
            responses.push(cols[1]);
        }

        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self::from_table(name, wavelengths, responses)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Transmission at `wavelength` (Å), zero outside the curve.
    pub fn at(&self, wavelength: f64) -> f64 {
        let n = self.wavelengths.len();
        if wavelength < self.wavelengths[0] || wavelength > self.wavelengths[n - 1] {
            return 0.0;
        }

        let idx = self
            .wavelengths
            .partition_point(|&w| w <= wavelength)
            .clamp(1, n - 1);
        let (x0, x1) = (self.wavelengths[idx - 1], self.wavelengths[idx]);
        let t = (wavelength - x0) / (x1 - x0);
        self.responses[idx - 1] * (1.0 - t) + self.responses[idx] * t
    }

    /// Wavelength support of the curve.
    pub fn band(&self) -> Band {
        Band {
            lower_aa: self.wavelengths[0],
            upper_aa: self.wavelengths[self.wavelengths.len() - 1],
        }
    }

    /// Tabulated wavelengths in Ångström
    pub fn wavelengths(&self) -> &[f64] {
        &self.wavelengths
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::io::Write;

    #[test]
    fn test_from_table_validation() {
        assert!(matches!(
            FilterResponse::from_table("f", vec![1.0, 2.0], vec![0.0]),
            Err(FilterError::LengthMismatch)
        ));
        assert!(matches!(
            FilterResponse::from_table("f", vec![2.0, 1.0], vec![0.0, 0.0]),
            Err(FilterError::NotAscending)
        ));
        assert!(matches!(
            FilterResponse::from_table("f", vec![1.0, 2.0, 3.0], vec![0.5, 0.5, 0.0]),
            Err(FilterError::BoundaryNotZero)
        ));
        assert!(matches!(
            FilterResponse::from_table("f", vec![1.0, 2.0, 3.0], vec![0.0, 1.5, 0.0]),
            Err(FilterError::OutOfRange)
        ));
    }

    #[test]
    fn test_at_interpolates_and_zero_outside() {
        let f = FilterResponse::from_table(
            "r",
            vec![5000.0, 5500.0, 6000.0, 7000.0],
            vec![0.0, 0.8, 0.9, 0.0],
        )
        .unwrap();

        assert_relative_eq!(f.at(5500.0), 0.8);
        assert_relative_eq!(f.at(5750.0), 0.85, epsilon = 1e-12);
        assert_eq!(f.at(4000.0), 0.0);
        assert_eq!(f.at(8000.0), 0.0);
        assert_eq!(f.band(), Band::from_aa_bounds(5000.0, 7000.0));
    }

    #[test]
    fn test_notch() {
        let band = Band::from_aa_bounds(6500.0, 6600.0);
        let f = FilterResponse::from_notch("ha", &band, 0.85).unwrap();
        assert_relative_eq!(f.at(6550.0), 0.85);
        assert_eq!(f.at(6400.0), 0.0);
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("decam_g.txt");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "# wavelength response").unwrap();
        writeln!(file, "4000 0.0\n4500 0.7\n5000 0.7\n5500 0.0").unwrap();

        let f = FilterResponse::from_file(&path).unwrap();
        assert_eq!(f.name(), "decam_g");
        assert_relative_eq!(f.at(4750.0), 0.7);
    }
}
