//! Banded spectral resolution matrices.
//!
//! A [`ResolutionMatrix`] stores an `nwave x nwave` convolution matrix in
//! diagonal form: `data[k, j]` is the element on diagonal
//! `offset_k = ndiag/2 - k` in column `j`, so row `i` of the product reads
//! `Σ_k data[k, i + offset_k] · flux[i + offset_k]`.

use ndarray::{s, Array1, Array2, ArrayView1};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ResolutionError {
    #[error("resolution matrix needs an odd, non-zero number of diagonals (got {0})")]
    InvalidDiagonals(usize),

    #[error("resolution block {block} covers {dim} pixels but only {remaining} remain in the spectrum")]
    BlockOverrun {
        block: usize,
        dim: usize,
        remaining: usize,
    },

    #[error("resolution blocks cover {covered} pixels but the spectrum has {nwave}")]
    BlockMismatch { covered: usize, nwave: usize },
}

/// Square resolution matrix in banded storage.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolutionMatrix {
    data: Array2<f64>,
}

impl ResolutionMatrix {
    /// Wrap a `[ndiag, nwave]` diagonal array.
    pub fn from_diagonals(data: Array2<f64>) -> Result<Self, ResolutionError> {
        let ndiag = data.nrows();
        if ndiag % 2 == 0 {
            return Err(ResolutionError::InvalidDiagonals(ndiag));
        }
        Ok(Self { data })
    }

    /// Unit matrix of size `nwave` with `ndiag` stored diagonals.
    pub fn identity(nwave: usize, ndiag: usize) -> Result<Self, ResolutionError> {
        let mut data = Array2::zeros((ndiag, nwave));
        if ndiag % 2 == 1 {
            data.row_mut(ndiag / 2).fill(1.0);
        }
        Self::from_diagonals(data)
    }

    /// Number of wavelength pixels the block covers
    pub fn dim(&self) -> usize {
        self.data.ncols()
    }

    pub fn ndiag(&self) -> usize {
        self.data.nrows()
    }

    fn offset(&self, k: usize) -> isize {
        (self.ndiag() / 2) as isize - k as isize
    }

    /// Matrix-vector product. `flux` must have [`Self::dim`] elements.
    pub fn dot(&self, flux: ArrayView1<f64>) -> Array1<f64> {
        let n = self.dim() as isize;
        debug_assert_eq!(flux.len(), self.dim());

        Array1::from_shape_fn(self.dim(), |i| {
            (0..self.ndiag())
                .filter_map(|k| {
                    let j = i as isize + self.offset(k);
                    (0..n).contains(&j).then(|| {
                        let j = j as usize;
                        self.data[[k, j]] * flux[j]
                    })
                })
                .sum()
        })
    }
}

/// Apply consecutive resolution blocks to consecutive segments of `flux`.
///
/// The blocks must tile the spectrum exactly.
pub fn apply_blocks(
    blocks: &[ResolutionMatrix],
    flux: ArrayView1<f64>,
) -> Result<Array1<f64>, ResolutionError> {
    let mut out = Array1::zeros(flux.len());
    let mut start = 0;
    for (block, r) in blocks.iter().enumerate() {
        let remaining = flux.len() - start;
        if r.dim() > remaining {
            return Err(ResolutionError::BlockOverrun {
                block,
                dim: r.dim(),
                remaining,
            });
        }
        let end = start + r.dim();
        out.slice_mut(s![start..end])
            .assign(&r.dot(flux.slice(s![start..end])));
        start = end;
    }
    if start != flux.len() {
        return Err(ResolutionError::BlockMismatch {
            covered: start,
            nwave: flux.len(),
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_identity_is_noop() {
        let r = ResolutionMatrix::identity(5, 3).unwrap();
        let flux = array![1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(r.dot(flux.view()), flux);
    }

    #[test]
    fn test_even_diagonals_rejected() {
        assert_eq!(
            ResolutionMatrix::from_diagonals(Array2::zeros((4, 5))),
            Err(ResolutionError::InvalidDiagonals(4))
        );
        assert!(ResolutionMatrix::from_diagonals(Array2::zeros((0, 5))).is_err());
    }

    #[test]
    fn test_banded_product() {
        // tridiagonal [0.25, 0.5, 0.25] smoothing
        let mut data = Array2::zeros((3, 4));
        data.row_mut(0).fill(0.25);
        data.row_mut(1).fill(0.5);
        data.row_mut(2).fill(0.25);
        let r = ResolutionMatrix::from_diagonals(data).unwrap();

        let out = r.dot(array![0.0, 4.0, 0.0, 0.0].view());
        assert_relative_eq!(out[0], 1.0);
        assert_relative_eq!(out[1], 2.0);
        assert_relative_eq!(out[2], 1.0);
        assert_relative_eq!(out[3], 0.0);
    }

    #[test]
    fn test_upper_diagonal_reads_forward() {
        // only offset +1 populated: out[i] = flux[i + 1]
        let mut data = Array2::zeros((3, 4));
        data.row_mut(0).fill(1.0);
        let r = ResolutionMatrix::from_diagonals(data).unwrap();
        assert_eq!(
            r.dot(array![1.0, 2.0, 3.0, 4.0].view()),
            array![2.0, 3.0, 4.0, 0.0]
        );
    }

    #[test]
    fn test_blocks_tile_spectrum() {
        let blocks = vec![
            ResolutionMatrix::identity(2, 1).unwrap(),
            ResolutionMatrix::identity(3, 3).unwrap(),
        ];
        let flux = array![1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(apply_blocks(&blocks, flux.view()).unwrap(), flux);

        assert!(matches!(
            apply_blocks(&blocks[..1], flux.view()),
            Err(ResolutionError::BlockMismatch { covered: 2, nwave: 5 })
        ));
        assert!(matches!(
            apply_blocks(&blocks, flux.slice(s![..4])),
            Err(ResolutionError::BlockOverrun { block: 1, .. })
        ));
    }
}
