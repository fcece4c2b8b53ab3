//! sed-math - Numerical kernels for spectral energy distribution modeling
//!
//! This crate provides the domain-free numerical building blocks used by
//! the `galsed` forward model:
//!
//! - **Spline** - Not-a-knot cubic spline that extrapolates its end segments
//! - **Interpolation** - Linear interpolation with and without extrapolation
//! - **Rebinning** - Edge-aware trapezoidal rebinning and bin digitization
//! - **Smoothing** - 1D Gaussian filtering with reflect boundaries
//! - **Quadrature** - Simpson and trapezoidal integration, grid helpers
//!
//! # Example
//!
//! ```
//! use sed_math::{centers_to_edges, trapz_rebin};
//!
//! let x = vec![0.0, 1.0, 2.0, 3.0, 4.0];
//! let y = vec![1.0, 1.0, 1.0, 1.0, 1.0];
//! let edges = vec![0.5, 1.5, 3.5];
//! let rebinned = trapz_rebin(&x, &y, &edges).unwrap();
//! assert!((rebinned[0] - 1.0).abs() < 1e-12);
//! assert_eq!(centers_to_edges(&[1.0, 2.0, 3.0]).len(), 4);
//! ```

pub mod interp;
pub mod quadrature;
pub mod rebin;
pub mod smoothing;
pub mod spline;

pub use interp::{interp, InterpError, LinearInterpolant};
pub use quadrature::{arange, linspace, simpson, trapezoid};
pub use rebin::{centers_to_edges, digitize, trapz_rebin, RebinError};
pub use smoothing::{gaussian_filter1d, gaussian_kernel1d};
pub use spline::CubicSpline;
