//! Crystallographic primitives for real- and reciprocal-space map work.
//!
//! - [`cell`]: unit cells, crystal symmetry, placeholder detection.
//! - [`grid`]: periodic density grids, FFT-friendly gridding, interpolation.
//! - [`miller`]: Miller index generation inside a resolution sphere.
//! - [`scattering`]: tabulated atomic form factors.
//! - [`structure_factors`]: model structure factors, FFT maps, map
//!   coefficients and correlation.
//! - [`map`]: the immutable target map consumed by the fitting engine.

pub mod cell;
pub mod error;
pub mod grid;
pub mod map;
pub mod miller;
pub mod scattering;
pub mod structure_factors;
