//! Stereochemical restraints used alongside the map term during fitting.
//!
//! The [`manager::GeometryRestraints`] trait is the seam the annealing
//! engine evaluates through. [`manager::RestraintsManager`] implements it
//! with reference restraints derived from the starting model: harmonic bonds
//! and angles around the input geometry plus a repulsive term for atoms that
//! are not bonded neighbours, whose pair list comes from [`neighbors`].

pub mod manager;
pub mod neighbors;
pub(crate) mod potentials;
pub mod term;
