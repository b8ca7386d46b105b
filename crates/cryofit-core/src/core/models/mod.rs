//! Data structures describing an atomic model.
//!
//! A [`system::MolecularSystem`] owns chains, residues and atoms in slot-map
//! arenas and keeps an explicit atom order. That order defines the layout of
//! every coordinate vector handed to the crystallographic and annealing code,
//! so `sites_cart()[i]` always refers to the `i`-th atom of the file it was
//! read from.

pub mod atom;
pub mod chain;
pub mod element;
pub mod ids;
pub mod residue;
pub mod system;
