//! Provides input/output functionality for atomic model and density map files.
//!
//! Model formats (PDB and mmCIF) share the [`traits::MolecularFile`]
//! interface; [`model`] picks a format from the file name or its contents.
//! CCP4/MRC maps are handled by [`ccp4`]. Every writer here goes through
//! [`atomic::write_atomically`], so an interrupted write never leaves a
//! truncated file behind.

pub mod atomic;
pub mod ccp4;
pub mod mmcif;
pub mod model;
pub mod pdb;
pub mod traits;
