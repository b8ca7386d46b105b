//! Domain building blocks shared by every layer of the fitting pipeline.
//!
//! - [`models`]: the atomic model and its element data.
//! - [`io`]: PDB, mmCIF and CCP4/MRC readers and writers.
//! - [`xtal`]: unit cells, density grids, structure factors and map
//!   correlation.
//! - [`restraints`]: geometry restraints evaluated during annealing.

pub mod io;
pub mod models;
pub mod restraints;
pub mod xtal;
