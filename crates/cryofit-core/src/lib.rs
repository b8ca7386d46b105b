//! # cryofit Core Library
//!
//! Fits atomic models into cryo-EM density maps by simulated-annealing
//! real-space refinement, recording the trajectory of intermediate models.
//!
//! ## Architectural Philosophy
//!
//! The library is layered so that each layer only depends on the ones below it.
//!
//! - **[`core`]: The Foundation.** Stateless data models (`MolecularSystem`),
//!   file formats (PDB, mmCIF, CCP4), crystallographic maths (unit cells,
//!   structure factors, FFT maps, correlation) and geometry restraints.
//!
//! - **[`engine`]: The Logic Core.** The annealing protocol and the molecular
//!   dynamics that drive a model into density, with progress reporting and
//!   cooperative cancellation.
//!
//! - **[`inputs`] and [`params`]: The Boundary.** Classification of raw run
//!   tokens, residue-code normalization, and resolution of parameter strings
//!   and files into an immutable configuration.
//!
//! - **[`workflows`]: The Public API.** The end-to-end fitting pipeline, from
//!   tokens to the ensemble and refined model on disk.

pub mod core;
pub mod engine;
pub mod inputs;
pub mod params;
pub mod workflows;
