//! # Workflows Module
//!
//! The fitting pipeline and the stages it is assembled from.
//!
//! ## Overview
//!
//! A run takes raw command-line tokens, resolves them into a configuration,
//! loads or synthesizes the target map, measures how well the model agrees
//! with it, anneals the model into the map while recording a trajectory, and
//! writes the ensemble and the refined model.
//!
//! ## Architecture
//!
//! - **Fit Workflow** ([`fit`]) - The end-to-end pipeline and its options and report
//! - **Target Map** ([`target_map`]) - Reading a supplied map or synthesizing one
//! - **Diagnostics** ([`diagnostics`]) - Model-map correlation coefficient
//! - **Output** ([`output`]) - Ensemble and refined model files
//! - **Errors** ([`error`]) - Configuration, I/O and numerical failure families

pub mod diagnostics;
pub mod error;
pub mod fit;
pub mod output;
pub mod target_map;
