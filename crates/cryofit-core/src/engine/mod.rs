//! # Engine Module
//!
//! Simulated-annealing refinement of atomic coordinates against a density map.
//!
//! ## Overview
//!
//! The engine drives molecular dynamics on a combined target: the geometry
//! restraints keep the model chemically sensible while the density term pulls
//! atoms into the map. The bath temperature is lowered step by step along a
//! ladder, and the coordinates reached at every temperature are handed to a
//! caller-supplied sink.
//!
//! ## Architecture
//!
//! - **Configuration** ([`config`]) - The annealing protocol, its weights and validation
//! - **Annealing** ([`anneal`]) - The temperature ladder and the run loop
//! - **Dynamics** ([`dynamics`]) - Velocity assignment, thermostat and integrator
//! - **Trajectory** ([`trajectory`]) - Snapshot accumulation through a sink trait
//! - **Cancellation** ([`cancel`]) - Cooperative cancellation and deadlines
//! - **Progress Monitoring** ([`progress`]) - Progress reporting and user feedback mechanisms
//! - **Error Handling** ([`error`]) - Engine-specific error types

pub mod anneal;
pub mod cancel;
pub mod config;
pub(crate) mod dynamics;
pub mod error;
pub(crate) mod map_target;
pub(crate) mod minimize;
pub mod progress;
pub mod trajectory;
