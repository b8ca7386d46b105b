use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum EngineError {
    #[error("Annealing cancelled after {completed_cycles} completed temperature cycle(s)")]
    Cancelled { completed_cycles: usize },

    #[error("Numerical instability at T = {temperature} K (cycle {cycle}, step {step}): {quantity} is not finite")]
    NumericalInstability {
        cycle: usize,
        step: usize,
        temperature: f64,
        quantity: &'static str,
    },

    #[error("Unsupported refinement mode: {0}")]
    Unsupported(String),

    #[error("Site count mismatch: {what} has {found} entries, expected {expected}")]
    SiteCountMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("Invalid annealing schedule: {0}")]
    InvalidSchedule(String),
}
