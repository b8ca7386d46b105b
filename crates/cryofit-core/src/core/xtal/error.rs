use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum XtalError {
    #[error("Invalid unit cell: {0}")]
    InvalidCell(String),

    #[error("Model contains no atoms")]
    EmptyModel,

    #[error("Invalid density grid: {0}")]
    InvalidGrid(String),

    #[error("Resolution must be positive and finite, got {0}")]
    InvalidResolution(f64),

    #[error("No reflections within the resolution limit of {d_min} A")]
    NoReflections { d_min: f64 },
}
