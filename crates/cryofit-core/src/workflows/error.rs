use crate::core::io::ccp4::Ccp4Error;
use crate::core::io::model::ModelFileError;
use crate::core::io::pdb::PdbError;
use crate::core::xtal::error::XtalError;
use crate::engine::config::ConfigError;
use crate::engine::error::EngineError;
use std::path::PathBuf;
use thiserror::Error;

/// Failures reading inputs or writing results.
#[derive(Debug, Error)]
pub enum FitIoError {
    #[error("Failed to normalize model file {path}: {source}")]
    Normalize {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Model(#[from] ModelFileError),

    #[error("Failed to read map file {path}: {source}")]
    MapRead { path: PathBuf, source: Ccp4Error },

    #[error("Failed to write map file {path}: {source}")]
    MapWrite { path: PathBuf, source: Ccp4Error },

    #[error("Failed to write model file {path}: {source}")]
    ModelWrite { path: PathBuf, source: PdbError },
}

/// Everything that can stop a fitting run.
///
/// `Config` errors are raised before inputs are read. `Io` errors surface at
/// the point of the failed read or write. `Engine` and `Crystallography`
/// errors are numerical failures, passed through unchanged.
#[derive(Debug, Error)]
pub enum FitError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] FitIoError),

    #[error("Annealing failed: {0}")]
    Engine(#[from] EngineError),

    #[error("Crystallographic computation failed: {0}")]
    Crystallography(#[from] XtalError),
}

impl From<ModelFileError> for FitError {
    fn from(e: ModelFileError) -> Self {
        FitError::Io(FitIoError::Model(e))
    }
}
