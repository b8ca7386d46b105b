use cryofit::core::io::model::ModelFileError;
use cryofit::workflows::error::{FitError, FitIoError};
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Fit(FitError),

    #[error("Failed to parse file '{path}': {source}", path = path.display())]
    FileParsing {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid argument: {0}")]
    Argument(String),
}

impl From<FitError> for CliError {
    fn from(e: FitError) -> Self {
        match e {
            FitError::Io(FitIoError::Model(ModelFileError::Pdb { path, source })) => {
                CliError::FileParsing {
                    path,
                    source: source.into(),
                }
            }
            FitError::Io(FitIoError::Model(ModelFileError::Cif { path, source })) => {
                CliError::FileParsing {
                    path,
                    source: source.into(),
                }
            }
            FitError::Io(FitIoError::MapRead { path, source }) => CliError::FileParsing {
                path,
                source: source.into(),
            },
            other => CliError::Fit(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cryofit::engine::error::EngineError;
    use cryofit::params::ConfigError;

    #[test]
    fn configuration_errors_pass_through() {
        let err: CliError = FitError::Config(ConfigError::MissingParameter("map_file_name")).into();
        assert!(matches!(err, CliError::Fit(FitError::Config(_))));
        assert!(err.to_string().contains("map_file_name"));
    }

    #[test]
    fn engine_errors_pass_through() {
        let err: CliError =
            FitError::Engine(EngineError::Cancelled { completed_cycles: 2 }).into();
        assert!(matches!(err, CliError::Fit(FitError::Engine(_))));
    }
}
