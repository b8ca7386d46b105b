use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ParameterFileError {
    #[error("Failed to read parameter file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Not TOML at all; such files are skipped during resolution.
    #[error("Failed to parse parameter file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: Box<toml::de::Error>,
    },
    /// Valid TOML that names unknown parameters or carries mistyped values.
    #[error("Invalid parameters in {path}: {source}")]
    Schema {
        path: PathBuf,
        source: Box<toml::de::Error>,
    },
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FileInputConfig {
    pub model_file_name: Option<PathBuf>,
    pub map_file_name: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FileOutputConfig {
    pub output_file_name_prefix: Option<String>,
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FileGuiConfig {
    pub output_dir: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FileMapConfig {
    pub resolution: Option<f64>,
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FileAnnealingConfig {
    pub start_temperature: Option<f64>,
    pub final_temperature: Option<f64>,
    pub cool_rate: Option<f64>,
    pub number_of_steps: Option<usize>,
    pub update_grads_shift: Option<f64>,
    pub interleave_minimization: Option<bool>,
    pub time_step: Option<f64>,
    pub random_seed: Option<u64>,
    pub map_weight: Option<f64>,
    pub restraint_weight: Option<f64>,
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FileDiagnosticsConfig {
    pub post_fit_cc: Option<bool>,
}

/// Every parameter a run can set, each one optional.
///
/// This is both the TOML parameter-file schema and the accumulator that
/// parameter strings are applied to.
#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default)]
    pub input: FileInputConfig,
    #[serde(default)]
    pub output: FileOutputConfig,
    #[serde(default)]
    pub gui: FileGuiConfig,
    #[serde(default)]
    pub map: FileMapConfig,
    #[serde(default)]
    pub annealing: FileAnnealingConfig,
    #[serde(default)]
    pub diagnostics: FileDiagnosticsConfig,
}

macro_rules! overlay {
    ($base:expr, $other:expr, [$($field:ident),* $(,)?]) => {
        $( if $other.$field.is_some() { $base.$field = $other.$field; } )*
    };
}

impl FileConfig {
    pub fn from_file(path: &Path) -> Result<Self, ParameterFileError> {
        debug!("Loading parameter file: {:?}", path);
        let content = std::fs::read_to_string(path).map_err(|source| ParameterFileError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str::<toml::Table>(&content).map_err(|source| ParameterFileError::Parse {
            path: path.to_path_buf(),
            source: Box::new(source),
        })?;
        toml::from_str(&content).map_err(|source| ParameterFileError::Schema {
            path: path.to_path_buf(),
            source: Box::new(source),
        })
    }

    /// Overlays every value set in `other` on top of `self`.
    pub fn merge(&mut self, other: FileConfig) {
        overlay!(self.input, other.input, [model_file_name, map_file_name]);
        overlay!(self.output, other.output, [output_file_name_prefix]);
        overlay!(self.gui, other.gui, [output_dir]);
        overlay!(self.map, other.map, [resolution]);
        overlay!(
            self.annealing,
            other.annealing,
            [
                start_temperature,
                final_temperature,
                cool_rate,
                number_of_steps,
                update_grads_shift,
                interleave_minimization,
                time_step,
                random_seed,
                map_weight,
                restraint_weight,
            ]
        );
        overlay!(self.diagnostics, other.diagnostics, [post_fit_cc]);
    }
}
