use crate::engine::config::AnnealingSchedule;
use std::path::PathBuf;

/// The immutable, fully populated parameters of one fitting run.
#[derive(Debug, Clone, PartialEq)]
pub struct FitConfiguration {
    /// Required unless the caller vouches for the parameters.
    pub model_file_name: Option<PathBuf>,
    /// When absent on a prevalidated run, a map is synthesized from the model.
    pub map_file_name: Option<PathBuf>,
    pub output_file_name_prefix: Option<String>,
    pub output_dir: Option<PathBuf>,
    /// Resolution in Angstroms for map synthesis and correlation.
    pub resolution: f64,
    pub schedule: AnnealingSchedule,
    pub post_fit_cc: bool,
}
