use super::assign::apply_assignment;
use super::defaults::DefaultsConfig;
use super::file::{FileConfig, ParameterFileError};
use super::models::FitConfiguration;
use crate::core::io::model::detect_model_format;
use crate::engine::config::{AnnealingSchedule, ConfigError};
use crate::inputs::classify::{Classification, ParameterSource};
use std::path::PathBuf;
use tracing::{debug, info, warn};

#[derive(Default)]
pub struct FitConfigurationBuilder {
    model_file_name: Option<PathBuf>,
    map_file_name: Option<PathBuf>,
    output_file_name_prefix: Option<String>,
    output_dir: Option<PathBuf>,
    resolution: Option<f64>,
    schedule: Option<AnnealingSchedule>,
    post_fit_cc: Option<bool>,
}

impl FitConfigurationBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn model_file_name(mut self, path: PathBuf) -> Self {
        self.model_file_name = Some(path);
        self
    }
    pub fn map_file_name(mut self, path: PathBuf) -> Self {
        self.map_file_name = Some(path);
        self
    }
    pub fn output_file_name_prefix(mut self, prefix: String) -> Self {
        self.output_file_name_prefix = Some(prefix);
        self
    }
    pub fn output_dir(mut self, dir: PathBuf) -> Self {
        self.output_dir = Some(dir);
        self
    }
    pub fn resolution(mut self, angstroms: f64) -> Self {
        self.resolution = Some(angstroms);
        self
    }
    pub fn schedule(mut self, schedule: AnnealingSchedule) -> Self {
        self.schedule = Some(schedule);
        self
    }
    pub fn post_fit_cc(mut self, enabled: bool) -> Self {
        self.post_fit_cc = Some(enabled);
        self
    }

    /// Builds without the required-input checks. Used when the caller has
    /// already validated the parameters.
    pub fn build_unchecked(self) -> Result<FitConfiguration, ConfigError> {
        let defaults = DefaultsConfig::default();
        let resolution = self.resolution.unwrap_or(defaults.resolution);
        if !(resolution.is_finite() && resolution > 0.0) {
            return Err(ConfigError::InvalidValue {
                parameter: "map.resolution",
                reason: format!("must be a positive number of Angstroms, got {}", resolution),
            });
        }
        let schedule = self.schedule.unwrap_or(defaults.schedule);
        schedule.validate()?;
        Ok(FitConfiguration {
            model_file_name: self.model_file_name,
            map_file_name: self.map_file_name,
            output_file_name_prefix: self.output_file_name_prefix,
            output_dir: self.output_dir,
            resolution,
            schedule,
            post_fit_cc: self.post_fit_cc.unwrap_or(defaults.post_fit_cc),
        })
    }

    /// Builds and validates: both input files must be named, and the model
    /// file must parse as an atomic structure.
    ///
    /// The name checks run before anything is read from disk.
    pub fn build(self) -> Result<FitConfiguration, ConfigError> {
        let model = self
            .model_file_name
            .clone()
            .ok_or(ConfigError::MissingParameter("model_file_name"))?;
        if self.map_file_name.is_none() {
            return Err(ConfigError::MissingParameter("map_file_name"));
        }
        let config = self.build_unchecked()?;
        match detect_model_format(&model) {
            Some(format) => debug!(path = %model.display(), ?format, "Model file recognized"),
            None => return Err(ConfigError::UnrecognizedModelFile(model)),
        }
        Ok(config)
    }
}

/// Merges parameter files and assignments, in command-line order, into a
/// single parameter set. Files that cannot be read or are not TOML are
/// skipped with a warning; TOML files that do not fit the parameter schema
/// are rejected.
pub fn merge_parameters(classification: &Classification) -> Result<FileConfig, ConfigError> {
    let mut merged = FileConfig::default();
    for source in &classification.parameters {
        match source {
            ParameterSource::Assignment(assignment) => apply_assignment(&mut merged, assignment)?,
            ParameterSource::File(path) => match FileConfig::from_file(path) {
                Ok(file) => {
                    debug!(path = %path.display(), "Merged parameter file");
                    merged.merge(file);
                }
                Err(ParameterFileError::Schema { path, source }) => {
                    return Err(ConfigError::InvalidParameterFile {
                        path,
                        reason: source.message().to_string(),
                    });
                }
                Err(e) => warn!(error = %e, "Skipping file that is not a parameter file"),
            },
        }
    }
    Ok(merged)
}

/// Resolves classified run arguments into a [`FitConfiguration`].
///
/// With `validate` false the required-input checks are skipped; the schedule
/// and resolution are still checked.
pub fn resolve_configuration(
    classification: &Classification,
    validate: bool,
) -> Result<FitConfiguration, ConfigError> {
    let merged = merge_parameters(classification)?;

    let mut schedule = AnnealingSchedule::builder();
    let a = merged.annealing;
    if let Some(v) = a.start_temperature {
        schedule = schedule.start_temperature(v);
    }
    if let Some(v) = a.final_temperature {
        schedule = schedule.final_temperature(v);
    }
    if let Some(v) = a.cool_rate {
        schedule = schedule.cool_rate(v);
    }
    if let Some(v) = a.number_of_steps {
        schedule = schedule.number_of_steps(v);
    }
    if let Some(v) = a.update_grads_shift {
        schedule = schedule.update_grads_shift(v);
    }
    if let Some(v) = a.interleave_minimization {
        schedule = schedule.interleave_minimization(v);
    }
    if let Some(v) = a.time_step {
        schedule = schedule.time_step(v);
    }
    if let Some(v) = a.random_seed {
        schedule = schedule.random_seed(v);
    }
    if let Some(v) = a.map_weight {
        schedule = schedule.map_weight(v);
    }
    if let Some(v) = a.restraint_weight {
        schedule = schedule.restraint_weight(v);
    }

    let mut builder = FitConfigurationBuilder::new().schedule(schedule.build()?);
    if let Some(path) = merged.input.model_file_name {
        builder = builder.model_file_name(path);
    }
    if let Some(path) = merged.input.map_file_name {
        builder = builder.map_file_name(path);
    }
    if let Some(prefix) = merged.output.output_file_name_prefix {
        builder = builder.output_file_name_prefix(prefix);
    }
    if let Some(dir) = merged.gui.output_dir {
        builder = builder.output_dir(dir);
    }
    if let Some(resolution) = merged.map.resolution {
        builder = builder.resolution(resolution);
    }
    if let Some(enabled) = merged.diagnostics.post_fit_cc {
        builder = builder.post_fit_cc(enabled);
    }

    let config = if validate {
        builder.build()?
    } else {
        builder.build_unchecked()?
    };
    info!(
        model = ?config.model_file_name,
        map = ?config.map_file_name,
        resolution = config.resolution,
        validated = validate,
        "Resolved fit configuration"
    );
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inputs::classify::RunArguments;
    use std::fs;
    use tempfile::tempdir;

    const ONE_ATOM: &str =
        "ATOM      1  CA  ALA A   1      10.000  10.000  10.000  1.00 20.00           C\nEND\n";

    fn classify(tokens: &[&str]) -> Classification {
        RunArguments::new(tokens.iter().copied()).classify()
    }

    #[test]
    fn missing_model_is_rejected_before_io() {
        let err = resolve_configuration(&classify(&["map=target.ccp4"]), true).unwrap_err();
        assert_eq!(err, ConfigError::MissingParameter("model_file_name"));
    }

    #[test]
    fn missing_map_is_rejected_before_io() {
        // The model does not exist; reaching the model format check would report a
        // different error.
        let err = resolve_configuration(&classify(&["nowhere/model.pdb"]), true).unwrap_err();
        assert_eq!(err, ConfigError::MissingParameter("map_file_name"));
    }

    #[test]
    fn unrecognized_model_file_is_rejected() {
        let dir = tempdir().unwrap();
        let model = dir.path().join("model.pdb");
        fs::write(&model, "not a structure\n").unwrap();
        let model_token = model.to_string_lossy().into_owned();

        let err = resolve_configuration(&classify(&[model_token.as_str(), "target.map"]), true)
            .unwrap_err();
        assert_eq!(err, ConfigError::UnrecognizedModelFile(model));
    }

    #[test]
    fn valid_inputs_resolve_with_defaults() {
        let dir = tempdir().unwrap();
        let model = dir.path().join("model.pdb");
        fs::write(&model, ONE_ATOM).unwrap();
        let model_token = model.to_string_lossy().into_owned();

        let config = resolve_configuration(&classify(&[model_token.as_str(), "target.map"]), true).unwrap();

        assert_eq!(config.model_file_name, Some(model));
        assert_eq!(config.map_file_name, Some(PathBuf::from("target.map")));
        assert_eq!(config.resolution, 3.0);
        assert_eq!(config.schedule, AnnealingSchedule::default());
        assert!(config.post_fit_cc);
    }

    #[test]
    fn validation_can_be_skipped() {
        let config = resolve_configuration(&classify(&["number_of_steps=3"]), false).unwrap();
        assert_eq!(config.model_file_name, None);
        assert_eq!(config.schedule.number_of_steps, 3);
    }

    #[test]
    fn later_sources_override_earlier_ones() {
        let dir = tempdir().unwrap();
        let params = dir.path().join("fit.toml");
        fs::write(&params, "[map]\nresolution = 6.0\n[annealing]\ncool_rate = 50.0\n").unwrap();
        let params_token = params.to_string_lossy().into_owned();

        let config = resolve_configuration(
            &classify(&["resolution=2.0", params_token.as_str(), "cool_rate=25"]),
            false,
        )
        .unwrap();
        assert_eq!(config.resolution, 6.0);
        assert_eq!(config.schedule.cool_rate, 25.0);
    }

    #[test]
    fn unparsable_parameter_files_are_skipped() {
        let dir = tempdir().unwrap();
        let junk = dir.path().join("notes.txt");
        fs::write(&junk, "{{ definitely not toml").unwrap();
        let junk_token = junk.to_string_lossy().into_owned();

        let config = resolve_configuration(&classify(&[junk_token.as_str()]), false).unwrap();
        assert_eq!(config.resolution, 3.0);
    }

    #[test]
    fn misspelled_key_in_parameter_file_is_rejected() {
        let dir = tempdir().unwrap();
        let params = dir.path().join("fit.toml");
        fs::write(&params, "[annealing]\nnumber_of_steps = 3\ncool_rat = 50.0\n").unwrap();
        let params_token = params.to_string_lossy().into_owned();

        let err = resolve_configuration(&classify(&[params_token.as_str()]), false).unwrap_err();
        match err {
            ConfigError::InvalidParameterFile { path, reason } => {
                assert_eq!(path, params);
                assert!(reason.contains("cool_rat"), "reason: {reason}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn bare_model_and_map_tokens_resolve_to_input_files() {
        let dir = tempdir().unwrap();
        let model = dir.path().join("user.pdb");
        fs::write(&model, ONE_ATOM).unwrap();
        let model_token = model.to_string_lossy().into_owned();

        let config =
            resolve_configuration(&classify(&[model_token.as_str(), "user.map"]), true).unwrap();
        assert_eq!(config.model_file_name, Some(model));
        assert_eq!(config.map_file_name, Some(PathBuf::from("user.map")));
        assert_eq!(config.schedule.weights.map, 100.0);
    }

    #[test]
    fn invalid_schedule_is_a_configuration_error() {
        let err = resolve_configuration(
            &classify(&["start_temperature=10", "final_temperature=20"]),
            false,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn non_positive_resolution_is_rejected() {
        let err = resolve_configuration(&classify(&["resolution=0"]), false).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                parameter: "map.resolution",
                ..
            }
        ));
    }
}
