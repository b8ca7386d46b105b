use super::diagnostics::model_map_correlation;
use super::error::{FitError, FitIoError};
use super::output::{OutputPaths, write_outputs};
use super::target_map::{MapSource, provide_target_map};
use crate::core::io::model::read_model;
use crate::core::restraints::manager::{RestraintParams, RestraintsManager};
use crate::core::xtal::error::XtalError;
use crate::engine::anneal::{AnnealingInput, FitEnergy, anneal};
use crate::engine::cancel::CancellationToken;
use crate::engine::config::ConfigError;
use crate::engine::error::EngineError;
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::trajectory::Trajectory;
use crate::inputs::classify::RunArguments;
use crate::inputs::normalize::normalize_model_file;
use crate::params::builder::resolve_configuration;
use std::path::PathBuf;
use tracing::{debug, info, instrument};

/// How a run is carried out, as opposed to what it computes.
#[derive(Debug, Clone)]
pub struct FitOptions {
    /// The parameters were validated upstream; skip the required-input checks.
    pub validated: bool,
    /// Directory receiving every fixed-name output.
    pub work_dir: PathBuf,
    pub cancel: CancellationToken,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            validated: false,
            work_dir: PathBuf::from("."),
            cancel: CancellationToken::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FitReport {
    /// The model file actually read, after residue-code normalization.
    pub model_file: PathBuf,
    pub map_source: MapSource,
    pub pre_fit_cc: f64,
    pub post_fit_cc: Option<f64>,
    /// Number of states in the written ensemble, the starting model included.
    pub states: usize,
    pub final_energy: FitEnergy,
    pub outputs: OutputPaths,
}

impl FitReport {
    pub fn synthesized_map(&self) -> Option<&PathBuf> {
        match &self.map_source {
            MapSource::Synthesized(path) => Some(path),
            MapSource::Supplied(_) => None,
        }
    }
}

/// Fits the model named by `args` into its target map.
///
/// Bare model and map tokens in `args` are rewritten in place to `model=` and
/// `map=` assignments. On success `all_states.pdb` and `refined.pdb` are
/// written to `options.work_dir`; on failure neither is written, though a map
/// synthesized earlier in the run is kept.
#[instrument(skip_all, name = "fit_workflow")]
pub fn run(
    args: &mut RunArguments,
    options: &FitOptions,
    reporter: &ProgressReporter,
) -> Result<FitReport, FitError> {
    // === Phase 1: Parameters ===
    let config = reporter.phase("Resolving parameters", || {
        let classification = args.classify();
        debug!(
            model = ?classification.model,
            map = ?classification.map,
            parameters = classification.parameters.len(),
            "Run arguments classified"
        );
        resolve_configuration(&classification, !options.validated)
    })?;
    if config.output_file_name_prefix.is_some() || config.output_dir.is_some() {
        info!(
            prefix = ?config.output_file_name_prefix,
            output_dir = ?config.output_dir,
            "Output prefix and directory are accepted but not applied; outputs use fixed names"
        );
    }
    let model_path = config
        .model_file_name
        .clone()
        .ok_or(ConfigError::MissingParameter("model_file_name"))?;

    // === Phase 2: Inputs ===
    reporter.report(Progress::PhaseStart { name: "Loading inputs" });
    let model_file = normalize_model_file(&model_path).map_err(|source| FitIoError::Normalize {
        path: model_path.clone(),
        source,
    })?;
    let mut system = read_model(&model_file)?;
    if system.is_empty() {
        return Err(XtalError::EmptyModel.into());
    }
    info!(path = %model_file.display(), atoms = system.atom_count(), "Model read");
    let provided = provide_target_map(
        config.map_file_name.as_deref(),
        &system,
        config.resolution,
        &options.work_dir,
    )?;
    reporter.report(Progress::PhaseFinish);

    // === Phase 3: Pre-fit diagnostics ===
    let mut trajectory = Trajectory::new(system.sites_cart());
    let pre_fit_cc = reporter.phase("Pre-fit correlation", || {
        model_map_correlation(&system, &provided.map, config.resolution)
    })?;
    info!(cc = pre_fit_cc, "Pre-fit model-map correlation");

    // === Phase 4: Simulated annealing ===
    reporter.report(Progress::PhaseStart {
        name: "Simulated annealing",
    });
    let restraints = RestraintsManager::from_system(&system, RestraintParams::default());
    let masses = system.masses();
    let outcome = anneal(
        AnnealingInput {
            sites: system.sites_cart(),
            masses: &masses,
            restraints: &restraints,
            map: &provided.map,
            real_space: true,
        },
        &config.schedule,
        &mut trajectory,
        &options.cancel,
        reporter,
    );
    reporter.report(Progress::PhaseFinish);
    let outcome = outcome?;

    let expected = system.atom_count();
    let found = outcome.sites.len();
    system
        .set_sites_cart(outcome.sites)
        .map_err(|_| EngineError::SiteCountMismatch {
            what: "refined coordinates",
            expected,
            found,
        })?;

    // === Phase 5: Post-fit diagnostics ===
    let post_fit_cc = if config.post_fit_cc {
        let cc = reporter.phase("Post-fit correlation", || {
            model_map_correlation(&system, &provided.map, config.resolution)
        })?;
        info!(cc, "Post-fit model-map correlation");
        Some(cc)
    } else {
        None
    };

    // === Phase 6: Outputs ===
    let outputs = reporter.phase("Writing outputs", || {
        write_outputs(&system, &trajectory, &options.work_dir)
    })?;

    info!(states = trajectory.state_count(), "Fit complete");
    Ok(FitReport {
        model_file,
        map_source: provided.source,
        pre_fit_cc,
        post_fit_cc,
        states: trajectory.state_count(),
        final_energy: outcome.energy,
        outputs,
    })
}
