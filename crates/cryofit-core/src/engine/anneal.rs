use super::cancel::CancellationToken;
use super::config::{AnnealingSchedule, FitWeights};
use super::dynamics::{
    DynamicsState, VelocityVerlet, maxwell_boltzmann_velocities, rescale_velocities,
    remove_center_of_mass_motion,
};
use super::error::EngineError;
use super::map_target::MapTerm;
use super::minimize::steepest_descent;
use super::progress::{Progress, ProgressReporter};
use super::trajectory::StateSink;
use crate::core::restraints::manager::GeometryRestraints;
use crate::core::restraints::term::RestraintEnergy;
use crate::core::xtal::map::TargetMap;
use nalgebra::{Point3, Vector3};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{debug, info, instrument};

const MINIMIZATION_ITERATIONS: usize = 100;

/// Everything the engine needs besides the protocol.
pub struct AnnealingInput<'a> {
    /// Starting coordinates, taken by value.
    pub sites: Vec<Point3<f64>>,
    pub masses: &'a [f64],
    pub restraints: &'a dyn GeometryRestraints,
    pub map: &'a TargetMap,
    /// Only real-space refinement is implemented.
    pub real_space: bool,
}

/// Components of the fitting target at one set of coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FitEnergy {
    pub restraints: RestraintEnergy,
    /// `-sum(rho)` before weighting.
    pub map: f64,
    /// `wc * restraints + wx * map`.
    pub total: f64,
}

#[derive(Debug, Clone)]
pub struct AnnealingOutcome {
    pub sites: Vec<Point3<f64>>,
    pub cycles: usize,
    pub energy: FitEnergy,
}

struct FitTarget<'a> {
    restraints: &'a dyn GeometryRestraints,
    map: MapTerm<'a>,
    weights: FitWeights,
}

impl FitTarget<'_> {
    fn evaluate(&mut self, sites: &[Point3<f64>]) -> (FitEnergy, Vec<Vector3<f64>>) {
        let geometry = self.restraints.evaluate(sites);
        let (map_energy, map_gradients) = self.map.evaluate(sites);
        let FitWeights { map: wx, restraints: wc } = self.weights;

        let gradients = geometry
            .gradients
            .iter()
            .zip(&map_gradients)
            .map(|(g, m)| g * wc + m * wx)
            .collect();
        let energy = FitEnergy {
            restraints: geometry.energy,
            map: map_energy,
            total: wc * geometry.energy.total() + wx * map_energy,
        };
        (energy, gradients)
    }

    fn evaluate_total(&mut self, sites: &[Point3<f64>]) -> (f64, Vec<Vector3<f64>>) {
        let (energy, gradients) = self.evaluate(sites);
        (energy.total, gradients)
    }
}

fn all_finite(sites: &[Point3<f64>]) -> bool {
    sites.iter().all(|x| x.coords.iter().all(|c| c.is_finite()))
}

/// Runs simulated annealing of `input.sites` against the map and restraints.
///
/// For every temperature of the schedule's ladder, velocities are drawn from
/// the Maxwell–Boltzmann distribution, `number_of_steps` velocity-Verlet steps
/// are taken with the velocities rescaled to the bath temperature after each
/// step, and the coordinates are handed to `sink`. The RNG is seeded from the
/// schedule, so identical inputs give identical trajectories.
///
/// # Errors
///
/// * [`EngineError::Unsupported`] when `real_space` is false.
/// * [`EngineError::SiteCountMismatch`] when masses or restraints disagree
///   with the number of sites.
/// * [`EngineError::Cancelled`] once `cancel` fires; the sink keeps whatever
///   it has received.
/// * [`EngineError::NumericalInstability`] when an energy or coordinate
///   stops being finite.
#[instrument(skip_all, name = "simulated_annealing")]
pub fn anneal(
    input: AnnealingInput<'_>,
    schedule: &AnnealingSchedule,
    sink: &mut dyn StateSink,
    cancel: &CancellationToken,
    reporter: &ProgressReporter,
) -> Result<AnnealingOutcome, EngineError> {
    if !input.real_space {
        return Err(EngineError::Unsupported(
            "reciprocal-space annealing is not available".to_string(),
        ));
    }
    schedule
        .validate()
        .map_err(|e| EngineError::InvalidSchedule(e.to_string()))?;

    let n = input.sites.len();
    if input.masses.len() != n {
        return Err(EngineError::SiteCountMismatch {
            what: "masses",
            expected: n,
            found: input.masses.len(),
        });
    }
    if input.restraints.site_count() != n {
        return Err(EngineError::SiteCountMismatch {
            what: "restraints",
            expected: n,
            found: input.restraints.site_count(),
        });
    }

    let temperatures = schedule.temperatures();
    info!(
        atoms = n,
        cycles = temperatures.len(),
        steps_per_cycle = schedule.number_of_steps,
        wx = schedule.weights.map,
        wc = schedule.weights.restraints,
        "Starting simulated annealing"
    );

    let masses = input.masses;
    let mut target = FitTarget {
        restraints: input.restraints,
        map: MapTerm::new(input.map, schedule.update_grads_shift),
        weights: schedule.weights,
    };
    let mut rng = StdRng::seed_from_u64(schedule.random_seed);
    let integrator = VelocityVerlet::new(schedule.time_step);

    let (mut energy, gradients) = target.evaluate(&input.sites);
    if !energy.total.is_finite() {
        return Err(EngineError::NumericalInstability {
            cycle: 0,
            step: 0,
            temperature: schedule.start_temperature,
            quantity: "starting energy",
        });
    }
    debug!(total = energy.total, map = energy.map, "Starting energy");

    let mut state = DynamicsState {
        sites: input.sites,
        velocities: vec![Vector3::zeros(); n],
        gradients,
    };

    reporter.report(Progress::TaskStart {
        total_steps: temperatures.len() as u64,
    });
    for (cycle, &temperature) in temperatures.iter().enumerate() {
        state.velocities = maxwell_boltzmann_velocities(masses, temperature, &mut rng);
        remove_center_of_mass_motion(&mut state.velocities, masses);

        for step in 0..schedule.number_of_steps {
            if cancel.is_cancelled() {
                reporter.report(Progress::TaskFinish);
                info!(completed_cycles = cycle, "Annealing cancelled");
                return Err(EngineError::Cancelled {
                    completed_cycles: cycle,
                });
            }
            let total = integrator.step(&mut state, masses, |s| target.evaluate_total(s));
            if !total.is_finite() || !all_finite(&state.sites) {
                return Err(EngineError::NumericalInstability {
                    cycle,
                    step,
                    temperature,
                    quantity: if total.is_finite() {
                        "coordinates"
                    } else {
                        "energy"
                    },
                });
            }
            rescale_velocities(&mut state.velocities, masses, temperature);
        }

        if schedule.interleave_minimization {
            let result = steepest_descent(&mut state.sites, MINIMIZATION_ITERATIONS, |s| {
                target.evaluate_total(s)
            });
            debug!(
                iterations = result.iterations,
                before = result.initial_energy,
                after = result.final_energy,
                "Interleaved minimization"
            );
        }

        let (cycle_energy, gradients) = target.evaluate(&state.sites);
        if !cycle_energy.total.is_finite() {
            return Err(EngineError::NumericalInstability {
                cycle,
                step: schedule.number_of_steps,
                temperature,
                quantity: "energy",
            });
        }
        state.gradients = gradients;
        energy = cycle_energy;

        sink.record(&state.sites);
        reporter.report(Progress::CycleFinished {
            temperature,
            energy: energy.total,
        });
        reporter.report(Progress::TaskIncrement);
        debug!(
            cycle,
            temperature,
            total = energy.total,
            map = energy.map,
            geometry = energy.restraints.total(),
            "Temperature cycle finished"
        );
    }
    reporter.report(Progress::TaskFinish);

    info!(
        total = energy.total,
        map = energy.map,
        geometry = energy.restraints.total(),
        map_gradient_refreshes = target.map.refreshes(),
        "Simulated annealing finished"
    );
    Ok(AnnealingOutcome {
        sites: state.sites,
        cycles: temperatures.len(),
        energy,
    })
}
