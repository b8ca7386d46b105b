use nalgebra::{Point3, Vector3};

const INITIAL_STEP: f64 = 0.01;
const MAX_STEP: f64 = 0.2;
const MIN_STEP: f64 = 1e-6;
const GRADIENT_TOLERANCE: f64 = 1e-4;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MinimizationResult {
    pub iterations: usize,
    pub initial_energy: f64,
    pub final_energy: f64,
}

/// Steepest descent with an adaptive step measured as the displacement of the
/// site with the largest gradient. Only downhill moves are accepted, so the
/// energy never increases.
pub fn steepest_descent<F>(
    sites: &mut Vec<Point3<f64>>,
    max_iterations: usize,
    mut evaluate: F,
) -> MinimizationResult
where
    F: FnMut(&[Point3<f64>]) -> (f64, Vec<Vector3<f64>>),
{
    let (mut energy, mut gradients) = evaluate(sites);
    let initial_energy = energy;
    let mut step = INITIAL_STEP;
    let mut iterations = 0;

    while iterations < max_iterations && energy.is_finite() {
        let largest = gradients.iter().map(|g| g.norm()).fold(0.0, f64::max);
        if largest < GRADIENT_TOLERANCE || step < MIN_STEP {
            break;
        }
        iterations += 1;

        let scale = step / largest;
        let trial: Vec<Point3<f64>> = sites
            .iter()
            .zip(&gradients)
            .map(|(x, g)| x - g * scale)
            .collect();
        let (trial_energy, trial_gradients) = evaluate(&trial);
        if trial_energy < energy {
            *sites = trial;
            energy = trial_energy;
            gradients = trial_gradients;
            step = (step * 1.2).min(MAX_STEP);
        } else {
            step *= 0.5;
        }
    }

    MinimizationResult {
        iterations,
        initial_energy,
        final_energy: energy,
    }
}
