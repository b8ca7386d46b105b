use nalgebra::{Point3, Vector3};
use rand::Rng;
use rand_distr::{Distribution, StandardNormal};

/// Boltzmann constant in kcal/(mol K).
pub const BOLTZMANN: f64 = 0.0019872041;

/// Converts kcal/(mol Å amu) into Å/ps².
pub const ACCELERATION_UNIT: f64 = 418.4;

/// Positions, velocities and the energy gradient at those positions.
#[derive(Debug, Clone)]
pub struct DynamicsState {
    pub sites: Vec<Point3<f64>>,
    /// Å/ps.
    pub velocities: Vec<Vector3<f64>>,
    /// `dE/dx` in kcal/(mol Å).
    pub gradients: Vec<Vector3<f64>>,
}

/// Draws velocities from the Maxwell–Boltzmann distribution at `temperature`.
/// Massless sites get zero velocity.
pub fn maxwell_boltzmann_velocities<R: Rng + ?Sized>(
    masses: &[f64],
    temperature: f64,
    rng: &mut R,
) -> Vec<Vector3<f64>> {
    masses
        .iter()
        .map(|&m| {
            let sigma = if m > 0.0 && temperature > 0.0 {
                (BOLTZMANN * temperature * ACCELERATION_UNIT / m).sqrt()
            } else {
                0.0
            };
            let x: f64 = StandardNormal.sample(&mut *rng);
            let y: f64 = StandardNormal.sample(&mut *rng);
            let z: f64 = StandardNormal.sample(&mut *rng);
            Vector3::new(x, y, z) * sigma
        })
        .collect()
}

pub fn remove_center_of_mass_motion(velocities: &mut [Vector3<f64>], masses: &[f64]) {
    let total_mass: f64 = masses.iter().sum();
    if total_mass <= 0.0 {
        return;
    }
    let momentum = velocities
        .iter()
        .zip(masses)
        .fold(Vector3::zeros(), |acc, (v, &m)| acc + v * m);
    let drift = momentum / total_mass;
    for v in velocities.iter_mut() {
        *v -= drift;
    }
}

/// Kinetic energy in kcal/mol.
pub fn kinetic_energy(velocities: &[Vector3<f64>], masses: &[f64]) -> f64 {
    velocities
        .iter()
        .zip(masses)
        .map(|(v, &m)| 0.5 * m * v.norm_squared())
        .sum::<f64>()
        / ACCELERATION_UNIT
}

/// Instantaneous temperature, with the centre-of-mass degrees of freedom
/// removed.
pub fn instantaneous_temperature(velocities: &[Vector3<f64>], masses: &[f64]) -> f64 {
    let dof = (3 * velocities.len()).saturating_sub(3).max(1) as f64;
    2.0 * kinetic_energy(velocities, masses) / (dof * BOLTZMANN)
}

/// Scales velocities so the instantaneous temperature equals `target`.
pub fn rescale_velocities(velocities: &mut [Vector3<f64>], masses: &[f64], target: f64) {
    let current = instantaneous_temperature(velocities, masses);
    let factor = if current > 0.0 && target > 0.0 {
        (target / current).sqrt()
    } else {
        0.0
    };
    for v in velocities.iter_mut() {
        *v *= factor;
    }
}

pub struct VelocityVerlet {
    /// Picoseconds.
    pub dt: f64,
}

impl VelocityVerlet {
    pub fn new(dt: f64) -> Self {
        Self { dt }
    }

    /// Advances `state` by one step. `evaluate` returns the potential energy
    /// and its gradient at the given sites; its energy at the new positions is
    /// returned.
    pub fn step<F>(&self, state: &mut DynamicsState, masses: &[f64], mut evaluate: F) -> f64
    where
        F: FnMut(&[Point3<f64>]) -> (f64, Vec<Vector3<f64>>),
    {
        let half_dt = 0.5 * self.dt;
        for ((v, g), &m) in state.velocities.iter_mut().zip(&state.gradients).zip(masses) {
            if m > 0.0 {
                *v -= g * (half_dt * ACCELERATION_UNIT / m);
            }
        }
        for (x, v) in state.sites.iter_mut().zip(&state.velocities) {
            *x += v * self.dt;
        }

        let (energy, gradients) = evaluate(&state.sites);
        state.gradients = gradients;

        for ((v, g), &m) in state.velocities.iter_mut().zip(&state.gradients).zip(masses) {
            if m > 0.0 {
                *v -= g * (half_dt * ACCELERATION_UNIT / m);
            }
        }
        energy
    }
}
