use super::cell::UnitCell;
use super::error::XtalError;
use super::grid::DensityGrid;
use super::miller::{self, MillerIndex};
use super::scattering::{self, FormFactor};
use crate::core::models::system::MolecularSystem;
use nalgebra::Vector3;
use rustfft::FftPlanner;
use rustfft::num_complex::Complex64;
use std::collections::{HashMap, HashSet};
use std::f64::consts::TAU;
use tracing::warn;

/// One atom as seen by the structure-factor calculation.
#[derive(Debug, Clone, PartialEq)]
pub struct Scatterer {
    pub site_frac: Vector3<f64>,
    /// Index into [`ScatteringModel::form_factors`].
    pub kind: usize,
    pub occupancy: f64,
    pub b_iso: f64,
}

/// Scatterers of a model expressed in a particular unit cell.
#[derive(Debug, Clone)]
pub struct ScatteringModel {
    cell: UnitCell,
    form_factors: Vec<&'static FormFactor>,
    scatterers: Vec<Scatterer>,
}

impl ScatteringModel {
    /// Fractionalizes every atom of `system` in `cell`.
    ///
    /// Elements without tabulated coefficients scatter as carbon.
    pub fn from_system(system: &MolecularSystem, cell: &UnitCell) -> Self {
        let mut kinds: HashMap<String, usize> = HashMap::new();
        let mut form_factors = Vec::new();
        let mut unknown = HashSet::new();

        let scatterers = system
            .atoms_iter()
            .map(|(_, atom)| {
                let symbol = atom.element.trim().to_ascii_uppercase();
                let kind = *kinds.entry(symbol.clone()).or_insert_with(|| {
                    if scattering::lookup(&symbol).is_none() && unknown.insert(symbol.clone()) {
                        warn!(element = %symbol, "No form factor for element, using carbon");
                    }
                    form_factors.push(scattering::form_factor_or_carbon(&symbol));
                    form_factors.len() - 1
                });
                Scatterer {
                    site_frac: cell.fractionalize(&atom.position),
                    kind,
                    occupancy: atom.occupancy,
                    b_iso: atom.b_factor,
                }
            })
            .collect();

        Self {
            cell: cell.clone(),
            form_factors,
            scatterers,
        }
    }

    pub fn cell(&self) -> &UnitCell {
        &self.cell
    }

    pub fn form_factors(&self) -> &[&'static FormFactor] {
        &self.form_factors
    }

    pub fn scatterers(&self) -> &[Scatterer] {
        &self.scatterers
    }
}

/// Complex structure factors on a set of Miller indices.
#[derive(Debug, Clone, PartialEq)]
pub struct MillerArray {
    cell: UnitCell,
    indices: Vec<MillerIndex>,
    data: Vec<Complex64>,
}

impl MillerArray {
    pub fn new(
        cell: UnitCell,
        indices: Vec<MillerIndex>,
        data: Vec<Complex64>,
    ) -> Result<Self, XtalError> {
        if indices.len() != data.len() {
            return Err(XtalError::InvalidGrid(format!(
                "{} indices but {} structure factors",
                indices.len(),
                data.len()
            )));
        }
        Ok(Self {
            cell,
            indices,
            data,
        })
    }

    pub fn cell(&self) -> &UnitCell {
        &self.cell
    }

    pub fn indices(&self) -> &[MillerIndex] {
        &self.indices
    }

    pub fn data(&self) -> &[Complex64] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Multiplies every structure factor by `k`.
    pub fn scaled(&self, k: f64) -> MillerArray {
        MillerArray {
            cell: self.cell.clone(),
            indices: self.indices.clone(),
            data: self.data.iter().map(|f| *f * k).collect(),
        }
    }
}

/// Model structure factors for every index with `d >= d_min`, by direct
/// summation over atoms.
pub fn f_calc(model: &ScatteringModel, d_min: f64) -> Result<MillerArray, XtalError> {
    if model.scatterers.is_empty() {
        return Err(XtalError::EmptyModel);
    }
    let indices = miller::generate_half_sphere(&model.cell, d_min)?;

    let mut f_kind = vec![0.0; model.form_factors.len()];
    let data: Vec<Complex64> = indices
        .iter()
        .map(|&index| {
            let stol_sq = model.cell.d_star_sq(index) / 4.0;
            for (f, form_factor) in f_kind.iter_mut().zip(&model.form_factors) {
                *f = form_factor.at_stol_sq(stol_sq);
            }
            let h = Vector3::new(index[0] as f64, index[1] as f64, index[2] as f64);
            model
                .scatterers
                .iter()
                .map(|s| {
                    let amplitude = s.occupancy * f_kind[s.kind] * (-s.b_iso * stol_sq).exp();
                    Complex64::from_polar(amplitude, TAU * h.dot(&s.site_frac))
                })
                .sum::<Complex64>()
        })
        .collect();

    MillerArray::new(model.cell.clone(), indices, data)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FftDirection {
    /// `exp(-2 pi i ...)`, unnormalized.
    Forward,
    /// `exp(+2 pi i ...)`, unnormalized.
    Inverse,
}

/// In-place unnormalized 3D FFT over x-fastest data.
fn fft3d(data: &mut [Complex64], dims: [usize; 3], direction: FftDirection) {
    let [nx, ny, nz] = dims;
    let mut planner = FftPlanner::<f64>::new();
    let mut plan = |n: usize| match direction {
        FftDirection::Forward => planner.plan_fft_forward(n),
        FftDirection::Inverse => planner.plan_fft_inverse(n),
    };

    let fft = plan(nx);
    for line in data.chunks_exact_mut(nx) {
        fft.process(line);
    }

    let fft = plan(ny);
    let mut buffer = vec![Complex64::default(); ny];
    for z in 0..nz {
        for x in 0..nx {
            for (y, value) in buffer.iter_mut().enumerate() {
                *value = data[x + nx * (y + ny * z)];
            }
            fft.process(&mut buffer);
            for (y, value) in buffer.iter().enumerate() {
                data[x + nx * (y + ny * z)] = *value;
            }
        }
    }

    let fft = plan(nz);
    let mut buffer = vec![Complex64::default(); nz];
    for y in 0..ny {
        for x in 0..nx {
            for (z, value) in buffer.iter_mut().enumerate() {
                *value = data[x + nx * (y + ny * z)];
            }
            fft.process(&mut buffer);
            for (z, value) in buffer.iter().enumerate() {
                data[x + nx * (y + ny * z)] = *value;
            }
        }
    }
}

/// Whether `index` and its Friedel mate occupy distinct cells of a grid.
fn fits_grid(index: MillerIndex, dims: [usize; 3]) -> bool {
    (0..3).all(|axis| 2 * (index[axis].unsigned_abs() as usize) < dims[axis])
}

fn wrapped_offset(index: MillerIndex, dims: [usize; 3]) -> usize {
    let wrap = |h: i32, n: usize| (h as i64).rem_euclid(n as i64) as usize;
    let (x, y, z) = (
        wrap(index[0], dims[0]),
        wrap(index[1], dims[1]),
        wrap(index[2], dims[2]),
    );
    x + dims[0] * (y + dims[1] * z)
}

/// Synthesizes the real-space map `rho(x) = 1/V sum_h F(h) exp(-2 pi i h.x)`
/// over the full sphere (each stored index and its Friedel mate).
///
/// The `F(000)` term is absent, so the map has zero mean.
///
/// # Errors
///
/// Returns [`XtalError::InvalidGrid`] if the grid is too coarse to hold
/// every index without aliasing.
pub fn fft_map(coefficients: &MillerArray, dims: [usize; 3]) -> Result<DensityGrid, XtalError> {
    let len: usize = dims.iter().product();
    if len == 0 {
        return Err(XtalError::InvalidGrid(format!("empty grid {:?}", dims)));
    }
    let mut grid = vec![Complex64::default(); len];
    for (&index, &f) in coefficients.indices.iter().zip(&coefficients.data) {
        if !fits_grid(index, dims) {
            return Err(XtalError::InvalidGrid(format!(
                "index {:?} does not fit grid {:?}",
                index, dims
            )));
        }
        let mate = [-index[0], -index[1], -index[2]];
        grid[wrapped_offset(index, dims)] += f;
        grid[wrapped_offset(mate, dims)] += f.conj();
    }

    fft3d(&mut grid, dims, FftDirection::Forward);

    let inv_volume = 1.0 / coefficients.cell.volume();
    DensityGrid::from_data(dims, grid.iter().map(|c| c.re * inv_volume).collect())
}

/// Fourier coefficients of a full-cell map on the requested indices:
/// `F(h) = V/N sum_x rho(x) exp(2 pi i h.x)`.
///
/// Indices beyond the grid's Nyquist limit are dropped from the result.
pub fn structure_factors_from_map(
    map: &DensityGrid,
    cell: &UnitCell,
    indices: &[MillerIndex],
) -> Result<MillerArray, XtalError> {
    let dims = map.dims();
    let mut transformed: Vec<Complex64> = map
        .data()
        .iter()
        .map(|&v| Complex64::new(v, 0.0))
        .collect();
    fft3d(&mut transformed, dims, FftDirection::Inverse);

    let factor = cell.volume() / map.len() as f64;
    let (kept, data): (Vec<MillerIndex>, Vec<Complex64>) = indices
        .iter()
        .filter(|&&index| fits_grid(index, dims))
        .map(|&index| (index, transformed[wrapped_offset(index, dims)] * factor))
        .unzip();

    if kept.is_empty() {
        return Err(XtalError::InvalidGrid(format!(
            "no requested index fits grid {:?}",
            dims
        )));
    }
    MillerArray::new(cell.clone(), kept, data)
}

/// Least-squares scale `k` minimizing `sum (|F_ref| - k |F|)^2` over the
/// indices both arrays share.
pub fn scale_factor(reference: &MillerArray, other: &MillerArray) -> Option<f64> {
    let lookup: HashMap<MillerIndex, Complex64> = other
        .indices
        .iter()
        .copied()
        .zip(other.data.iter().copied())
        .collect();
    let (mut num, mut den) = (0.0, 0.0);
    for (index, f_ref) in reference.indices.iter().zip(&reference.data) {
        if let Some(f) = lookup.get(index) {
            num += f_ref.norm() * f.norm();
            den += f.norm_sqr();
        }
    }
    (den > 0.0).then(|| num / den)
}

/// Phase-aware correlation of two sets of map coefficients over their common
/// indices: `sum Re(F1 F2*) / sqrt(sum |F1|^2 sum |F2|^2)`.
///
/// Returns `None` when there are no common indices or either side has no
/// power.
pub fn map_correlation(a: &MillerArray, b: &MillerArray) -> Option<f64> {
    let lookup: HashMap<MillerIndex, Complex64> = b
        .indices
        .iter()
        .copied()
        .zip(b.data.iter().copied())
        .collect();
    let (mut cross, mut power_a, mut power_b) = (0.0, 0.0, 0.0);
    for (index, fa) in a.indices.iter().zip(&a.data) {
        if let Some(fb) = lookup.get(index) {
            cross += (*fa * fb.conj()).re;
            power_a += fa.norm_sqr();
            power_b += fb.norm_sqr();
        }
    }
    let denominator = (power_a * power_b).sqrt();
    if denominator > 0.0 && denominator.is_finite() {
        Some((cross / denominator).clamp(-1.0, 1.0))
    } else {
        None
    }
}
