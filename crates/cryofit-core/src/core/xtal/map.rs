use super::cell::{CrystalSymmetry, UnitCell};
use super::grid::DensityGrid;
use nalgebra::{Point3, Vector3};

/// The density a model is fitted into: a full-cell grid and the symmetry it
/// was defined in. Never modified once built.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetMap {
    grid: DensityGrid,
    symmetry: CrystalSymmetry,
}

impl TargetMap {
    pub fn new(grid: DensityGrid, symmetry: CrystalSymmetry) -> Self {
        Self { grid, symmetry }
    }

    pub fn grid(&self) -> &DensityGrid {
        &self.grid
    }

    pub fn symmetry(&self) -> &CrystalSymmetry {
        &self.symmetry
    }

    pub fn unit_cell(&self) -> &UnitCell {
        &self.symmetry.unit_cell
    }

    /// Interpolated density at a Cartesian site.
    pub fn value_at(&self, site: &Point3<f64>) -> f64 {
        self.grid.interpolate(&self.unit_cell().fractionalize(site)).0
    }

    /// Interpolated density and its Cartesian gradient at a site.
    pub fn value_and_gradient(&self, site: &Point3<f64>) -> (f64, Vector3<f64>) {
        let cell = self.unit_cell();
        let (value, grad_frac) = self.grid.interpolate(&cell.fractionalize(site));
        // frac = M x, so d(rho)/dx = M^T d(rho)/d(frac).
        let grad = cell.fractionalization_matrix().transpose() * grad_frac;
        (value, grad)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp_map() -> TargetMap {
        let dims = [8, 6, 5];
        let mut grid = DensityGrid::zeros(dims).unwrap();
        for z in 0..dims[2] {
            for y in 0..dims[1] {
                for x in 0..dims[0] {
                    let v = ((x as f64) * 0.7).sin() + ((y as f64) * 1.1).cos() * (z as f64 + 1.0);
                    grid.set(x, y, z, v);
                }
            }
        }
        let cell = UnitCell::new([16.0, 12.0, 10.0, 85.0, 100.0, 95.0]).unwrap();
        TargetMap::new(grid, CrystalSymmetry::new(cell, "P 1"))
    }

    #[test]
    fn cartesian_gradient_matches_finite_differences() {
        let map = ramp_map();
        let site = Point3::new(4.3, 5.1, 3.7);
        let (_, grad) = map.value_and_gradient(&site);

        let h = 1e-6;
        for axis in 0..3 {
            let mut plus = site;
            let mut minus = site;
            plus[axis] += h;
            minus[axis] -= h;
            let numeric = (map.value_at(&plus) - map.value_at(&minus)) / (2.0 * h);
            assert!(
                (numeric - grad[axis]).abs() < 1e-4,
                "axis {}: analytic {} vs numeric {}",
                axis,
                grad[axis],
                numeric
            );
        }
    }

    #[test]
    fn value_at_a_grid_point_is_the_stored_value() {
        let map = ramp_map();
        let frac = Vector3::new(3.0 / 8.0, 2.0 / 6.0, 1.0 / 5.0);
        let site = map.unit_cell().orthogonalize(&frac);
        assert!((map.value_at(&site) - map.grid().get(3, 2, 1)).abs() < 1e-9);
    }
}
