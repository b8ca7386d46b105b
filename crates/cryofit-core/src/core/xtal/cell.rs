use super::error::XtalError;
use nalgebra::{Matrix3, Point3, Vector3};

/// Cells whose edges are all this short are treated as the placeholder
/// `CRYST1 1.000 1.000 1.000` records that cryo-EM models commonly carry.
const PLACEHOLDER_EDGE_LENGTH: f64 = 1.0 + 1e-6;

/// A crystallographic unit cell.
///
/// The orthogonalization follows the PDB convention: `a` along x, `b` in the
/// xy-plane, `c*` along z.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitCell {
    parameters: [f64; 6],
    orthogonalization: Matrix3<f64>,
    fractionalization: Matrix3<f64>,
    volume: f64,
}

impl UnitCell {
    /// Builds a cell from `[a, b, c, alpha, beta, gamma]` (Angstroms, degrees).
    ///
    /// # Errors
    ///
    /// Returns [`XtalError::InvalidCell`] for non-positive edges, angles outside
    /// `(0, 180)`, or angle combinations with no real volume.
    pub fn new(parameters: [f64; 6]) -> Result<Self, XtalError> {
        let [a, b, c, alpha, beta, gamma] = parameters;
        if [a, b, c].iter().any(|&l| !(l.is_finite() && l > 0.0)) {
            return Err(XtalError::InvalidCell(format!(
                "edge lengths must be positive, got {:?}",
                parameters
            )));
        }
        if [alpha, beta, gamma]
            .iter()
            .any(|&ang| !(ang.is_finite() && ang > 0.0 && ang < 180.0))
        {
            return Err(XtalError::InvalidCell(format!(
                "angles must lie in (0, 180), got {:?}",
                parameters
            )));
        }

        let (ca, cb, cg) = (
            alpha.to_radians().cos(),
            beta.to_radians().cos(),
            gamma.to_radians().cos(),
        );
        let sg = gamma.to_radians().sin();
        let volume_factor = 1.0 - ca * ca - cb * cb - cg * cg + 2.0 * ca * cb * cg;
        if volume_factor <= 0.0 {
            return Err(XtalError::InvalidCell(format!(
                "angles {:?} do not describe a real cell",
                [alpha, beta, gamma]
            )));
        }
        let volume = a * b * c * volume_factor.sqrt();

        let orthogonalization = Matrix3::new(
            a,
            b * cg,
            c * cb,
            0.0,
            b * sg,
            c * (ca - cb * cg) / sg,
            0.0,
            0.0,
            volume / (a * b * sg),
        );
        let fractionalization = orthogonalization.try_inverse().ok_or_else(|| {
            XtalError::InvalidCell(format!("singular cell {:?}", parameters))
        })?;

        Ok(Self {
            parameters,
            orthogonalization,
            fractionalization,
            volume,
        })
    }

    /// An orthorhombic box with the given edge lengths.
    pub fn orthorhombic(a: f64, b: f64, c: f64) -> Result<Self, XtalError> {
        Self::new([a, b, c, 90.0, 90.0, 90.0])
    }

    pub fn parameters(&self) -> [f64; 6] {
        self.parameters
    }

    pub fn volume(&self) -> f64 {
        self.volume
    }

    pub fn orthogonalization_matrix(&self) -> &Matrix3<f64> {
        &self.orthogonalization
    }

    pub fn fractionalization_matrix(&self) -> &Matrix3<f64> {
        &self.fractionalization
    }

    pub fn fractionalize(&self, site: &Point3<f64>) -> Vector3<f64> {
        self.fractionalization * site.coords
    }

    pub fn orthogonalize(&self, frac: &Vector3<f64>) -> Point3<f64> {
        Point3::from(self.orthogonalization * frac)
    }

    /// `1/d^2` for a Miller index.
    pub fn d_star_sq(&self, index: [i32; 3]) -> f64 {
        let h = Vector3::new(index[0] as f64, index[1] as f64, index[2] as f64);
        (self.fractionalization.transpose() * h).norm_squared()
    }

    /// Whether this looks like a placeholder cell rather than a real one.
    pub fn is_placeholder(&self) -> bool {
        self.parameters[..3]
            .iter()
            .all(|&edge| edge <= PLACEHOLDER_EDGE_LENGTH)
    }
}

/// A unit cell together with the space-group symbol it was declared with.
///
/// Only the identity operator is ever applied; map fitting works in P1.
#[derive(Debug, Clone, PartialEq)]
pub struct CrystalSymmetry {
    pub unit_cell: UnitCell,
    pub space_group: String,
}

impl CrystalSymmetry {
    pub fn new(unit_cell: UnitCell, space_group: &str) -> Self {
        let space_group = space_group.trim();
        Self {
            unit_cell,
            space_group: if space_group.is_empty() {
                "P 1".to_string()
            } else {
                space_group.to_string()
            },
        }
    }

    /// A P1 box enclosing `sites` with `padding` Angstroms on every side.
    ///
    /// # Errors
    ///
    /// Returns [`XtalError::EmptyModel`] when there are no sites.
    pub fn p1_box_around(sites: &[Point3<f64>], padding: f64) -> Result<Self, XtalError> {
        let first = sites.first().ok_or(XtalError::EmptyModel)?;
        let (mut min, mut max) = (first.coords, first.coords);
        for site in sites {
            min = min.inf(&site.coords);
            max = max.sup(&site.coords);
        }
        let extent = max - min;
        let cell = UnitCell::orthorhombic(
            extent.x + 2.0 * padding,
            extent.y + 2.0 * padding,
            extent.z + 2.0 * padding,
        )?;
        Ok(Self::new(cell, "P 1"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() < tol
    }

    #[test]
    fn orthorhombic_cell_is_diagonal() {
        let cell = UnitCell::orthorhombic(10.0, 20.0, 30.0).unwrap();
        assert!(approx_eq(cell.volume(), 6000.0, 1e-9));
        let frac = cell.fractionalize(&Point3::new(5.0, 5.0, 15.0));
        assert!(approx_eq(frac.x, 0.5, 1e-12));
        assert!(approx_eq(frac.y, 0.25, 1e-12));
        assert!(approx_eq(frac.z, 0.5, 1e-12));
        assert!(approx_eq(cell.d_star_sq([1, 0, 0]), 0.01, 1e-12));
    }

    #[test]
    fn fractionalize_and_orthogonalize_are_inverse_for_oblique_cells() {
        let cell = UnitCell::new([40.0, 50.0, 60.0, 80.0, 95.0, 110.0]).unwrap();
        let site = Point3::new(3.2, -7.1, 12.5);
        let back = cell.orthogonalize(&cell.fractionalize(&site));
        assert!((back - site).norm() < 1e-10);
    }

    #[test]
    fn hexagonal_d_spacing_matches_closed_form() {
        let cell = UnitCell::new([50.0, 50.0, 80.0, 90.0, 90.0, 120.0]).unwrap();
        // 1/d^2 = 4/3 (h^2 + hk + k^2)/a^2 + l^2/c^2
        let expected = 4.0 / 3.0 * (1.0 + 1.0 + 1.0) / 2500.0 + 4.0 / 6400.0;
        assert!(approx_eq(cell.d_star_sq([1, 1, 2]), expected, 1e-12));
    }

    #[test]
    fn invalid_cells_are_rejected() {
        assert!(matches!(
            UnitCell::new([0.0, 1.0, 1.0, 90.0, 90.0, 90.0]),
            Err(XtalError::InvalidCell(_))
        ));
        assert!(matches!(
            UnitCell::new([10.0, 10.0, 10.0, 90.0, 90.0, 180.0]),
            Err(XtalError::InvalidCell(_))
        ));
        assert!(matches!(
            UnitCell::new([10.0, 10.0, 10.0, 10.0, 10.0, 100.0]),
            Err(XtalError::InvalidCell(_))
        ));
    }

    #[test]
    fn placeholder_cells_are_detected() {
        assert!(UnitCell::orthorhombic(1.0, 1.0, 1.0).unwrap().is_placeholder());
        assert!(!UnitCell::orthorhombic(1.0, 1.0, 30.0).unwrap().is_placeholder());
    }

    #[test]
    fn p1_box_pads_the_bounding_box() {
        let sites = [Point3::new(-1.0, 0.0, 2.0), Point3::new(3.0, 1.0, 2.0)];
        let symmetry = CrystalSymmetry::p1_box_around(&sites, 5.0).unwrap();
        let [a, b, c, ..] = symmetry.unit_cell.parameters();
        assert!(approx_eq(a, 14.0, 1e-12));
        assert!(approx_eq(b, 11.0, 1e-12));
        assert!(approx_eq(c, 10.0, 1e-12));
        assert_eq!(symmetry.space_group, "P 1");
        assert!(matches!(
            CrystalSymmetry::p1_box_around(&[], 5.0),
            Err(XtalError::EmptyModel)
        ));
    }
}
