use super::element;
use super::ids::ResidueId;
use nalgebra::Point3;

/// Represents an atom of an atomic model together with the per-atom
/// crystallographic attributes needed to compute its scattering.
#[derive(Debug, Clone, PartialEq)]
pub struct Atom {
    /// Serial number from the source file.
    pub serial: usize,
    /// The atom name exactly as it appeared in the file (e.g. " CA ").
    pub name: String,
    /// Alternate location indicator, blank when absent.
    pub alt_loc: char,
    /// Upper-case element symbol (e.g. "C", "FE").
    pub element: String,
    /// Formal charge field as written in the source file, possibly empty.
    pub charge: String,
    /// The ID of the parent residue this atom belongs to.
    pub residue_id: ResidueId,
    /// Cartesian coordinates in Angstroms.
    pub position: Point3<f64>,
    /// Site occupancy in `[0, 1]`.
    pub occupancy: f64,
    /// Isotropic displacement parameter in square Angstroms.
    pub b_factor: f64,
    /// Whether the record was a `HETATM`.
    pub hetero: bool,
}

impl Atom {
    /// Creates a new atom with unit occupancy and a B-factor of 20 A^2.
    ///
    /// The element is inferred from the atom name; callers that know the
    /// element should overwrite it.
    pub fn new(name: &str, residue_id: ResidueId, position: Point3<f64>) -> Self {
        Self {
            serial: 0,
            name: name.to_string(),
            alt_loc: ' ',
            element: element::infer_from_atom_name(name),
            charge: String::new(),
            residue_id,
            position,
            occupancy: 1.0,
            b_factor: 20.0,
            hetero: false,
        }
    }

    /// Atomic mass in daltons, falling back to carbon for unknown elements.
    pub fn mass(&self) -> f64 {
        element::lookup(&self.element).map_or(12.011, |e| e.mass)
    }

    /// Covalent radius in Angstroms, falling back to carbon for unknown elements.
    pub fn covalent_radius(&self) -> f64 {
        element::lookup(&self.element).map_or(0.76, |e| e.covalent_radius)
    }

    pub fn is_hydrogen(&self) -> bool {
        element::is_hydrogen(&self.element)
    }
}
