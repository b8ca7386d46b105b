use super::neighbors::pairs_within;
use super::potentials::{angle_degrees, harmonic_angle, harmonic_distance, repulsion};
use super::term::RestraintEnergy;
use crate::core::models::ids::AtomId;
use crate::core::models::system::MolecularSystem;
use nalgebra::{Point3, Vector3};
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::debug;

/// Energy and per-site gradient of a restraint set.
#[derive(Debug, Clone, PartialEq)]
pub struct RestraintEvaluation {
    pub energy: RestraintEnergy,
    /// `dE/dx` for each site, in the order the sites were given.
    pub gradients: Vec<Vector3<f64>>,
}

/// Stereochemical restraints that keep a model chemically sensible while it
/// is pulled into density.
pub trait GeometryRestraints {
    /// Number of sites the restraints were built for.
    fn site_count(&self) -> usize;

    /// Evaluates the restraints at `sites`, which must hold
    /// [`site_count`](GeometryRestraints::site_count) entries.
    fn evaluate(&self, sites: &[Point3<f64>]) -> RestraintEvaluation;
}

/// Tunables for restraint generation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RestraintParams {
    /// Standard deviation of bond lengths, in Angstroms.
    pub bond_sigma: f64,
    /// Standard deviation of bond angles, in degrees.
    pub angle_sigma: f64,
    /// Slack added to the sum of covalent radii when detecting bonds.
    pub bond_tolerance: f64,
    /// Closest allowed approach of two non-hydrogen atoms.
    pub heavy_min_distance: f64,
    /// Closest allowed approach when one atom is a hydrogen.
    pub hydrogen_min_distance: f64,
    /// Closest allowed approach of two hydrogens.
    pub hydrogen_pair_min_distance: f64,
    /// Width of the repulsive wall, in Angstroms.
    pub nonbonded_sigma: f64,
}

impl Default for RestraintParams {
    fn default() -> Self {
        Self {
            bond_sigma: 0.02,
            angle_sigma: 3.0,
            bond_tolerance: 0.4,
            heavy_min_distance: 2.5,
            hydrogen_min_distance: 1.7,
            hydrogen_pair_min_distance: 1.5,
            nonbonded_sigma: 0.2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BondProxy {
    pub i: usize,
    pub j: usize,
    pub ideal: f64,
}

/// An angle with its vertex at `j`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AngleProxy {
    pub i: usize,
    pub j: usize,
    pub k: usize,
    pub ideal_degrees: f64,
}

/// Reference-geometry restraints inferred from a model.
///
/// Bonds are detected from covalent radii inside each residue and between
/// residues that follow each other in a chain; angles come from bonded
/// triples. Ideal values are the starting geometry, so the restraints resist
/// distortion without imposing a dictionary. Atoms that are neither 1-2 nor
/// 1-3 related repel each other below a minimum distance.
#[derive(Debug, Clone)]
pub struct RestraintsManager {
    params: RestraintParams,
    site_count: usize,
    bonds: Vec<BondProxy>,
    angles: Vec<AngleProxy>,
    exclusions: HashSet<(usize, usize)>,
    is_hydrogen: Vec<bool>,
}

fn ordered(a: usize, b: usize) -> (usize, usize) {
    (a.min(b), a.max(b))
}

impl RestraintsManager {
    pub fn from_system(system: &MolecularSystem, params: RestraintParams) -> Self {
        let index_of: HashMap<AtomId, usize> = system
            .atoms_iter()
            .enumerate()
            .map(|(index, (id, _))| (id, index))
            .collect();
        let sites = system.sites_cart();
        let atoms: Vec<_> = system.atoms_iter().map(|(_, atom)| atom).collect();

        let is_bonded = |a: usize, b: usize| {
            let limit = atoms[a].covalent_radius() + atoms[b].covalent_radius() + params.bond_tolerance;
            let dist = (sites[a] - sites[b]).norm();
            dist > 0.4 && dist <= limit
        };

        let mut bond_pairs = BTreeSet::new();
        for (_, chain) in system.chains_iter() {
            let residue_atoms: Vec<Vec<usize>> = chain
                .residues()
                .iter()
                .filter_map(|&rid| system.residue(rid))
                .map(|residue| residue.atoms().iter().filter_map(|id| index_of.get(id).copied()).collect())
                .collect();

            for (n, members) in residue_atoms.iter().enumerate() {
                for (x, &a) in members.iter().enumerate() {
                    for &b in &members[x + 1..] {
                        if is_bonded(a, b) {
                            bond_pairs.insert(ordered(a, b));
                        }
                    }
                }
                if let Some(next) = residue_atoms.get(n + 1) {
                    for &a in members {
                        for &b in next {
                            if is_bonded(a, b) {
                                bond_pairs.insert(ordered(a, b));
                            }
                        }
                    }
                }
            }
        }

        let bonds: Vec<BondProxy> = bond_pairs
            .iter()
            .map(|&(i, j)| BondProxy {
                i,
                j,
                ideal: (sites[i] - sites[j]).norm(),
            })
            .collect();

        let mut neighbors: Vec<Vec<usize>> = vec![Vec::new(); sites.len()];
        for bond in &bonds {
            neighbors[bond.i].push(bond.j);
            neighbors[bond.j].push(bond.i);
        }

        let mut angles = Vec::new();
        let mut exclusions: HashSet<(usize, usize)> = bond_pairs.iter().copied().collect();
        for (j, bonded) in neighbors.iter().enumerate() {
            for (x, &i) in bonded.iter().enumerate() {
                for &k in &bonded[x + 1..] {
                    angles.push(AngleProxy {
                        i,
                        j,
                        k,
                        ideal_degrees: angle_degrees(&sites[i], &sites[j], &sites[k]),
                    });
                    exclusions.insert(ordered(i, k));
                }
            }
        }

        debug!(
            atoms = sites.len(),
            bonds = bonds.len(),
            angles = angles.len(),
            "Built geometry restraints"
        );

        Self {
            params,
            site_count: sites.len(),
            bonds,
            angles,
            exclusions,
            is_hydrogen: atoms.iter().map(|atom| atom.is_hydrogen()).collect(),
        }
    }

    pub fn params(&self) -> &RestraintParams {
        &self.params
    }

    pub fn bonds(&self) -> &[BondProxy] {
        &self.bonds
    }

    pub fn angles(&self) -> &[AngleProxy] {
        &self.angles
    }

    pub fn is_excluded(&self, a: usize, b: usize) -> bool {
        self.exclusions.contains(&ordered(a, b))
    }

    fn min_distance(&self, a: usize, b: usize) -> f64 {
        match (self.is_hydrogen[a], self.is_hydrogen[b]) {
            (false, false) => self.params.heavy_min_distance,
            (true, true) => self.params.hydrogen_pair_min_distance,
            _ => self.params.hydrogen_min_distance,
        }
    }
}

impl GeometryRestraints for RestraintsManager {
    fn site_count(&self) -> usize {
        self.site_count
    }

    fn evaluate(&self, sites: &[Point3<f64>]) -> RestraintEvaluation {
        debug_assert_eq!(sites.len(), self.site_count);
        let mut energy = RestraintEnergy::default();
        let mut gradients = vec![Vector3::zeros(); sites.len()];

        for bond in &self.bonds {
            let (e, g) = harmonic_distance(
                &sites[bond.i],
                &sites[bond.j],
                bond.ideal,
                self.params.bond_sigma,
            );
            energy.bond += e;
            gradients[bond.i] += g;
            gradients[bond.j] -= g;
        }

        for angle in &self.angles {
            let (e, [gi, gj, gk]) = harmonic_angle(
                &sites[angle.i],
                &sites[angle.j],
                &sites[angle.k],
                angle.ideal_degrees,
                self.params.angle_sigma,
            );
            energy.angle += e;
            gradients[angle.i] += gi;
            gradients[angle.j] += gj;
            gradients[angle.k] += gk;
        }

        let cutoff = self
            .params
            .heavy_min_distance
            .max(self.params.hydrogen_min_distance)
            .max(self.params.hydrogen_pair_min_distance);
        for (a, b) in pairs_within(sites, cutoff) {
            if self.is_excluded(a, b) {
                continue;
            }
            let (e, g) = repulsion(
                &sites[a],
                &sites[b],
                self.min_distance(a, b),
                self.params.nonbonded_sigma,
            );
            energy.nonbonded += e;
            gradients[a] += g;
            gradients[b] -= g;
        }

        RestraintEvaluation { energy, gradients }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::atom::Atom;

    /// Two glycines joined by a peptide bond.
    fn dipeptide() -> MolecularSystem {
        let mut system = MolecularSystem::new();
        let chain = system.add_chain("A");
        let residues = [
            (1, [(" N  ", [0.000, 0.000, 0.000]), (" CA ", [1.458, 0.000, 0.000]), (" C  ", [2.009, 1.420, 0.000]), (" O  ", [1.251, 2.390, 0.000])]),
            (2, [(" N  ", [3.332, 1.536, 0.000]), (" CA ", [3.988, 2.839, 0.000]), (" C  ", [5.504, 2.693, 0.000]), (" O  ", [6.056, 1.590, 0.000])]),
        ];
        for (number, atoms) in residues {
            let rid = system.add_residue(chain, number, ' ', "GLY").unwrap();
            for (name, [x, y, z]) in atoms {
                system
                    .add_atom_to_residue(rid, Atom::new(name, rid, Point3::new(x, y, z)))
                    .unwrap();
            }
        }
        system
    }

    #[test]
    fn infers_backbone_and_peptide_bonds() {
        let manager = RestraintsManager::from_system(&dipeptide(), RestraintParams::default());
        let pairs: Vec<_> = manager.bonds().iter().map(|b| (b.i, b.j)).collect();
        // N-CA, CA-C, C-O in each residue plus C(1)-N(2).
        assert_eq!(pairs, vec![(0, 1), (1, 2), (2, 3), (2, 4), (4, 5), (5, 6), (6, 7)]);
        // CA-C-O, CA-C-N', O-C-N', N-CA-C, C-N'-CA', N'-CA'-C', CA'-C'-O'.
        assert_eq!(manager.angles().len(), 7);
        assert!(manager.is_excluded(1, 3));
        assert!(!manager.is_excluded(0, 3));
    }

    #[test]
    fn starting_geometry_has_no_bonded_strain() {
        let system = dipeptide();
        let manager = RestraintsManager::from_system(&system, RestraintParams::default());
        let evaluation = manager.evaluate(&system.sites_cart());
        assert!(evaluation.energy.bond < 1e-12);
        assert!(evaluation.energy.angle < 1e-12);
    }

    #[test]
    fn stretching_a_bond_costs_energy() {
        let system = dipeptide();
        let manager = RestraintsManager::from_system(&system, RestraintParams::default());
        let mut sites = system.sites_cart();
        sites[3].y += 0.1;
        let evaluation = manager.evaluate(&sites);
        assert!(evaluation.energy.bond > 1.0);
        assert!(evaluation.gradients[3].y > 0.0);
    }

    #[test]
    fn clashing_atoms_repel() {
        let system = dipeptide();
        let manager = RestraintsManager::from_system(&system, RestraintParams::default());
        let mut sites = system.sites_cart();
        // Push O(2) onto O(1); they are neither 1-2 nor 1-3 related.
        sites[7] = sites[3] + Vector3::new(1.0, 0.0, 0.0);
        let evaluation = manager.evaluate(&sites);
        assert!(evaluation.energy.nonbonded > 0.0);
    }

    #[test]
    fn gradient_matches_finite_differences() {
        let system = dipeptide();
        let manager = RestraintsManager::from_system(&system, RestraintParams::default());
        let mut sites: Vec<_> = system
            .sites_cart()
            .iter()
            .enumerate()
            .map(|(i, p)| p + Vector3::new(0.03 * (i as f64).sin(), -0.02 * (i as f64), 0.05))
            .collect();
        sites[7] = sites[3] + Vector3::new(1.9, 0.3, 0.2);
        let analytic = manager.evaluate(&sites).gradients;

        let h = 1e-6;
        for atom in 0..sites.len() {
            for axis in 0..3 {
                sites[atom][axis] += h;
                let plus = manager.evaluate(&sites).energy.total();
                sites[atom][axis] -= 2.0 * h;
                let minus = manager.evaluate(&sites).energy.total();
                sites[atom][axis] += h;
                let numeric = (plus - minus) / (2.0 * h);
                assert!(
                    (numeric - analytic[atom][axis]).abs() < 1e-3 * (1.0 + numeric.abs()),
                    "atom {} axis {}: {} vs {}",
                    atom,
                    axis,
                    analytic[atom][axis],
                    numeric
                );
            }
        }
    }
}
