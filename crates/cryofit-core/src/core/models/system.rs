use super::atom::Atom;
use super::chain::Chain;
use super::ids::{AtomId, ChainId, ResidueId};
use super::residue::Residue;
use crate::core::xtal::cell::CrystalSymmetry;
use nalgebra::Point3;
use slotmap::SlotMap;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModelError {
    #[error("Coordinate count mismatch: model has {expected} atoms, got {found} sites")]
    SiteCountMismatch { expected: usize, found: usize },
}

/// Represents a complete atomic model: chains, residues, atoms and the
/// crystal symmetry read from the source file.
///
/// Atoms are stored in a slot map for stable IDs, and an explicit insertion
/// order is kept so that coordinate vectors produced by [`sites_cart`]
/// and consumed by [`set_sites_cart`] have a well-defined layout.
///
/// [`sites_cart`]: MolecularSystem::sites_cart
/// [`set_sites_cart`]: MolecularSystem::set_sites_cart
#[derive(Debug, Clone, Default)]
pub struct MolecularSystem {
    /// Primary storage for atoms.
    atoms: SlotMap<AtomId, Atom>,
    /// Primary storage for residues.
    residues: SlotMap<ResidueId, Residue>,
    /// Primary storage for chains.
    chains: SlotMap<ChainId, Chain>,
    /// Atom IDs in file order.
    atom_order: Vec<AtomId>,
    /// Chain IDs in file order.
    chain_order: Vec<ChainId>,
    /// Lookup map for residues by chain, sequence number and insertion code.
    residue_id_map: HashMap<(ChainId, isize, char), ResidueId>,
    /// Lookup map for chains by their identifier.
    chain_id_map: HashMap<String, ChainId>,
    /// Unit cell and space group from `CRYST1` or the mmCIF `_cell` category.
    crystal_symmetry: Option<CrystalSymmetry>,
}

impl MolecularSystem {
    /// Creates a new, empty molecular system.
    pub fn new() -> Self {
        Self::default()
    }

    /// Retrieves an immutable reference to an atom by its ID.
    pub fn atom(&self, id: AtomId) -> Option<&Atom> {
        self.atoms.get(id)
    }

    /// Retrieves a mutable reference to an atom by its ID.
    pub fn atom_mut(&mut self, id: AtomId) -> Option<&mut Atom> {
        self.atoms.get_mut(id)
    }

    /// Returns an iterator over all atoms in file order.
    pub fn atoms_iter(&self) -> impl Iterator<Item = (AtomId, &Atom)> {
        self.atom_order.iter().map(|&id| (id, &self.atoms[id]))
    }

    /// Number of atoms in the model.
    pub fn atom_count(&self) -> usize {
        self.atom_order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atom_order.is_empty()
    }

    /// Retrieves an immutable reference to a residue by its ID.
    pub fn residue(&self, id: ResidueId) -> Option<&Residue> {
        self.residues.get(id)
    }

    /// Returns an iterator over all residues.
    pub fn residues_iter(&self) -> impl Iterator<Item = (ResidueId, &Residue)> {
        self.residues.iter()
    }

    /// Retrieves an immutable reference to a chain by its ID.
    pub fn chain(&self, id: ChainId) -> Option<&Chain> {
        self.chains.get(id)
    }

    /// Returns an iterator over all chains in file order.
    pub fn chains_iter(&self) -> impl Iterator<Item = (ChainId, &Chain)> {
        self.chain_order.iter().map(|&id| (id, &self.chains[id]))
    }

    /// Finds a chain ID by its identifier.
    pub fn find_chain_by_id(&self, id: &str) -> Option<ChainId> {
        self.chain_id_map.get(id).copied()
    }

    /// Finds a residue by its chain, sequence number and insertion code.
    pub fn find_residue(
        &self,
        chain_id: ChainId,
        residue_number: isize,
        insertion_code: char,
    ) -> Option<ResidueId> {
        self.residue_id_map
            .get(&(chain_id, residue_number, insertion_code))
            .copied()
    }

    /// Adds a new chain to the system or returns the existing one.
    pub fn add_chain(&mut self, id: &str) -> ChainId {
        if let Some(&existing) = self.chain_id_map.get(id) {
            return existing;
        }
        let chain_id = self.chains.insert(Chain::new(id));
        self.chain_order.push(chain_id);
        self.chain_id_map.insert(id.to_string(), chain_id);
        chain_id
    }

    /// Adds a new residue to a chain or returns the existing one.
    ///
    /// Returns `None` if the chain does not exist.
    pub fn add_residue(
        &mut self,
        chain_id: ChainId,
        residue_number: isize,
        insertion_code: char,
        name: &str,
    ) -> Option<ResidueId> {
        let chain = self.chains.get_mut(chain_id)?;
        let key = (chain_id, residue_number, insertion_code);

        let residue_id = *self.residue_id_map.entry(key).or_insert_with(|| {
            let residue = Residue::new(residue_number, insertion_code, name, chain_id);
            self.residues.insert(residue)
        });

        if !chain.residues.contains(&residue_id) {
            chain.residues.push(residue_id);
        }

        Some(residue_id)
    }

    /// Adds an atom to a specific residue.
    ///
    /// Returns `None` if the residue does not exist.
    pub fn add_atom_to_residue(&mut self, residue_id: ResidueId, atom: Atom) -> Option<AtomId> {
        if !self.residues.contains_key(residue_id) {
            return None;
        }
        let name = atom.name.clone();
        let atom_id = self.atoms.insert(Atom { residue_id, ..atom });
        self.atom_order.push(atom_id);
        self.residues[residue_id].add_atom(&name, atom_id);
        Some(atom_id)
    }

    pub fn crystal_symmetry(&self) -> Option<&CrystalSymmetry> {
        self.crystal_symmetry.as_ref()
    }

    pub fn set_crystal_symmetry(&mut self, symmetry: Option<CrystalSymmetry>) {
        self.crystal_symmetry = symmetry;
    }

    /// Cartesian coordinates of all atoms in file order.
    pub fn sites_cart(&self) -> Vec<Point3<f64>> {
        self.atom_order
            .iter()
            .map(|&id| self.atoms[id].position)
            .collect()
    }

    /// Replaces all coordinates at once.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::SiteCountMismatch`] if `sites` does not have one
    /// entry per atom; the model is left untouched in that case.
    pub fn set_sites_cart(&mut self, sites: Vec<Point3<f64>>) -> Result<(), ModelError> {
        if sites.len() != self.atom_order.len() {
            return Err(ModelError::SiteCountMismatch {
                expected: self.atom_order.len(),
                found: sites.len(),
            });
        }
        for (&id, site) in self.atom_order.iter().zip(sites) {
            self.atoms[id].position = site;
        }
        Ok(())
    }

    /// Per-atom masses in file order.
    pub fn masses(&self) -> Vec<f64> {
        self.atoms_iter().map(|(_, atom)| atom.mass()).collect()
    }

    /// The chain and residue an atom belongs to.
    pub fn atom_context(&self, id: AtomId) -> Option<(&Chain, &Residue)> {
        let residue = self.residues.get(self.atoms.get(id)?.residue_id)?;
        let chain = self.chains.get(residue.chain_id)?;
        Some((chain, residue))
    }
}
