use super::ids::{AtomId, ChainId};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Residue {
    pub id: isize,                          // Residue sequence number from source file
    pub insertion_code: char,               // Insertion code, blank when absent
    pub name: String,                       // Name of the residue (e.g., "ALA", "  A")
    pub chain_id: ChainId,                  // ID of the parent chain
    pub(crate) atoms: Vec<AtomId>,          // Indices of atoms belonging to this residue
    atom_name_map: HashMap<String, AtomId>, // Map from trimmed atom name to its stable ID
}

impl Residue {
    pub(crate) fn new(id: isize, insertion_code: char, name: &str, chain_id: ChainId) -> Self {
        Self {
            id,
            insertion_code,
            name: name.to_string(),
            chain_id,
            atoms: Vec::new(),
            atom_name_map: HashMap::new(),
        }
    }

    pub(crate) fn add_atom(&mut self, atom_name: &str, atom_id: AtomId) {
        self.atoms.push(atom_id);
        self.atom_name_map
            .entry(atom_name.trim().to_string())
            .or_insert(atom_id);
    }

    pub fn atoms(&self) -> &[AtomId] {
        &self.atoms
    }

    pub fn get_atom_id_by_name(&self, name: &str) -> Option<AtomId> {
        self.atom_name_map.get(name.trim()).copied()
    }
}
