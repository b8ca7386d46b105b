use super::ids::ResidueId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chain {
    pub id: String,                      // Chain identifier (e.g., "A"; mmCIF allows longer ids)
    pub(crate) residues: Vec<ResidueId>, // Ordered list of residue IDs belonging to this chain
}

impl Chain {
    pub(crate) fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            residues: Vec::new(),
        }
    }

    pub fn residues(&self) -> &[ResidueId] {
        &self.residues
    }
}
