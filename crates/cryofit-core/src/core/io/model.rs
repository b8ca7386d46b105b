use super::mmcif::{CifError, CifFile};
use super::pdb::{PdbError, PdbFile};
use super::traits::MolecularFile;
use crate::core::models::system::MolecularSystem;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Atomic model formats the pipeline can read and validate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelFormat {
    Pdb,
    Cif,
}

impl ModelFormat {
    /// Format implied by a file extension (`.pdb`, `.ent`, `.cif`, `.mmcif`).
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "pdb" | "ent" => Some(Self::Pdb),
            "cif" | "mmcif" => Some(Self::Cif),
            _ => None,
        }
    }

    fn other(self) -> Self {
        match self {
            Self::Pdb => Self::Cif,
            Self::Cif => Self::Pdb,
        }
    }
}

#[derive(Debug, Error)]
pub enum ModelFileError {
    #[error("Failed to read PDB file {path}: {source}")]
    Pdb {
        path: PathBuf,
        #[source]
        source: PdbError,
    },
    #[error("Failed to read mmCIF file {path}: {source}")]
    Cif {
        path: PathBuf,
        #[source]
        source: CifError,
    },
}

/// Reads a model in the given format.
pub fn read_model_as(path: &Path, format: ModelFormat) -> Result<MolecularSystem, ModelFileError> {
    match format {
        ModelFormat::Pdb => PdbFile::read_from_path(path)
            .map(|(system, _)| system)
            .map_err(|source| ModelFileError::Pdb {
                path: path.to_path_buf(),
                source,
            }),
        ModelFormat::Cif => CifFile::read_from_path(path)
            .map(|(system, _)| system)
            .map_err(|source| ModelFileError::Cif {
                path: path.to_path_buf(),
                source,
            }),
    }
}

/// Reads a model, choosing the format from the extension and defaulting to
/// PDB.
pub fn read_model(path: &Path) -> Result<MolecularSystem, ModelFileError> {
    read_model_as(path, ModelFormat::from_path(path).unwrap_or(ModelFormat::Pdb))
}

/// Determines whether a file holds an atomic model by parsing it.
///
/// The format implied by the extension is tried first, then the other one.
/// Returns the format that yielded at least one atom.
pub fn detect_model_format(path: &Path) -> Option<ModelFormat> {
    let first = ModelFormat::from_path(path).unwrap_or(ModelFormat::Pdb);
    [first, first.other()]
        .into_iter()
        .find(|&format| read_model_as(path, format).is_ok_and(|system| !system.is_empty()))
}
