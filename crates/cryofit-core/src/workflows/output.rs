use super::error::{FitError, FitIoError};
use crate::core::io::atomic::{commit_all, stage};
use crate::core::io::pdb::PdbFile;
use crate::core::io::traits::MolecularFile;
use crate::core::models::system::MolecularSystem;
use crate::engine::trajectory::Trajectory;
use std::path::{Path, PathBuf};
use tracing::info;

pub const ENSEMBLE_FILE_NAME: &str = "all_states.pdb";
pub const REFINED_FILE_NAME: &str = "refined.pdb";

#[derive(Debug, Clone, PartialEq)]
pub struct OutputPaths {
    pub ensemble: PathBuf,
    pub refined: PathBuf,
}

/// Writes every trajectory state as a multi-model ensemble, and the refined
/// model, into `dir`.
///
/// Both files are staged first and only then renamed into place; if either
/// step fails, neither file is left behind.
pub fn write_outputs(
    system: &MolecularSystem,
    trajectory: &Trajectory,
    dir: &Path,
) -> Result<OutputPaths, FitError> {
    let paths = OutputPaths {
        ensemble: dir.join(ENSEMBLE_FILE_NAME),
        refined: dir.join(REFINED_FILE_NAME),
    };

    let ensemble = stage(&paths.ensemble, |mut writer| {
        PdbFile::write_ensemble(system, trajectory.states(), &mut writer)
    })
    .map_err(|source| FitIoError::ModelWrite {
        path: paths.ensemble.clone(),
        source,
    })?;
    let refined = stage(&paths.refined, |mut writer| {
        PdbFile::write_system_to(system, &mut writer)
    })
    .map_err(|source| FitIoError::ModelWrite {
        path: paths.refined.clone(),
        source,
    })?;

    commit_all(vec![ensemble, refined]).map_err(|e| FitIoError::ModelWrite {
        path: e.path,
        source: e.source.into(),
    })?;
    info!(
        ensemble = %paths.ensemble.display(),
        refined = %paths.refined.display(),
        states = trajectory.state_count(),
        "Outputs written"
    );

    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::atom::Atom;
    use nalgebra::Point3;
    use std::fs::File;
    use std::io::BufReader;
    use tempfile::tempdir;

    #[test]
    fn ensemble_keeps_trajectory_order() {
        let mut system = MolecularSystem::new();
        let chain = system.add_chain("A");
        let residue = system.add_residue(chain, 1, ' ', "GLY").unwrap();
        system
            .add_atom_to_residue(residue, Atom::new(" CA ", residue, Point3::new(1.0, 2.0, 3.0)))
            .unwrap();

        let mut trajectory = Trajectory::new(system.sites_cart());
        trajectory.push(vec![Point3::new(1.5, 2.0, 3.0)]);
        trajectory.push(vec![Point3::new(2.0, 2.0, 3.0)]);
        system.set_sites_cart(vec![Point3::new(2.0, 2.0, 3.0)]).unwrap();

        let dir = tempdir().unwrap();
        let paths = write_outputs(&system, &trajectory, dir.path()).unwrap();

        let mut reader = BufReader::new(File::open(&paths.ensemble).unwrap());
        let models = PdbFile::read_model_coordinates(&mut reader).unwrap();
        assert_eq!(models.len(), 3);
        assert_eq!(models[0][0], Point3::new(1.0, 2.0, 3.0));
        assert_eq!(models[2][0], Point3::new(2.0, 2.0, 3.0));

        let (refined, _) = PdbFile::read_from_path(&paths.refined).unwrap();
        assert_eq!(refined.sites_cart(), vec![Point3::new(2.0, 2.0, 3.0)]);
    }

    #[test]
    fn failure_to_place_the_refined_model_leaves_no_ensemble() {
        let mut system = MolecularSystem::new();
        let chain = system.add_chain("A");
        let residue = system.add_residue(chain, 1, ' ', "GLY").unwrap();
        system
            .add_atom_to_residue(residue, Atom::new(" CA ", residue, Point3::new(1.0, 2.0, 3.0)))
            .unwrap();
        let trajectory = Trajectory::new(system.sites_cart());

        let dir = tempdir().unwrap();
        let occupied = dir.path().join(REFINED_FILE_NAME);
        std::fs::create_dir(&occupied).unwrap();
        std::fs::write(occupied.join("placeholder"), "x").unwrap();

        let err = write_outputs(&system, &trajectory, dir.path()).unwrap_err();

        assert!(matches!(err, FitError::Io(FitIoError::ModelWrite { .. })));
        assert!(!dir.path().join(ENSEMBLE_FILE_NAME).exists());
        assert!(occupied.is_dir());
    }
}
