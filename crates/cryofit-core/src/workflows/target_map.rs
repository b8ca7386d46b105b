use super::error::{FitError, FitIoError};
use crate::core::io::ccp4::Ccp4File;
use crate::core::models::system::MolecularSystem;
use crate::core::xtal::cell::CrystalSymmetry;
use crate::core::xtal::error::XtalError;
use crate::core::xtal::grid::{DEFAULT_RESOLUTION_FACTOR, gridding_for};
use crate::core::xtal::map::TargetMap;
use crate::core::xtal::structure_factors::{ScatteringModel, f_calc, fft_map};
use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};

/// File name of a map synthesized from the model.
pub const SYNTHESIZED_MAP_FILE_NAME: &str = "map_from_model.ccp4";

/// Padding of the P1 box placed around models without a usable cell.
pub const MODEL_BOX_PADDING: f64 = 5.0;

#[derive(Debug, Clone, PartialEq)]
pub enum MapSource {
    Supplied(PathBuf),
    Synthesized(PathBuf),
}

pub struct ProvidedMap {
    pub map: TargetMap,
    pub source: MapSource,
}

/// The model's own crystal symmetry, or a padded P1 box when the model has
/// none or only a placeholder cell.
pub fn model_symmetry(system: &MolecularSystem) -> Result<CrystalSymmetry, XtalError> {
    match system.crystal_symmetry() {
        Some(symmetry) if !symmetry.unit_cell.is_placeholder() => Ok(symmetry.clone()),
        _ => {
            let symmetry =
                CrystalSymmetry::p1_box_around(&system.sites_cart(), MODEL_BOX_PADDING)?;
            info!(
                cell = ?symmetry.unit_cell.parameters(),
                "Model has no usable unit cell; using a P1 box around it"
            );
            Ok(symmetry)
        }
    }
}

/// Computes a sigma-scaled model map at `resolution`.
#[instrument(skip_all, name = "map_synthesis")]
pub fn synthesize_map(system: &MolecularSystem, resolution: f64) -> Result<TargetMap, XtalError> {
    let symmetry = model_symmetry(system)?;
    let model = ScatteringModel::from_system(system, &symmetry.unit_cell);
    let coefficients = f_calc(&model, resolution)?;
    let dims = gridding_for(&symmetry.unit_cell, resolution, DEFAULT_RESOLUTION_FACTOR);
    let grid = fft_map(&coefficients, dims)?.sigma_scaled();
    info!(
        reflections = coefficients.len(),
        grid = ?dims,
        resolution,
        "Synthesized map from model"
    );
    Ok(TargetMap::new(grid, symmetry))
}

pub fn read_target_map(path: &Path) -> Result<TargetMap, FitError> {
    let map = Ccp4File::read_from_path(path).map_err(|source| FitIoError::MapRead {
        path: path.to_path_buf(),
        source,
    })?;
    info!(
        path = %path.display(),
        grid = ?map.grid().dims(),
        space_group = %map.symmetry().space_group,
        "Map read"
    );
    Ok(map)
}

/// Reads the supplied map, or synthesizes one from `system` and writes it to
/// [`SYNTHESIZED_MAP_FILE_NAME`] in `work_dir` before returning.
pub fn provide_target_map(
    supplied: Option<&Path>,
    system: &MolecularSystem,
    resolution: f64,
    work_dir: &Path,
) -> Result<ProvidedMap, FitError> {
    if let Some(path) = supplied {
        return Ok(ProvidedMap {
            map: read_target_map(path)?,
            source: MapSource::Supplied(path.to_path_buf()),
        });
    }

    warn!("No map supplied; synthesizing one from the model");
    let map = synthesize_map(system, resolution)?;
    let path = work_dir.join(SYNTHESIZED_MAP_FILE_NAME);
    Ccp4File::write_to_path(&map, &path).map_err(|source| FitIoError::MapWrite {
        path: path.clone(),
        source,
    })?;
    info!(path = %path.display(), "Synthesized map written");
    Ok(ProvidedMap {
        map,
        source: MapSource::Synthesized(path),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::atom::Atom;
    use crate::core::xtal::cell::UnitCell;
    use nalgebra::Point3;
    use tempfile::tempdir;

    fn alanine_ca() -> MolecularSystem {
        let mut system = MolecularSystem::new();
        let chain = system.add_chain("A");
        let residue = system.add_residue(chain, 1, ' ', "ALA").unwrap();
        for (name, [x, y, z]) in [
            (" N  ", [1.0, 1.0, 1.0]),
            (" CA ", [2.458, 1.0, 1.0]),
            (" C  ", [3.009, 2.42, 1.0]),
        ] {
            system
                .add_atom_to_residue(residue, Atom::new(name, residue, Point3::new(x, y, z)))
                .unwrap();
        }
        system
    }

    #[test]
    fn models_without_a_cell_get_a_padded_box() {
        let system = alanine_ca();
        let symmetry = model_symmetry(&system).unwrap();
        let [a, b, c, alpha, _, _] = symmetry.unit_cell.parameters();
        assert!(a >= 2.0 * MODEL_BOX_PADDING);
        assert!(b >= 2.0 * MODEL_BOX_PADDING);
        assert!(c >= 2.0 * MODEL_BOX_PADDING);
        assert_eq!(alpha, 90.0);
    }

    #[test]
    fn a_real_cell_is_kept() {
        let mut system = alanine_ca();
        let cell = UnitCell::new([30.0, 40.0, 50.0, 90.0, 90.0, 90.0]).unwrap();
        system.set_crystal_symmetry(Some(CrystalSymmetry::new(cell.clone(), "P 1")));
        assert_eq!(model_symmetry(&system).unwrap().unit_cell, cell);
    }

    #[test]
    fn synthesized_map_is_sigma_scaled() {
        let map = synthesize_map(&alanine_ca(), 3.0).unwrap();
        assert!(map.grid().mean().abs() < 1e-9);
        assert!((map.grid().standard_deviation() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn missing_map_is_synthesized_and_written() {
        let dir = tempdir().unwrap();
        let provided = provide_target_map(None, &alanine_ca(), 3.0, dir.path()).unwrap();
        let expected = dir.path().join(SYNTHESIZED_MAP_FILE_NAME);
        assert_eq!(provided.source, MapSource::Synthesized(expected.clone()));

        let reread = Ccp4File::read_from_path(&expected).unwrap();
        assert_eq!(reread.grid().dims(), provided.map.grid().dims());
    }

    #[test]
    fn unreadable_map_is_an_io_error() {
        let dir = tempdir().unwrap();
        let err = provide_target_map(
            Some(&dir.path().join("absent.ccp4")),
            &alanine_ca(),
            3.0,
            dir.path(),
        )
        .err()
        .unwrap();
        assert!(matches!(err, FitError::Io(FitIoError::MapRead { .. })));
    }
}
