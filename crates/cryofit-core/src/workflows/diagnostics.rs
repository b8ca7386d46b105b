use crate::core::models::system::MolecularSystem;
use crate::core::xtal::error::XtalError;
use crate::core::xtal::map::TargetMap;
use crate::core::xtal::structure_factors::{
    ScatteringModel, f_calc, map_correlation, scale_factor, structure_factors_from_map,
};
use tracing::{debug, warn};

/// Correlation between the model's structure factors and those of `map` at
/// `resolution`.
///
/// The model is placed in the map's unit cell. Map coefficients are computed
/// on the model's indices (those beyond the map grid's Nyquist limit are
/// dropped) and scaled to the model before correlating. The result lies in
/// `[-1, 1]`; a map with no Fourier power on those indices yields 0.
pub fn model_map_correlation(
    system: &MolecularSystem,
    map: &TargetMap,
    resolution: f64,
) -> Result<f64, XtalError> {
    let model = ScatteringModel::from_system(system, map.unit_cell());
    let f_model = f_calc(&model, resolution)?;
    let f_map = structure_factors_from_map(map.grid(), map.unit_cell(), f_model.indices())?;
    let f_map = match scale_factor(&f_model, &f_map) {
        Some(k) => {
            debug!(scale = k, "Map coefficients scaled to model");
            f_map.scaled(k)
        }
        None => f_map,
    };
    match map_correlation(&f_model, &f_map) {
        Some(cc) => {
            debug!(cc, reflections = f_map.len(), "Model-map correlation");
            Ok(cc)
        }
        None => {
            warn!("Map has no Fourier power at the model's reflections; reporting CC = 0");
            Ok(0.0)
        }
    }
}
