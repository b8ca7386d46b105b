use super::cell::UnitCell;
use super::error::XtalError;

pub type MillerIndex = [i32; 3];

/// Whether `index` lies in the Friedel half-sphere used to store a P1 set
/// without its centrosymmetric mates.
fn in_friedel_half(index: MillerIndex) -> bool {
    let [h, k, l] = index;
    h > 0 || (h == 0 && k > 0) || (h == 0 && k == 0 && l > 0)
}

/// All Miller indices with `d >= d_min`, one of each Friedel pair.
///
/// Indices are returned in `(h, k, l)` lexicographic order, which keeps the
/// output stable between the model and map sides of a correlation.
///
/// # Errors
///
/// Returns [`XtalError::InvalidResolution`] for a non-positive `d_min` and
/// [`XtalError::NoReflections`] if the sphere contains no index.
pub fn generate_half_sphere(cell: &UnitCell, d_min: f64) -> Result<Vec<MillerIndex>, XtalError> {
    if !(d_min.is_finite() && d_min > 0.0) {
        return Err(XtalError::InvalidResolution(d_min));
    }
    let limit = 1.0 / (d_min * d_min) * (1.0 + 1e-9);
    let params = cell.parameters();
    let max = |axis: usize| (params[axis] / d_min).floor() as i32;
    let (h_max, k_max, l_max) = (max(0), max(1), max(2));

    let mut indices = Vec::new();
    for h in 0..=h_max {
        for k in -k_max..=k_max {
            for l in -l_max..=l_max {
                let index = [h, k, l];
                if in_friedel_half(index) && cell.d_star_sq(index) <= limit {
                    indices.push(index);
                }
            }
        }
    }

    if indices.is_empty() {
        return Err(XtalError::NoReflections { d_min });
    }
    Ok(indices)
}
