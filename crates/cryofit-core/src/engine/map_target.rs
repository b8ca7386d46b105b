use crate::core::xtal::map::TargetMap;
use nalgebra::{Point3, Vector3};

/// The density term `E_map = -sum(rho(x_i))` with per-site gradient reuse.
///
/// A site's gradient is recomputed only once it has moved farther than
/// `shift` from where its gradient was last evaluated. A shift of zero
/// recomputes every site on every call. The energy itself is always exact.
pub struct MapTerm<'a> {
    map: &'a TargetMap,
    shift: f64,
    anchors: Vec<Point3<f64>>,
    gradients: Vec<Vector3<f64>>,
    refreshes: usize,
}

impl<'a> MapTerm<'a> {
    pub fn new(map: &'a TargetMap, shift: f64) -> Self {
        Self {
            map,
            shift,
            anchors: Vec::new(),
            gradients: Vec::new(),
            refreshes: 0,
        }
    }

    /// Total number of per-site gradient evaluations so far.
    pub fn refreshes(&self) -> usize {
        self.refreshes
    }

    pub fn evaluate(&mut self, sites: &[Point3<f64>]) -> (f64, Vec<Vector3<f64>>) {
        if self.anchors.len() != sites.len() {
            self.anchors.clear();
            self.gradients = vec![Vector3::zeros(); sites.len()];
        }
        let primed = !self.anchors.is_empty();
        let shift_sq = self.shift * self.shift;

        let mut energy = 0.0;
        for (i, site) in sites.iter().enumerate() {
            let stale = !primed
                || self.shift <= 0.0
                || (site - self.anchors[i]).norm_squared() > shift_sq;
            if stale {
                let (rho, grad) = self.map.value_and_gradient(site);
                energy -= rho;
                self.gradients[i] = -grad;
                if primed {
                    self.anchors[i] = *site;
                }
                self.refreshes += 1;
            } else {
                energy -= self.map.value_at(site);
            }
        }
        if !primed {
            self.anchors = sites.to_vec();
        }
        (energy, self.gradients.clone())
    }
}
