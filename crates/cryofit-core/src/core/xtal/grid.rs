use super::cell::UnitCell;
use super::error::XtalError;
use nalgebra::Vector3;

/// Default ratio between grid spacing and resolution used for FFT maps.
pub const DEFAULT_RESOLUTION_FACTOR: f64 = 1.0 / 3.0;

/// A real-space scalar grid covering one full unit cell.
///
/// Data is stored with x varying fastest: `data[x + nx * (y + ny * z)]`.
/// Grid point `(x, y, z)` sits at fractional coordinate
/// `(x / nx, y / ny, z / nz)`, and indices wrap periodically.
#[derive(Debug, Clone, PartialEq)]
pub struct DensityGrid {
    dims: [usize; 3],
    data: Vec<f64>,
}

impl DensityGrid {
    /// Creates a zero-filled grid.
    pub fn zeros(dims: [usize; 3]) -> Result<Self, XtalError> {
        Self::from_data(dims, vec![0.0; dims.iter().product()])
    }

    /// Wraps existing data.
    ///
    /// # Errors
    ///
    /// Returns [`XtalError::InvalidGrid`] if any dimension is zero or the data
    /// length does not match the dimensions.
    pub fn from_data(dims: [usize; 3], data: Vec<f64>) -> Result<Self, XtalError> {
        if dims.iter().any(|&n| n == 0) {
            return Err(XtalError::InvalidGrid(format!(
                "dimensions must be positive, got {:?}",
                dims
            )));
        }
        let expected: usize = dims.iter().product();
        if data.len() != expected {
            return Err(XtalError::InvalidGrid(format!(
                "expected {} values for dimensions {:?}, got {}",
                expected,
                dims,
                data.len()
            )));
        }
        Ok(Self { dims, data })
    }

    pub fn dims(&self) -> [usize; 3] {
        self.dims
    }

    pub fn data(&self) -> &[f64] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn index(&self, x: usize, y: usize, z: usize) -> usize {
        x + self.dims[0] * (y + self.dims[1] * z)
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize, z: usize) -> f64 {
        self.data[self.index(x, y, z)]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, z: usize, value: f64) {
        let idx = self.index(x, y, z);
        self.data[idx] = value;
    }

    /// Value at integer grid coordinates with periodic wrapping.
    #[inline]
    pub fn get_periodic(&self, x: i64, y: i64, z: i64) -> f64 {
        let wrap = |v: i64, n: usize| v.rem_euclid(n as i64) as usize;
        self.get(
            wrap(x, self.dims[0]),
            wrap(y, self.dims[1]),
            wrap(z, self.dims[2]),
        )
    }

    pub fn mean(&self) -> f64 {
        self.data.iter().sum::<f64>() / self.data.len() as f64
    }

    /// Population standard deviation of all grid values.
    pub fn standard_deviation(&self) -> f64 {
        let mean = self.mean();
        let variance =
            self.data.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / self.data.len() as f64;
        variance.sqrt()
    }

    /// Returns `(rho - mean) / sigma`. A flat grid becomes all zeros.
    pub fn sigma_scaled(&self) -> DensityGrid {
        let mean = self.mean();
        let sigma = self.standard_deviation();
        let data = if sigma > 0.0 {
            self.data.iter().map(|v| (v - mean) / sigma).collect()
        } else {
            vec![0.0; self.data.len()]
        };
        DensityGrid {
            dims: self.dims,
            data,
        }
    }

    /// Periodic trilinear interpolation at a fractional coordinate.
    ///
    /// Returns the value and its gradient with respect to the fractional
    /// coordinate.
    pub fn interpolate(&self, frac: &Vector3<f64>) -> (f64, Vector3<f64>) {
        let n = [
            self.dims[0] as f64,
            self.dims[1] as f64,
            self.dims[2] as f64,
        ];
        let u = [frac.x * n[0], frac.y * n[1], frac.z * n[2]];
        let base = [u[0].floor(), u[1].floor(), u[2].floor()];
        let t = [u[0] - base[0], u[1] - base[1], u[2] - base[2]];
        let base = [base[0] as i64, base[1] as i64, base[2] as i64];

        let mut value = 0.0;
        let mut grad = Vector3::zeros();
        for corner in 0..8usize {
            let offset = [corner & 1, (corner >> 1) & 1, (corner >> 2) & 1];
            let c = self.get_periodic(
                base[0] + offset[0] as i64,
                base[1] + offset[1] as i64,
                base[2] + offset[2] as i64,
            );
            let weight = |axis: usize| {
                if offset[axis] == 1 {
                    (t[axis], 1.0)
                } else {
                    (1.0 - t[axis], -1.0)
                }
            };
            let [(wx, dwx), (wy, dwy), (wz, dwz)] = [weight(0), weight(1), weight(2)];

            value += c * wx * wy * wz;
            grad.x += c * dwx * wy * wz * n[0];
            grad.y += c * wx * dwy * wz * n[1];
            grad.z += c * wx * wy * dwz * n[2];
        }
        (value, grad)
    }
}

/// Smallest even integer `>= min` whose only prime factors are 2, 3 and 5.
pub fn fft_friendly_size(min: usize) -> usize {
    let mut n = min.max(2);
    loop {
        if n % 2 == 0 {
            let mut rest = n;
            for p in [2, 3, 5] {
                while rest % p == 0 {
                    rest /= p;
                }
            }
            if rest == 1 {
                return n;
            }
        }
        n += 1;
    }
}

/// Grid dimensions that sample a cell at `d_min * resolution_factor` spacing
/// and can hold every Miller index with `d >= d_min`.
pub fn gridding_for(cell: &UnitCell, d_min: f64, resolution_factor: f64) -> [usize; 3] {
    let step = d_min * resolution_factor;
    let params = cell.parameters();
    let mut dims = [0usize; 3];
    for axis in 0..3 {
        let length = params[axis];
        let by_spacing = (length / step).ceil() as usize;
        let h_max = (length / d_min).floor() as usize;
        dims[axis] = fft_friendly_size(by_spacing.max(2 * h_max + 1));
    }
    dims
}
