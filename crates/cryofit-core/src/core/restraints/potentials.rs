use nalgebra::{Point3, Vector3};

/// Harmonic distance restraint `((d - ideal) / sigma)^2`.
///
/// Returns the energy and the gradient with respect to `a` (the gradient
/// with respect to `b` is its negation).
#[inline]
pub fn harmonic_distance(
    a: &Point3<f64>,
    b: &Point3<f64>,
    ideal: f64,
    sigma: f64,
) -> (f64, Vector3<f64>) {
    let delta = a - b;
    let dist = delta.norm();
    let residual = (dist - ideal) / sigma;
    let energy = residual * residual;
    if dist < 1e-9 {
        return (energy, Vector3::zeros());
    }
    let grad = delta * (2.0 * residual / (sigma * dist));
    (energy, grad)
}

/// One-sided repulsion `((d_min - d) / sigma)^2` for `d < d_min`, zero beyond.
#[inline]
pub fn repulsion(
    a: &Point3<f64>,
    b: &Point3<f64>,
    d_min: f64,
    sigma: f64,
) -> (f64, Vector3<f64>) {
    let delta = a - b;
    let dist = delta.norm();
    if dist >= d_min || dist < 1e-9 {
        return (0.0, Vector3::zeros());
    }
    let residual = (d_min - dist) / sigma;
    let grad = delta * (-2.0 * residual / (sigma * dist));
    (residual * residual, grad)
}

/// Angle at `j` between `i` and `k`, in degrees.
#[inline]
pub fn angle_degrees(i: &Point3<f64>, j: &Point3<f64>, k: &Point3<f64>) -> f64 {
    let u = i - j;
    let v = k - j;
    let cos = (u.dot(&v) / (u.norm() * v.norm())).clamp(-1.0, 1.0);
    cos.acos().to_degrees()
}

/// Harmonic angle restraint `((theta - ideal) / sigma)^2` with angles in
/// degrees. Returns the energy and gradients for `i`, `j`, `k`.
///
/// Near-linear or degenerate geometries get a zero gradient.
#[inline]
pub fn harmonic_angle(
    i: &Point3<f64>,
    j: &Point3<f64>,
    k: &Point3<f64>,
    ideal_degrees: f64,
    sigma_degrees: f64,
) -> (f64, [Vector3<f64>; 3]) {
    let zero = [Vector3::zeros(); 3];
    let u = i - j;
    let v = k - j;
    let (lu, lv) = (u.norm(), v.norm());
    if lu < 1e-9 || lv < 1e-9 {
        return (0.0, zero);
    }
    let (uh, vh) = (u / lu, v / lv);
    let cos = uh.dot(&vh).clamp(-1.0, 1.0);
    let theta = cos.acos().to_degrees();
    let residual = (theta - ideal_degrees) / sigma_degrees;
    let energy = residual * residual;

    let sin = (1.0 - cos * cos).sqrt();
    if sin < 1e-8 {
        return (energy, zero);
    }
    // dE/dtheta in radians.
    let de_dtheta = 2.0 * residual / sigma_degrees * 180.0 / std::f64::consts::PI;
    let dcos_di = (vh - uh * cos) / lu;
    let dcos_dk = (uh - vh * cos) / lv;
    let gi = dcos_di * (-de_dtheta / sin);
    let gk = dcos_dk * (-de_dtheta / sin);
    (energy, [gi, -(gi + gk), gk])
}
