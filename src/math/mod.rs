//! Linear algebra type aliases, geometric tolerances, and small numeric
//! helpers shared by the curve kernel.

pub mod intersect;

pub type Point3 = nalgebra::Point3<f64>;
pub type Vector3 = nalgebra::Vector3<f64>;
pub type Vector4 = nalgebra::Vector4<f64>;
pub type Matrix4 = nalgebra::Matrix4<f64>;

/// Geometric tolerance for point coincidence tests (distance in model units).
pub const TOLERANCE: f64 = 1e-9;

/// Parametric tolerance for knot and parameter comparisons.
pub const PARAM_TOL: f64 = 1e-12;

/// Angular tolerance (radians) for tangent/normal comparisons.
pub const ANGLE_TOL: f64 = 1e-6;

/// Tolerance-aware scalar equality.
pub fn almost_equal(a: f64, b: f64, tol: f64) -> bool {
    (a - b).abs() < tol
}

/// `n!` as a float. Exact for every order the kernel uses (n ≤ 20).
pub fn factorial(n: usize) -> f64 {
    (1..=n).fold(1.0, |acc, i| acc * i as f64)
}

/// Binomial coefficient `C(n, k)` via the multiplicative formula, which
/// stays exact in f64 far longer than the factorial quotient.
pub fn binomial(n: usize, k: usize) -> f64 {
    if k > n {
        return 0.0;
    }
    let k = k.min(n - k);
    let mut result = 1.0;
    for i in 0..k {
        result = result * (n - i) as f64 / (i + 1) as f64;
    }
    result
}
