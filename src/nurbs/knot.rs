//! Knot vector utilities: validation, multiplicity, generation, and the
//! parameterisations used by the fitting routines.

use crate::math::{Point3, Vector4, PARAM_TOL, TOLERANCE};

/// Find the multiplicity of knot value `u` in the knot vector.
pub fn knot_multiplicity(u: f64, knots: &[f64], tol: f64) -> usize {
    knots.iter().filter(|&&k| (k - u).abs() < tol).count()
}

/// Check if a knot vector is valid:
/// - Non-decreasing
/// - Correct length: `n_ctrl + degree + 1`
pub fn validate_knot_vector(knots: &[f64], degree: usize, n_ctrl: usize) -> bool {
    if knots.len() != n_ctrl + degree + 1 {
        return false;
    }
    for i in 1..knots.len() {
        if knots[i] < knots[i - 1] {
            return false;
        }
    }
    true
}

/// Create a uniform clamped knot vector on `[0, 1]`.
///
/// The first `degree+1` knots are 0.0, the last `degree+1` are 1.0,
/// and interior knots are uniformly spaced.
pub fn uniform_knots(degree: usize, n_ctrl: usize) -> Vec<f64> {
    assert!(n_ctrl > degree, "Need at least degree+1 control points");
    let m = n_ctrl + degree + 1;
    let mut knots = vec![0.0; m];

    for i in 0..=degree {
        knots[i] = 0.0;
        knots[m - 1 - i] = 1.0;
    }

    let n_interior = n_ctrl - degree - 1;
    for i in 1..=n_interior {
        knots[degree + i] = i as f64 / (n_interior + 1) as f64;
    }

    knots
}

/// Total polyline length of a point sequence.
pub fn total_chord_length(points: &[Point3]) -> f64 {
    points.windows(2).map(|w| (w[1] - w[0]).norm()).sum()
}

/// Chord-length parameterisation of a point sequence onto `[0, 1]`.
///
/// Coincident consecutive points contribute zero chord; a fully degenerate
/// sequence falls back to uniform spacing so downstream solvers still see
/// strictly ordered parameters.
pub fn chord_parameterization(points: &[Point3]) -> Vec<f64> {
    let n = points.len();
    let total = total_chord_length(points);
    if total < TOLERANCE {
        return (0..n).map(|i| i as f64 / (n - 1) as f64).collect();
    }

    let mut params = Vec::with_capacity(n);
    params.push(0.0);
    let mut acc = 0.0;
    for w in points.windows(2) {
        acc += (w[1] - w[0]).norm();
        params.push(acc / total);
    }
    params[n - 1] = 1.0;
    params
}

/// Clamped knot vector averaged from interpolation parameters (Eq. 9.8).
///
/// Guarantees every knot span contains at least one parameter, keeping the
/// interpolation matrix non-singular.
pub fn averaged_knots(degree: usize, params: &[f64]) -> Vec<f64> {
    let n = params.len() - 1;
    let m = n + degree + 1;
    let mut knots = vec![0.0; m + 1];

    for i in 0..=degree {
        knots[m - i] = 1.0;
    }
    for j in 1..=(n - degree) {
        let sum: f64 = params[j..j + degree].iter().sum();
        knots[j + degree] = sum / degree as f64;
    }
    knots
}

/// Clamped knot vector for least-squares fitting with fewer control points
/// than data points (Eq. 9.68/9.69).
pub fn averaged_knots_for_fit(degree: usize, ctrl_count: usize, params: &[f64]) -> Vec<f64> {
    let n = ctrl_count - 1;
    let m = n + degree + 1;
    let d = params.len() as f64 / (n - degree + 1) as f64;

    let mut knots = vec![0.0; m + 1];
    for i in 0..=degree {
        knots[m - i] = 1.0;
    }
    for j in 1..=(n - degree) {
        let i = (j as f64 * d) as usize;
        let alpha = j as f64 * d - i as f64;
        knots[degree + j] = (1.0 - alpha) * params[i - 1] + alpha * params[i];
    }
    knots
}

/// Deviation bound for knot removal and degree reduction on a weighted
/// control net.
///
/// Scales the distance tolerance by the smallest weight over `1 + max |P|`,
/// which leaves the bound invariant under uniform rescaling of the weights.
pub fn modify_tolerance(control_points: &[Vector4]) -> f64 {
    let mut min_weight = f64::MAX;
    let mut max_distance: f64 = 0.0;
    for cp in control_points {
        let w = cp.w;
        min_weight = min_weight.min(w);
        let p = crate::math::Vector3::new(cp.x / w, cp.y / w, cp.z / w);
        max_distance = max_distance.max(p.norm());
    }
    TOLERANCE * min_weight / (1.0 + max_distance)
}

/// The distinct knot values of a vector, within [`PARAM_TOL`].
pub fn distinct_knots(knots: &[f64]) -> Vec<f64> {
    let mut unique: Vec<f64> = Vec::new();
    for &u in knots {
        if unique.last().map_or(true, |&last| (u - last).abs() > PARAM_TOL) {
            unique.push(u);
        }
    }
    unique
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_clamped_cubic() {
        let knots = vec![0.0, 0.0, 0.0, 0.0, 1.0, 2.0, 3.0, 4.0, 4.0, 4.0, 4.0];
        assert!(validate_knot_vector(&knots, 3, 7));
    }

    #[test]
    fn validate_wrong_length() {
        let knots = vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];
        assert!(!validate_knot_vector(&knots, 2, 4)); // needs 7 knots
    }

    #[test]
    fn validate_decreasing() {
        let knots = vec![0.0, 0.0, 0.5, 0.3, 1.0, 1.0]; // not non-decreasing
        assert!(!validate_knot_vector(&knots, 2, 3));
    }

    #[test]
    fn uniform_knots_quadratic() {
        let knots = uniform_knots(2, 5);
        assert_eq!(knots.len(), 8); // 5 + 2 + 1
        assert_eq!(&knots[..3], &[0.0, 0.0, 0.0]);
        assert_eq!(&knots[5..], &[1.0, 1.0, 1.0]);
        assert!(validate_knot_vector(&knots, 2, 5));
    }

    #[test]
    fn uniform_knots_minimum() {
        // degree+1 control points → no interior knots
        let knots = uniform_knots(3, 4);
        assert_eq!(knots, vec![0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn multiplicity_at_ends() {
        let knots = vec![0.0, 0.0, 0.0, 0.5, 1.0, 1.0, 1.0];
        assert_eq!(knot_multiplicity(0.0, &knots, 1e-12), 3);
        assert_eq!(knot_multiplicity(1.0, &knots, 1e-12), 3);
        assert_eq!(knot_multiplicity(0.5, &knots, 1e-12), 1);
        assert_eq!(knot_multiplicity(0.3, &knots, 1e-12), 0);
    }

    #[test]
    fn chord_parameterization_proportional() {
        let points = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(3.0, 0.0, 0.0),
            Point3::new(4.0, 0.0, 0.0),
        ];
        let uk = chord_parameterization(&points);
        assert_eq!(uk[0], 0.0);
        assert!((uk[1] - 0.25).abs() < 1e-15);
        assert!((uk[2] - 0.75).abs() < 1e-15);
        assert_eq!(uk[3], 1.0);
    }

    #[test]
    fn averaged_knots_structure() {
        // 5 parameters, degree 3 → 9 knots, one interior.
        let uk = vec![0.0, 0.25, 0.5, 0.75, 1.0];
        let knots = averaged_knots(3, &uk);
        assert_eq!(knots.len(), 9);
        assert_eq!(&knots[..4], &[0.0; 4]);
        assert_eq!(&knots[5..], &[1.0; 4]);
        // Interior knot = mean of uk[1..4]
        assert!((knots[4] - 0.5).abs() < 1e-15);
        assert!(validate_knot_vector(&knots, 3, 5));
    }

    #[test]
    fn fit_knots_are_valid() {
        let uk: Vec<f64> = (0..10).map(|i| i as f64 / 9.0).collect();
        let knots = averaged_knots_for_fit(3, 6, &uk);
        assert!(validate_knot_vector(&knots, 3, 6));
        for w in knots.windows(2) {
            assert!(w[1] >= w[0]);
        }
    }

    #[test]
    fn modify_tolerance_tracks_weight_rescale() {
        // Uniformly rescaling weights scales homogeneous distances by the
        // same factor; the bound must follow so the accept/reject decision
        // is unchanged.
        let pts = vec![
            Vector4::new(0.0, 0.0, 0.0, 1.0),
            Vector4::new(2.0, 4.0, 0.0, 2.0),
            Vector4::new(3.0, 0.0, 0.0, 1.0),
        ];
        let scaled: Vec<Vector4> = pts.iter().map(|p| p * 10.0).collect();
        let t0 = modify_tolerance(&pts);
        let t1 = modify_tolerance(&scaled);
        assert!(t0 > 0.0);
        assert!((t1 - 10.0 * t0).abs() < 1e-12 * t1);
    }

    #[test]
    fn distinct_knots_collapses_multiples() {
        let knots = vec![0.0, 0.0, 0.0, 0.5, 0.5, 1.0, 1.0, 1.0];
        assert_eq!(distinct_knots(&knots), vec![0.0, 0.5, 1.0]);
    }
}
