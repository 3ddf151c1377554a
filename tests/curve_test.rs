//! Scenario tests for evaluation, refinement and degree manipulation.

use approx::assert_relative_eq;
use knotwork::math::{Point3, Vector3};
use knotwork::nurbs::basis::{basis_funs, bernstein, find_span};
use knotwork::nurbs::knot::distinct_knots;
use knotwork::{cartesian, NurbsCurve};
use std::f64::consts::{FRAC_1_SQRT_2, FRAC_PI_2, PI};

fn quadratic_arc() -> NurbsCurve {
    NurbsCurve::from_points(
        2,
        vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0],
        vec![
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ],
        vec![1.0, 1.0, 1.0],
    )
    .unwrap()
}

fn cubic_with_interior_knot() -> NurbsCurve {
    NurbsCurve::from_points(
        3,
        vec![0.0, 0.0, 0.0, 0.0, 0.5, 1.0, 1.0, 1.0, 1.0],
        vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 2.0, 0.0),
            Point3::new(2.0, 2.0, 0.0),
            Point3::new(3.0, 0.0, 0.0),
            Point3::new(4.0, -2.0, 0.0),
        ],
        vec![1.0; 5],
    )
    .unwrap()
}

#[test]
fn evaluate_quadratic_arc_midpoint() {
    let curve = quadratic_arc();
    let p = curve.point(0.5).unwrap();
    assert_relative_eq!(p.x, 0.75, epsilon = 1e-14);
    assert_relative_eq!(p.y, 0.75, epsilon = 1e-14);
    assert_relative_eq!(p.z, 0.0, epsilon = 1e-14);
}

#[test]
fn boundary_interpolation() {
    let curve = cubic_with_interior_knot();
    let (min, max) = curve.domain();

    let start = curve.point(min).unwrap();
    let end = curve.point(max).unwrap();
    assert_relative_eq!(
        (start - curve.cartesian_control_point(0)).norm(),
        0.0,
        epsilon = 1e-13
    );
    assert_relative_eq!(
        (end - curve.cartesian_control_point(4)).norm(),
        0.0,
        epsilon = 1e-13
    );
}

#[test]
fn partition_of_unity_on_clamped_range() {
    let curve = cubic_with_interior_knot();
    let n = curve.num_control_points() - 1;
    for i in 0..=50 {
        let u = i as f64 / 50.0;
        let span = find_span(n, curve.degree, u, &curve.knots);
        let basis = basis_funs(span, u, curve.degree, &curve.knots);
        let sum: f64 = basis.iter().sum();
        assert_relative_eq!(sum, 1.0, epsilon = 1e-13);
    }
}

#[test]
fn insert_knot_scenario() {
    let curve = cubic_with_interior_knot();
    let inserted = curve.insert_knot(0.3, 1).unwrap();

    assert_eq!(
        inserted.knots,
        vec![0.0, 0.0, 0.0, 0.0, 0.3, 0.5, 1.0, 1.0, 1.0, 1.0]
    );

    for i in 0..10 {
        let u = i as f64 / 9.0;
        let a = curve.point(u).unwrap();
        let b = inserted.point(u).unwrap();
        assert!(
            (a - b).norm() < 1e-12,
            "Insertion moved the curve at u={u}: {a:?} vs {b:?}"
        );
    }
}

#[test]
fn decompose_scenario() {
    let curve = cubic_with_interior_knot();
    let segments = curve.decompose();

    assert_eq!(segments.len(), 2);
    assert_eq!(segments[0].len(), 4);
    assert_eq!(segments[1].len(), 4);

    let joint = cartesian(&segments[0][3]);
    let expected = curve.point(0.5).unwrap();
    assert!((joint - expected).norm() < 1e-12);
}

#[test]
fn decompose_reproduces_curve() {
    let curve = cubic_with_interior_knot();
    let segments = curve.decompose();
    let breaks = distinct_knots(&curve.knots);

    for (seg, w) in segments.iter().zip(breaks.windows(2)) {
        for i in 0..=8 {
            let t = i as f64 / 8.0;
            let u = w[0] + (w[1] - w[0]) * t;
            let mut sum = nalgebra::Vector4::zeros();
            for (j, cp) in seg.iter().enumerate() {
                sum += bernstein(j, curve.degree, t) * cp;
            }
            let a = cartesian(&sum);
            let b = curve.point(u).unwrap();
            assert!((a - b).norm() < 1e-12);
        }
    }
}

#[test]
fn corner_cut_agrees_with_basis_evaluation() {
    let curve = cubic_with_interior_knot();
    for i in 0..=100 {
        let u = i as f64 / 100.0;
        let a = curve.point(u).unwrap();
        let b = curve.point_corner_cut(u).unwrap();
        assert!(
            (a - b).norm() < 1e-10,
            "Evaluation paths disagree at u={u}"
        );
    }
}

#[test]
fn bulk_refinement_equals_repeated_insertion() {
    let curve = cubic_with_interior_knot();
    let xs = [0.15, 0.4, 0.4, 0.85];

    let refined = curve.refine_knots(&xs).unwrap();
    let mut repeated = curve.clone();
    for &x in &xs {
        repeated = repeated.insert_knot(x, 1).unwrap();
    }

    assert_eq!(refined.knots.len(), repeated.knots.len());
    for (a, b) in refined.knots.iter().zip(&repeated.knots) {
        assert_relative_eq!(*a, *b, epsilon = 1e-14);
    }
    for (a, b) in refined
        .control_points
        .iter()
        .zip(&repeated.control_points)
    {
        assert!((a - b).norm() < 1e-11);
    }
}

#[test]
fn insert_remove_round_trip() {
    let curve = cubic_with_interior_knot();
    let inserted = curve.insert_knot(0.7, 2).unwrap();
    let (removed, restored) = inserted.remove_knot(0.7, 2).unwrap();

    assert_eq!(removed, 2);
    assert_eq!(restored.knots.len(), curve.knots.len());
    for i in 0..=20 {
        let u = i as f64 / 20.0;
        let a = curve.point(u).unwrap();
        let b = restored.point(u).unwrap();
        assert!((a - b).norm() < 1e-9);
    }
}

#[test]
fn degree_elevation_is_geometrically_a_noop() {
    let curve = quadratic_arc();
    let elevated = curve.elevate_degree(2).unwrap();
    assert_eq!(elevated.degree, 4);

    for i in 0..=50 {
        let u = i as f64 / 50.0;
        let a = curve.point(u).unwrap();
        let b = elevated.point(u).unwrap();
        assert!((a - b).norm() < 1e-10);
    }
}

#[test]
fn arc_construction_invariants() {
    let curve = NurbsCurve::arc(
        &Point3::origin(),
        &Vector3::new(1.0, 0.0, 0.0),
        &Vector3::new(0.0, 1.0, 0.0),
        0.0,
        PI,
        1.0,
        1.0,
    )
    .unwrap();

    assert_eq!(curve.degree, 2);
    // Two 90-degree segments joined at the doubled knot 0.5.
    assert_eq!(curve.num_control_points(), 5);
    assert_eq!(distinct_knots(&curve.knots), vec![0.0, 0.5, 1.0]);

    // Middle weights are cos(45 degrees).
    assert_relative_eq!(curve.weight(1), (FRAC_PI_2 / 2.0).cos(), epsilon = 1e-14);
    assert_relative_eq!(curve.weight(1), FRAC_1_SQRT_2, epsilon = 1e-14);

    for i in 0..=40 {
        let u = i as f64 / 40.0;
        let p = curve.point(u).unwrap();
        assert_relative_eq!(p.coords.norm(), 1.0, epsilon = 1e-12);
    }
}

#[test]
fn unclamped_curve_matches_on_domain() {
    let curve = cubic_with_interior_knot();
    let unclamped = curve.unclamp();
    let (min, max) = curve.domain();

    for i in 0..=30 {
        let u = min + (max - min) * i as f64 / 30.0;
        let a = curve.point(u).unwrap();
        let b = unclamped.point(u).unwrap();
        assert!((a - b).norm() < 1e-10);
    }
}

#[test]
fn projection_fixed_point() {
    let curve = cubic_with_interior_knot();
    for i in 1..10 {
        let u0 = i as f64 / 10.0;
        let q = curve.point(u0).unwrap();
        let u1 = curve.closest_parameter(&q);
        let p = curve.point(u1).unwrap();
        assert!(
            (p - q).norm() < 1e-6,
            "Projection fixed point failed at u0={u0}: u1={u1}"
        );
    }
}

#[test]
fn projection_orthogonality() {
    let curve = quadratic_arc();
    let q = Point3::new(1.5, 1.5, 0.0);
    let u = curve.closest_parameter(&q);
    let c = curve.point(u).unwrap();
    let d = curve.derivative(u).unwrap();
    let residual = c - q;
    let cos = d.dot(&residual) / (d.norm() * residual.norm());
    assert!(cos.abs() < 1e-8, "cos={cos}");
}
