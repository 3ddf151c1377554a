//! Scenario tests for the construction layer: interpolation, fitting and
//! conic builders.

use approx::assert_relative_eq;
use knotwork::math::{Point3, Vector3};
use knotwork::nurbs::knot::chord_parameterization;
use knotwork::NurbsCurve;
use std::f64::consts::PI;

fn sample_points() -> Vec<Point3> {
    vec![
        Point3::new(0.0, 0.0, 0.0),
        Point3::new(1.0, 2.0, 0.0),
        Point3::new(3.0, 3.0, 0.0),
        Point3::new(4.0, 0.0, 0.0),
        Point3::new(5.0, -2.0, 0.0),
    ]
}

#[test]
fn global_interpolation_scenario() {
    let points = sample_points();
    let curve = NurbsCurve::global_interpolation(&points, 3).unwrap();

    assert_eq!(curve.degree, 3);
    assert_eq!(curve.num_control_points(), 5);

    let uk = chord_parameterization(&points);
    for (q, &u) in points.iter().zip(&uk) {
        let p = curve.point(u).unwrap();
        assert!(
            (p - q).norm() < 1e-10,
            "Interpolant misses {q:?}: got {p:?} at u={u}"
        );
    }

    // Unit weights on every control point.
    for i in 0..curve.num_control_points() {
        assert_relative_eq!(curve.weight(i), 1.0, epsilon = 1e-14);
    }
}

#[test]
fn interpolation_with_tangents_matches_directions() {
    let points = sample_points();
    let start_dir = Vector3::new(0.0, 1.0, 0.0);
    let end_dir = Vector3::new(1.0, 0.0, 0.0);
    let curve = NurbsCurve::global_interpolation_with_tangents(
        &points,
        &[start_dir, end_dir],
        &[0, 4],
        3,
    )
    .unwrap();

    let uk = chord_parameterization(&points);
    for (q, &u) in points.iter().zip(&uk) {
        assert!((curve.point(u).unwrap() - q).norm() < 1e-9);
    }

    let d0 = curve.derivative(0.0).unwrap().normalize();
    let d1 = curve.derivative(1.0).unwrap().normalize();
    assert!((d0 - start_dir).norm() < 1e-9);
    assert!((d1 - end_dir).norm() < 1e-9);
}

#[test]
fn local_cubic_interpolation_scenario() {
    let points = sample_points();
    let curve = NurbsCurve::local_cubic_interpolation(&points).unwrap();

    assert_eq!(curve.degree, 3);
    assert_eq!(curve.num_control_points(), 10);

    // The curve interpolates at the doubled interior knots and the ends.
    let breaks = knotwork::nurbs::knot::distinct_knots(&curve.knots);
    for (q, &u) in points.iter().zip(&breaks) {
        assert!((curve.point(u).unwrap() - q).norm() < 1e-10);
    }
}

#[test]
fn least_squares_approximates_dense_samples() {
    let points: Vec<Point3> = (0..=30)
        .map(|i| {
            let t = i as f64 / 30.0 * 2.0 * PI;
            Point3::new(t, t.sin(), 0.0)
        })
        .collect();

    let curve = NurbsCurve::least_squares_fit(&points, 3, 9).unwrap();
    assert_eq!(curve.num_control_points(), 9);

    // End points are reproduced exactly, the rest within a loose band.
    assert!((curve.point(0.0).unwrap() - points[0]).norm() < 1e-12);
    assert!((curve.point(1.0).unwrap() - points[30]).norm() < 1e-12);

    let uk = chord_parameterization(&points);
    for (q, &u) in points.iter().zip(&uk) {
        assert!((curve.point(u).unwrap() - q).norm() < 0.05);
    }
}

#[test]
fn error_bounded_approximation_respects_bound() {
    let points: Vec<Point3> = (0..=50)
        .map(|i| {
            let t = i as f64 / 50.0 * PI;
            Point3::new(3.0 * t.cos(), 3.0 * t.sin(), t * 0.3)
        })
        .collect();

    let max_error = 0.02;
    let curve = NurbsCurve::approximate_with_error_bound(&points, 3, max_error).unwrap();

    assert!(curve.num_control_points() < points.len());
    for q in &points {
        let u = curve.closest_parameter(q);
        let p = curve.point(u).unwrap();
        assert!(
            (p - q).norm() <= max_error * 1.5,
            "Deviation {} above bound at {q:?}",
            (p - q).norm()
        );
    }
}

#[test]
fn open_conic_through_shoulder() {
    // Unit-circle arc of 120 degrees around the x axis direction.
    let h = (60.0f64).to_radians();
    let start = Point3::new(h.cos(), -h.sin(), 0.0);
    let end = Point3::new(h.cos(), h.sin(), 0.0);
    let start_tangent = Vector3::new(h.sin(), h.cos(), 0.0);
    let end_tangent = Vector3::new(-h.sin(), h.cos(), 0.0);
    let shoulder = Point3::new(1.0, 0.0, 0.0);

    let curve =
        NurbsCurve::open_conic(&start, &start_tangent, &end, &end_tangent, &shoulder).unwrap();

    for i in 0..=20 {
        let u = i as f64 / 20.0;
        let p = curve.point(u).unwrap();
        assert_relative_eq!(p.coords.norm(), 1.0, epsilon = 1e-12);
    }
    assert!((curve.point(0.5).unwrap() - shoulder).norm() < 1e-12);
}

#[test]
fn ellipse_arc_scenario() {
    let curve = NurbsCurve::arc(
        &Point3::new(1.0, 0.0, 0.0),
        &Vector3::new(1.0, 0.0, 0.0),
        &Vector3::new(0.0, 1.0, 0.0),
        0.0,
        2.0 * PI,
        3.0,
        1.5,
    )
    .unwrap();

    assert!(curve.is_closed());
    for i in 0..=60 {
        let u = i as f64 / 60.0;
        let p = curve.point(u).unwrap();
        let implicit = ((p.x - 1.0) / 3.0).powi(2) + (p.y / 1.5).powi(2);
        assert_relative_eq!(implicit, 1.0, epsilon = 1e-12);
    }
}
