//! Point projection: the parameter of the closest point on the curve.
//!
//! A coarse pass projects the query point onto the chords of a uniform
//! sampling, then Newton iteration drives the tangent/residual dot product
//! to zero. Non-convergence is not an error: the best parameter found is
//! returned.

use crate::math::{Point3, ANGLE_TOL, TOLERANCE};
use crate::nurbs::NurbsCurve;

const MAX_NEWTON_ITERATIONS: usize = 10;

impl NurbsCurve {
    /// Find the parameter minimising the distance from `point` to the
    /// curve.
    ///
    /// Out-of-range Newton updates wrap around the parameter interval for
    /// closed curves and clamp for open ones.
    pub fn closest_parameter(&self, point: &Point3) -> f64 {
        let (min, max) = self.domain();

        // Coarse pass: project onto the chords of a dense sampling.
        let samples = (self.num_control_points() * self.degree).max(2);
        let step = (max - min) / (samples - 1) as f64;

        let mut best_u = min;
        let mut best_dist = f64::MAX;

        let mut u0 = min;
        let mut c0 = Point3::from(self.rational_derivs_at(u0, 0)[0]);
        for i in 1..samples {
            let u1 = if i == samples - 1 { max } else { min + step * i as f64 };
            let c1 = Point3::from(self.rational_derivs_at(u1, 0)[0]);

            let chord = c1 - c0;
            let chord_sq = chord.norm_squared();
            let t = if chord_sq > 0.0 {
                ((point - c0).dot(&chord) / chord_sq).clamp(0.0, 1.0)
            } else {
                0.0
            };
            let proj = c0 + chord * t;
            let dist = (point - proj).norm();
            if dist < best_dist {
                best_dist = dist;
                best_u = u0 + (u1 - u0) * t;
            }

            u0 = u1;
            c0 = c1;
        }

        // Newton refinement on f(u) = C'(u) · (C(u) - Q).
        let closed = self.is_closed();
        let mut u = best_u;

        for _ in 0..MAX_NEWTON_ITERATIONS {
            let ders = self.rational_derivs_at(u, 2);
            let diff = ders[0] - point.coords;
            let dist = diff.norm();
            if dist < TOLERANCE {
                break;
            }

            let f = ders[1].dot(&diff);
            let speed = ders[1].norm();
            if speed * dist > 0.0 && (f / (speed * dist)).abs() < ANGLE_TOL {
                break;
            }

            let fprime = ders[2].dot(&diff) + speed * speed;
            if fprime.abs() < f64::MIN_POSITIVE {
                break;
            }

            let mut next = u - f / fprime;
            if closed {
                if next < min {
                    next = max - (min - next);
                }
                if next > max {
                    next = min + (next - max);
                }
            } else {
                next = next.clamp(min, max);
            }

            // Negligible parameter step ends the iteration.
            if ((next - u) * speed).abs() < TOLERANCE {
                u = next;
                break;
            }
            u = next;
        }

        u
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Vector3;
    use std::f64::consts::PI;

    fn make_quarter_circle() -> NurbsCurve {
        let w = std::f64::consts::FRAC_1_SQRT_2;
        NurbsCurve::from_points(
            2,
            vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0],
            vec![
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(1.0, 1.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
            ],
            vec![1.0, w, 1.0],
        )
        .unwrap()
    }

    #[test]
    fn on_curve_point_is_a_fixed_point() {
        let curve = make_quarter_circle();
        for i in 1..10 {
            let u0 = i as f64 / 10.0;
            let q = curve.point(u0).unwrap();
            let u1 = curve.closest_parameter(&q);
            let p1 = curve.point(u1).unwrap();
            assert!(
                (p1 - q).norm() < 1e-6,
                "Projection of an on-curve point must come back to it (u0={u0}, u1={u1})"
            );
        }
    }

    #[test]
    fn residual_is_orthogonal_to_tangent() {
        let curve = make_quarter_circle();
        // A point off the curve, radially outside the arc.
        let q = Point3::new(1.2, 0.9, 0.0);
        let u = curve.closest_parameter(&q);
        let c = curve.point(u).unwrap();
        let d = curve.derivative(u).unwrap();
        let cos = d.dot(&(c - q)) / (d.norm() * (c - q).norm());
        assert!(
            cos.abs() < 1e-8,
            "Tangent must be orthogonal to the residual: cos={cos}"
        );
    }

    #[test]
    fn interior_point_projects_radially() {
        // For a circular arc around the origin, the closest point to any
        // interior point lies along its ray from the centre.
        let curve = make_quarter_circle();
        let q = Point3::new(0.3, 0.4, 0.0);
        let u = curve.closest_parameter(&q);
        let c = curve.point(u).unwrap();
        let expected = Point3::new(0.6, 0.8, 0.0); // unit vector of (0.3, 0.4)
        assert!(
            (c - expected).norm() < 1e-8,
            "Expected radial projection {expected:?}, got {c:?}"
        );
    }

    #[test]
    fn endpoint_is_closest_for_exterior_point() {
        let curve = make_quarter_circle();
        // Beyond the start of the arc: the clamp keeps u at the start.
        let q = Point3::new(1.0, -0.5, 0.0);
        let u = curve.closest_parameter(&q);
        assert!(u.abs() < 1e-9, "Expected the curve start, got u={u}");
    }

    #[test]
    fn closed_curve_projection_near_seam() {
        let circle = NurbsCurve::arc(
            &Point3::origin(),
            &Vector3::new(1.0, 0.0, 0.0),
            &Vector3::new(0.0, 1.0, 0.0),
            0.0,
            2.0 * PI,
            1.0,
            1.0,
        )
        .unwrap();
        assert!(circle.is_closed());

        // Slightly below the positive x axis: closest point is near the
        // seam at angle -epsilon, i.e. parameter near 1.
        let q = Point3::new(2.0, -0.1, 0.0);
        let u = circle.closest_parameter(&q);
        let c = circle.point(u).unwrap();
        let angle = c.y.atan2(c.x);
        let expected = (-0.1f64).atan2(2.0);
        assert!(
            (angle - expected).abs() < 1e-5,
            "Closest circle point at angle {angle}, expected {expected}"
        );
    }

    #[test]
    fn projection_of_arc_midpoint() {
        let curve = make_quarter_circle();
        let q = curve.point(0.5).unwrap();
        // Perturb radially; projection must land back at the same angle.
        let outside = Point3::from(q.coords * 1.5);
        let u = curve.closest_parameter(&outside);
        let c = curve.point(u).unwrap();
        assert!((c - q).norm() < 1e-8);
    }
}
