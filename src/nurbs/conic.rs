//! Conic constructors: circular and elliptical arcs and general open
//! conics, expressed as rational quadratic NURBS.
//!
//! Algorithms A7.1–A7.3 from "The NURBS Book". Middle control points are
//! recovered by intersecting tangent rays; configurations whose rays admit
//! no apex (parallel or skew tangents) are reported as infeasible rather
//! than constructed.

use std::f64::consts::{FRAC_PI_2, PI};

use crate::math::intersect::{intersect_rays, RayRayIntersection};
use crate::math::{Point3, Vector3};
use crate::nurbs::{weighted, NurbsCurve, NurbsError};

/// Recover the apex control point and weight of the conic through
/// `point_on_conic` with the given end points and tangents.
///
/// Fails with [`NurbsError::TangentsDoNotIntersect`] when the tangent rays
/// are parallel or skew, or when the interior point is not between the end
/// points as seen from the apex.
pub fn one_conic_arc(
    start: &Point3,
    start_tangent: &Vector3,
    end: &Point3,
    end_tangent: &Vector3,
    point_on_conic: &Point3,
) -> Result<(Point3, f64), NurbsError> {
    let apex = match intersect_rays(start, start_tangent, end, end_tangent) {
        RayRayIntersection::Intersecting { point, .. } => point,
        _ => return Err(NurbsError::TangentsDoNotIntersect),
    };

    // Parameter of the interior point along the chord, seen from the apex.
    let chord = end - start;
    let to_point = point_on_conic - apex;
    let alf2 = match intersect_rays(&apex, &to_point, start, &chord) {
        RayRayIntersection::Intersecting { t1, .. } => t1,
        _ => return Err(NurbsError::TangentsDoNotIntersect),
    };
    if alf2 <= 0.0 || alf2 >= 1.0 {
        return Err(NurbsError::TangentsDoNotIntersect);
    }

    let a = (alf2 / (1.0 - alf2)).sqrt();
    let u = a / (1.0 + a);

    let num = (1.0 - u) * (1.0 - u) * (point_on_conic - start).dot(&(apex - point_on_conic))
        + u * u * (point_on_conic - end).dot(&(apex - point_on_conic));
    let den = 2.0 * u * (1.0 - u) * (apex - point_on_conic).norm_squared();

    Ok((apex, num / den))
}

/// Split the rational quadratic segment `(start, apex·w, end)` at its
/// shoulder. Returns the two new middle points, the split point, and the
/// weight shared by the new middle points.
pub fn split_arc(
    start: &Point3,
    apex: &Point3,
    apex_weight: f64,
    end: &Point3,
) -> (Point3, Point3, Point3, f64) {
    let q1 = Point3::from((start.coords + apex_weight * apex.coords) / (1.0 + apex_weight));
    let r1 = Point3::from((apex_weight * apex.coords + end.coords) / (1.0 + apex_weight));
    let split = Point3::from((q1.coords + r1.coords) / 2.0);
    let w = ((1.0 + apex_weight) / 2.0).sqrt();
    (q1, split, r1, w)
}

impl NurbsCurve {
    /// Build a circular or elliptical arc as a degree-2 rational NURBS.
    ///
    /// The arc runs counter-clockwise from `start_rad` to `end_rad` in the
    /// plane spanned by `x_axis`/`y_axis`, with the two radii applied along
    /// those axes. The sweep is split into one quadratic segment per
    /// (at most) 90 degrees; middle weights are `cos(Δθ/2)`.
    #[allow(clippy::too_many_arguments)]
    pub fn arc(
        center: &Point3,
        x_axis: &Vector3,
        y_axis: &Vector3,
        start_rad: f64,
        end_rad: f64,
        x_radius: f64,
        y_radius: f64,
    ) -> Result<NurbsCurve, NurbsError> {
        let nx = x_axis.normalize();
        let ny = y_axis.normalize();

        let mut end_rad = end_rad;
        if end_rad < start_rad {
            end_rad += 2.0 * PI;
        }
        let theta = end_rad - start_rad;

        let narcs = if theta <= FRAC_PI_2 {
            1
        } else if theta <= PI {
            2
        } else if theta <= 1.5 * PI {
            3
        } else {
            4
        };
        let dtheta = theta / narcs as f64;
        let n = 2 * narcs;

        let w1 = (dtheta / 2.0).cos();

        let at = |angle: f64| -> Point3 {
            center + x_radius * angle.cos() * nx + y_radius * angle.sin() * ny
        };
        // Ellipse tangent direction (the derivative, not the unit-circle
        // tangent, so unequal radii stay exact).
        let tangent_at =
            |angle: f64| -> Vector3 { -x_radius * angle.sin() * nx + y_radius * angle.cos() * ny };

        let mut control_points = vec![crate::math::Vector4::zeros(); n + 1];
        let mut p0 = at(start_rad);
        let mut t0 = tangent_at(start_rad);
        control_points[0] = weighted(&p0, 1.0);

        let mut index = 0;
        let mut angle = start_rad;
        for _ in 1..=narcs {
            angle += dtheta;
            let p2 = at(angle);
            let t2 = tangent_at(angle);

            let apex = match intersect_rays(&p0, &t0, &p2, &t2) {
                RayRayIntersection::Intersecting { point, .. } => point,
                _ => return Err(NurbsError::TangentsDoNotIntersect),
            };
            control_points[index + 1] = weighted(&apex, w1);
            control_points[index + 2] = weighted(&p2, 1.0);

            index += 2;
            p0 = p2;
            t0 = t2;
        }

        let mut knots = vec![0.0; n + 4];
        for i in 0..3 {
            knots[n + 1 + i] = 1.0;
        }
        match narcs {
            2 => {
                knots[3] = 0.5;
                knots[4] = 0.5;
            }
            3 => {
                knots[3] = 1.0 / 3.0;
                knots[4] = 1.0 / 3.0;
                knots[5] = 2.0 / 3.0;
                knots[6] = 2.0 / 3.0;
            }
            4 => {
                knots[3] = 0.25;
                knots[4] = 0.25;
                knots[5] = 0.5;
                knots[6] = 0.5;
                knots[7] = 0.75;
                knots[8] = 0.75;
            }
            _ => {}
        }

        Ok(NurbsCurve::unchecked(2, knots, control_points))
    }

    /// Build an open conic arc through `point_on_conic` with the given end
    /// points and tangents.
    ///
    /// The apex weight decides the segmentation: a full-weight apex gives a
    /// single quadratic segment; wide positive-weight arcs stay single,
    /// moderate ones split in two, and negative-weight (more than half
    /// swept) arcs split in four so every emitted weight is positive.
    pub fn open_conic(
        start: &Point3,
        start_tangent: &Vector3,
        end: &Point3,
        end_tangent: &Vector3,
        point_on_conic: &Point3,
    ) -> Result<NurbsCurve, NurbsError> {
        let (apex, w1) = one_conic_arc(start, start_tangent, end, end_tangent, point_on_conic)?;

        if w1 <= -1.0 {
            return Err(NurbsError::TangentsDoNotIntersect);
        }

        let nsegs = if w1 >= 1.0 {
            1
        } else {
            let v1 = (apex - start).normalize();
            let v2 = (end - apex).normalize();
            let rad = v1.angle(&v2);
            if w1 > 0.0 && rad > PI / 3.0 {
                1
            } else if w1 < 0.0 && rad > FRAC_PI_2 {
                4
            } else {
                2
            }
        };

        let n = 2 * nsegs;
        let mut knots = vec![0.0; n + 4];
        for i in 0..3 {
            knots[n + 1 + i] = 1.0;
        }
        let mut control_points = vec![crate::math::Vector4::zeros(); n + 1];
        control_points[0] = weighted(start, 1.0);
        control_points[n] = weighted(end, 1.0);

        match nsegs {
            1 => {
                control_points[1] = weighted(&apex, w1);
            }
            2 => {
                let (q1, split, r1, wqr) = split_arc(start, &apex, w1, end);
                control_points[1] = weighted(&q1, wqr);
                control_points[2] = weighted(&split, 1.0);
                control_points[3] = weighted(&r1, wqr);
                knots[3] = 0.5;
                knots[4] = 0.5;
            }
            _ => {
                let (q1, split, r1, wqr) = split_arc(start, &apex, w1, end);
                control_points[4] = weighted(&split, 1.0);

                let (hq1, hs, hr1, whalf) = split_arc(start, &q1, wqr, &split);
                control_points[1] = weighted(&hq1, whalf);
                control_points[2] = weighted(&hs, 1.0);
                control_points[3] = weighted(&hr1, whalf);

                let (hq1, hs, hr1, whalf) = split_arc(&split, &r1, wqr, end);
                control_points[5] = weighted(&hq1, whalf);
                control_points[6] = weighted(&hs, 1.0);
                control_points[7] = weighted(&hr1, whalf);

                knots[3] = 0.25;
                knots[4] = 0.25;
                knots[5] = 0.5;
                knots[6] = 0.5;
                knots[7] = 0.75;
                knots[8] = 0.75;
            }
        }

        Ok(NurbsCurve::unchecked(2, knots, control_points))
    }
}
