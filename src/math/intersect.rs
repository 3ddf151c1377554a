//! Ray and plane intersection predicates.
//!
//! The conic constructors locate apex control points by intersecting
//! tangent rays; these helpers classify the configuration so callers can
//! distinguish a usable apex from parallel or skew tangents.

use super::{Point3, Vector3, TOLERANCE};

/// Outcome of intersecting two rays `origin + t * dir` in 3D.
#[derive(Clone, Debug, PartialEq)]
pub enum RayRayIntersection {
    /// The rays meet in a single point; `t0`/`t1` are the ray parameters.
    Intersecting { t0: f64, t1: f64, point: Point3 },
    /// Parallel directions, disjoint carriers.
    Parallel,
    /// Parallel directions on the same carrier line.
    Coincident,
    /// Non-parallel directions that pass without meeting.
    Skew,
}

/// Classify the intersection of two rays.
///
/// Directions need not be unit length. The closest-approach points on both
/// carriers are computed; the rays intersect when those coincide within
/// [`TOLERANCE`].
pub fn intersect_rays(
    origin0: &Point3,
    dir0: &Vector3,
    origin1: &Point3,
    dir1: &Vector3,
) -> RayRayIntersection {
    let diff = origin1 - origin0;
    let cross = dir0.cross(dir1);
    let cross_sq = cross.norm_squared();

    if cross_sq < TOLERANCE * TOLERANCE {
        // Parallel carriers; coincident when the origin offset is parallel too.
        if diff.cross(dir0).norm() < TOLERANCE * dir0.norm().max(1.0) {
            return RayRayIntersection::Coincident;
        }
        return RayRayIntersection::Parallel;
    }

    let t0 = diff.cross(dir1).dot(&cross) / cross_sq;
    let t1 = diff.cross(dir0).dot(&cross) / cross_sq;

    let close0 = origin0 + dir0 * t0;
    let close1 = origin1 + dir1 * t1;
    if (close0 - close1).norm() > TOLERANCE {
        return RayRayIntersection::Skew;
    }

    RayRayIntersection::Intersecting {
        t0,
        t1,
        point: close0,
    }
}

/// Outcome of intersecting an infinite line with a plane.
#[derive(Clone, Debug, PartialEq)]
pub enum LinePlaneIntersection {
    Intersecting { point: Point3 },
    /// Line direction lies in the plane, line off the plane.
    Parallel,
    /// Line lies entirely in the plane.
    OnPlane,
}

/// Intersect the line `line_point + t * line_dir` with the plane through
/// `plane_point` with normal `normal`.
pub fn intersect_line_and_plane(
    normal: &Vector3,
    plane_point: &Point3,
    line_point: &Point3,
    line_dir: &Vector3,
) -> LinePlaneIntersection {
    let denom = normal.dot(line_dir);
    let offset = normal.dot(&(plane_point - line_point));

    if denom.abs() < TOLERANCE {
        if offset.abs() < TOLERANCE {
            return LinePlaneIntersection::OnPlane;
        }
        return LinePlaneIntersection::Parallel;
    }

    let t = offset / denom;
    LinePlaneIntersection::Intersecting {
        point: line_point + line_dir * t,
    }
}
