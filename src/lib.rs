//! `knotwork` is a NURBS curve kernel: evaluation, knot refinement, degree
//! manipulation, conic construction, interpolation/approximation, and
//! point projection for rational B-spline curves in 3D.
//!
//! Curves are immutable values; every operation returns a fresh curve and
//! validates its preconditions up front, reporting failures through
//! [`NurbsError`] instead of panicking.
//!
//! Algorithm references follow Piegl & Tiller, "The NURBS Book" (2nd ed.).

pub mod math;
pub mod nurbs;

pub use nurbs::{cartesian, weighted, NurbsCurve, NurbsError};
