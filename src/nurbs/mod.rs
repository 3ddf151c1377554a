//! NURBS (Non-Uniform Rational B-Spline) curve kernel.
//!
//! The curve is the value type `(degree, knots, weighted control points)`;
//! every operation takes the curve by reference and returns a fresh value.
//! Submodules hold the algorithm families: basis functions, knot
//! refinement, degree manipulation, conic construction, fitting, and point
//! projection.

pub mod basis;
pub mod conic;
pub mod degree;
pub mod fit;
pub mod knot;
pub mod project;
pub mod refine;

use crate::math::{binomial, Matrix4, Point3, Vector3, Vector4, PARAM_TOL, TOLERANCE};

/// Embed a Cartesian point with weight `w` as the homogeneous point
/// `(w·x, w·y, w·z, w)`.
pub fn weighted(point: &Point3, w: f64) -> Vector4 {
    Vector4::new(point.x * w, point.y * w, point.z * w, w)
}

/// Project a homogeneous point back to Cartesian space.
pub fn cartesian(pw: &Vector4) -> Point3 {
    Point3::new(pw.x / pw.w, pw.y / pw.w, pw.z / pw.w)
}

/// Errors reported by curve construction and modification.
///
/// Precondition violations are detected before any work happens; the
/// infeasibility variants (`TangentsDoNotIntersect`, `NotReducible`) are
/// recoverable and leave the caller's inputs untouched.
#[derive(Clone, Debug, PartialEq)]
pub enum NurbsError {
    /// Degree must be at least 1.
    InvalidDegree,
    /// The knot vector is empty.
    EmptyKnotVector,
    /// The knot vector is not non-decreasing.
    DecreasingKnots,
    /// An interior knot exceeds multiplicity `degree`.
    ExcessiveMultiplicity { knot: f64 },
    /// Knot count, control-point count and degree violate `m = n + p + 1`.
    DimensionMismatch {
        knots: usize,
        control_points: usize,
        degree: usize,
    },
    /// A control point carries a zero or negative weight.
    NonPositiveWeight { index: usize },
    /// Evaluation parameter outside the knot range.
    ParameterOutOfRange { param: f64, min: f64, max: f64 },
    /// Knot insertion or removal invoked with a count of zero.
    ZeroInsertion,
    /// Too few data points for the requested degree.
    TooFewPoints { points: usize, degree: usize },
    /// A fit was asked for a control-point count outside `(degree, points)`.
    InvalidControlPointCount {
        requested: usize,
        points: usize,
        degree: usize,
    },
    /// A tangent constraint names a point index that does not exist.
    TangentIndexOutOfRange { index: usize },
    /// A fitting system has no unique solution.
    SingularSystem,
    /// Tangent rays of an arc or conic admit no apex (parallel or skew).
    TangentsDoNotIntersect,
    /// Degree reduction would deviate beyond the modification tolerance.
    NotReducible,
}

impl std::fmt::Display for NurbsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NurbsError::InvalidDegree => write!(f, "Degree must be at least 1"),
            NurbsError::EmptyKnotVector => write!(f, "Knot vector is empty"),
            NurbsError::DecreasingKnots => {
                write!(f, "Knot vector must be a non-decreasing sequence")
            }
            NurbsError::ExcessiveMultiplicity { knot } => {
                write!(f, "Interior knot {knot} exceeds multiplicity = degree")
            }
            NurbsError::DimensionMismatch {
                knots,
                control_points,
                degree,
            } => write!(
                f,
                "{knots} knots, {control_points} control points, degree {degree} \
                 violate m = n + p + 1"
            ),
            NurbsError::NonPositiveWeight { index } => {
                write!(f, "Control point {index} has a non-positive weight")
            }
            NurbsError::ParameterOutOfRange { param, min, max } => {
                write!(f, "Parameter {param} outside knot range [{min}, {max}]")
            }
            NurbsError::ZeroInsertion => {
                write!(f, "Insertion/removal count must be greater than zero")
            }
            NurbsError::TooFewPoints { points, degree } => {
                write!(f, "{points} data points cannot carry degree {degree}")
            }
            NurbsError::InvalidControlPointCount {
                requested,
                points,
                degree,
            } => write!(
                f,
                "Control point count {requested} invalid for {points} points at degree {degree}"
            ),
            NurbsError::TangentIndexOutOfRange { index } => {
                write!(f, "Tangent constraint references missing point {index}")
            }
            NurbsError::SingularSystem => {
                write!(f, "Fitting system is singular")
            }
            NurbsError::TangentsDoNotIntersect => {
                write!(f, "Tangent rays do not intersect in a usable apex")
            }
            NurbsError::NotReducible => {
                write!(f, "Degree reduction exceeds the modification tolerance")
            }
        }
    }
}

impl std::error::Error for NurbsError {}

/// A Non-Uniform Rational B-Spline curve in 3D.
///
/// Control points are stored homogeneously as `(w·x, w·y, w·z, w)`; the
/// relation `knots.len() == control_points.len() + degree + 1` and strictly
/// positive weights are validated at construction and preserved by every
/// operation.
#[derive(Clone, Debug, PartialEq)]
pub struct NurbsCurve {
    pub degree: usize,
    pub knots: Vec<f64>,
    pub control_points: Vec<Vector4>,
}

impl NurbsCurve {
    /// Validating constructor from homogeneous control points.
    pub fn new(
        degree: usize,
        knots: Vec<f64>,
        control_points: Vec<Vector4>,
    ) -> Result<Self, NurbsError> {
        if degree < 1 {
            return Err(NurbsError::InvalidDegree);
        }
        if knots.is_empty() {
            return Err(NurbsError::EmptyKnotVector);
        }
        if knots.windows(2).any(|w| w[1] < w[0]) {
            return Err(NurbsError::DecreasingKnots);
        }
        if knots.len() != control_points.len() + degree + 1 {
            return Err(NurbsError::DimensionMismatch {
                knots: knots.len(),
                control_points: control_points.len(),
                degree,
            });
        }
        for (index, cp) in control_points.iter().enumerate() {
            if cp.w <= 0.0 {
                return Err(NurbsError::NonPositiveWeight { index });
            }
        }

        // Interior knots may repeat at most `degree` times.
        let m = knots.len() - 1;
        let mut run_start = 0;
        for i in 1..=knots.len() {
            if i == knots.len() || knots[i] - knots[run_start] > PARAM_TOL {
                let run = i - run_start;
                let interior = run_start > 0 && i - 1 < m;
                if interior && run > degree {
                    return Err(NurbsError::ExcessiveMultiplicity {
                        knot: knots[run_start],
                    });
                }
                run_start = i;
            }
        }

        Ok(Self {
            degree,
            knots,
            control_points,
        })
    }

    /// Constructor from Cartesian points and per-point weights.
    pub fn from_points(
        degree: usize,
        knots: Vec<f64>,
        points: Vec<Point3>,
        weights: Vec<f64>,
    ) -> Result<Self, NurbsError> {
        if points.len() != weights.len() {
            return Err(NurbsError::DimensionMismatch {
                knots: knots.len(),
                control_points: points.len().min(weights.len()),
                degree,
            });
        }
        let control_points = points
            .iter()
            .zip(&weights)
            .map(|(p, &w)| weighted(p, w))
            .collect();
        Self::new(degree, knots, control_points)
    }

    /// Internal constructor for control nets produced by the kernel's own
    /// algorithms, which maintain the invariants by construction.
    pub(crate) fn unchecked(degree: usize, knots: Vec<f64>, control_points: Vec<Vector4>) -> Self {
        debug_assert_eq!(knots.len(), control_points.len() + degree + 1);
        Self {
            degree,
            knots,
            control_points,
        }
    }

    /// Number of control points.
    pub fn num_control_points(&self) -> usize {
        self.control_points.len()
    }

    /// Weight of control point `i`.
    pub fn weight(&self, i: usize) -> f64 {
        self.control_points[i].w
    }

    /// Cartesian position of control point `i`.
    pub fn cartesian_control_point(&self, i: usize) -> Point3 {
        cartesian(&self.control_points[i])
    }

    /// The parameter domain `[u_min, u_max]`.
    pub fn domain(&self) -> (f64, f64) {
        (
            self.knots[self.degree],
            self.knots[self.knots.len() - self.degree - 1],
        )
    }

    /// Whether the curve closes onto itself (first and last control points
    /// coincide in Cartesian projection).
    pub fn is_closed(&self) -> bool {
        let first = self.cartesian_control_point(0);
        let last = self.cartesian_control_point(self.control_points.len() - 1);
        (first - last).norm() < TOLERANCE
    }

    pub(crate) fn check_param(&self, u: f64) -> Result<(), NurbsError> {
        let min = self.knots[0];
        let max = self.knots[self.knots.len() - 1];
        if u < min - PARAM_TOL || u > max + PARAM_TOL {
            return Err(NurbsError::ParameterOutOfRange { param: u, min, max });
        }
        Ok(())
    }

    /// Evaluate the homogeneous (weighted-space) curve point at `u`.
    pub(crate) fn weighted_point_at(&self, u: f64) -> Vector4 {
        let n = self.control_points.len() - 1;
        let p = self.degree;
        let span = basis::find_span(n, p, u, &self.knots);
        let b = basis::basis_funs(span, u, p, &self.knots);

        let mut sum = Vector4::zeros();
        for (i, &bi) in b.iter().enumerate() {
            sum += bi * self.control_points[span - p + i];
        }
        sum
    }

    /// Homogeneous curve derivatives up to `order` (index = derivative
    /// order; entry 0 is the weighted curve point).
    pub(crate) fn weighted_derivs_at(&self, u: f64, order: usize) -> Vec<Vector4> {
        let n = self.control_points.len() - 1;
        let p = self.degree;
        let span = basis::find_span(n, p, u, &self.knots);
        let ders = basis::ders_basis_funs(span, u, p, order, &self.knots);

        ders.iter()
            .map(|row| {
                let mut sum = Vector4::zeros();
                for (i, &di) in row.iter().enumerate() {
                    sum += di * self.control_points[span - p + i];
                }
                sum
            })
            .collect()
    }

    /// Cartesian derivatives up to `order`; entry 0 is the curve point as a
    /// vector from the origin.
    pub(crate) fn rational_derivs_at(&self, u: f64, order: usize) -> Vec<Vector3> {
        let wders = self.weighted_derivs_at(u, order);
        let mut result: Vec<Vector3> = Vec::with_capacity(order + 1);

        for k in 0..=order {
            let mut v = wders[k].xyz();
            for i in 1..=k {
                v -= binomial(k, i) * wders[i].w * result[k - i];
            }
            result.push(v / wders[0].w);
        }
        result
    }

    /// Evaluate the curve point at parameter `u` (basis-function path).
    pub fn point(&self, u: f64) -> Result<Point3, NurbsError> {
        self.check_param(u)?;
        Ok(cartesian(&self.weighted_point_at(u)))
    }

    /// Evaluate the weighted-space (non-rational) curve point: no
    /// homogeneous projection is applied.
    pub fn bspline_point(&self, u: f64) -> Result<Vector4, NurbsError> {
        self.check_param(u)?;
        Ok(self.weighted_point_at(u))
    }

    /// Weighted-space derivatives up to `order`.
    pub fn bspline_derivatives(&self, u: f64, order: usize) -> Result<Vec<Vector4>, NurbsError> {
        self.check_param(u)?;
        Ok(self.weighted_derivs_at(u, order))
    }

    /// Cartesian curve derivatives up to `order`.
    ///
    /// `result[0]` is the curve point (as a vector), `result[k]` the k-th
    /// derivative, computed from the weighted derivatives by
    /// `C_k = (A_k - Σ C(k,i)·w_i·C_{k-i}) / w_0`.
    pub fn derivatives(&self, u: f64, order: usize) -> Result<Vec<Vector3>, NurbsError> {
        self.check_param(u)?;
        Ok(self.rational_derivs_at(u, order))
    }

    /// First derivative at `u`.
    pub fn derivative(&self, u: f64) -> Result<Vector3, NurbsError> {
        self.check_param(u)?;
        Ok(self.rational_derivs_at(u, 1)[1])
    }

    /// Unit tangent vector at parameter `u`.
    pub fn tangent(&self, u: f64) -> Result<Vector3, NurbsError> {
        let d = self.derivative(u)?;
        let len = d.norm();
        if len > 1e-15 {
            Ok(d / len)
        } else {
            Ok(Vector3::new(1.0, 0.0, 0.0))
        }
    }

    /// Evaluate the curve point at `u` by corner-cut de Boor recursion.
    ///
    /// Inserts `u` virtually until it reaches full multiplicity and returns
    /// the projected apex. Agrees with [`NurbsCurve::point`] away from
    /// degenerate inputs; both paths are kept because their rounding
    /// behaviour differs.
    pub fn point_corner_cut(&self, u: f64) -> Result<Point3, NurbsError> {
        self.check_param(u)?;

        let p = self.degree;
        let n = self.control_points.len() - 1;

        if (u - self.knots[0]).abs() < PARAM_TOL {
            return Ok(self.cartesian_control_point(0));
        }
        if (u - self.knots[n + p + 1]).abs() < PARAM_TOL {
            return Ok(self.cartesian_control_point(n));
        }

        let span = basis::find_span(n, p, u, &self.knots);
        let s = knot::knot_multiplicity(u, &self.knots, PARAM_TOL);
        let times = p - s;

        let mut temp: Vec<Vector4> = (0..=times)
            .map(|i| self.control_points[span - p + i])
            .collect();

        for j in 1..=times {
            for i in 0..=(times - j) {
                let lo = self.knots[span - p + j + i];
                let alpha = (u - lo) / (self.knots[i + span + 1] - lo);
                temp[i] = alpha * temp[i + 1] + (1.0 - alpha) * temp[i];
            }
        }
        Ok(cartesian(&temp[0]))
    }

    /// Sample the curve at `count` evenly spaced parameters across the
    /// whole knot range. Returns `(parameter, point)` pairs.
    pub fn sample_uniform(&self, count: usize) -> Result<Vec<(f64, Point3)>, NurbsError> {
        if count < 2 {
            return Err(NurbsError::TooFewPoints {
                points: count,
                degree: self.degree,
            });
        }
        let min = self.knots[0];
        let max = self.knots[self.knots.len() - 1];
        let step = (max - min) / (count - 1) as f64;

        let mut samples = Vec::with_capacity(count);
        for i in 0..count {
            let u = if i == count - 1 { max } else { min + step * i as f64 };
            samples.push((u, cartesian(&self.weighted_point_at(u))));
        }
        Ok(samples)
    }

    /// Reverse the curve's direction. The knot intervals are mirrored so
    /// the domain endpoints stay put.
    pub fn reverse(&self) -> NurbsCurve {
        let m = self.knots.len() - 1;
        let mut knots = Vec::with_capacity(m + 1);
        knots.push(self.knots[0]);
        for i in 1..=m {
            let prev = knots[i - 1];
            knots.push(prev + (self.knots[m + 1 - i] - self.knots[m - i]));
        }

        let mut control_points = self.control_points.clone();
        control_points.reverse();

        NurbsCurve::unchecked(self.degree, knots, control_points)
    }

    /// Apply an affine transform to the curve. Weights are preserved; the
    /// Cartesian control positions are mapped through `matrix`.
    pub fn transform(&self, matrix: &Matrix4) -> NurbsCurve {
        let control_points = self
            .control_points
            .iter()
            .map(|cp| {
                let w = cp.w;
                let p = cartesian(cp);
                let mapped = matrix.transform_point(&p);
                weighted(&mapped, w)
            })
            .collect();
        NurbsCurve::unchecked(self.degree, self.knots.clone(), control_points)
    }
}
