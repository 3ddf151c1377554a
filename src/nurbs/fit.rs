//! Curve fitting: global and local interpolation, least-squares and
//! constrained approximation, and the error-bounded approximation ladder.
//!
//! Algorithms A9.1, A9.4, A9.6 and A9.8–A9.10 from "The NURBS Book", plus
//! the local cubic scheme of section 9.3.4. Dense systems are solved with
//! nalgebra's LU decomposition (partial pivoting).

use nalgebra::DMatrix;

use crate::math::{Point3, Vector3, Vector4, PARAM_TOL, TOLERANCE};
use crate::nurbs::{basis, knot, weighted, NurbsCurve, NurbsError};

fn unit_weight_controls(sol: &DMatrix<f64>) -> Vec<Vector4> {
    (0..sol.nrows())
        .map(|i| Vector4::new(sol[(i, 0)], sol[(i, 1)], sol[(i, 2)], 1.0))
        .collect()
}

/// Unit tangent directions for the local interpolation scheme, via the
/// corner-cutting three-point construction (Eq. 9.31/9.32) with parabolic
/// end extensions.
fn local_tangents(points: &[Point3]) -> Vec<Vector3> {
    let n = points.len() - 1;

    // q_k for k = -1 ..= n+2, stored at index k+1.
    let mut q = vec![Vector3::zeros(); n + 4];
    for k in 1..=n {
        q[k + 1] = points[k] - points[k - 1];
    }
    if n >= 2 {
        q[1] = 2.0 * q[2] - q[3];
        q[0] = 2.0 * q[1] - q[2];
        q[n + 2] = 2.0 * q[n + 1] - q[n];
        q[n + 3] = 2.0 * q[n + 2] - q[n + 1];
    } else {
        q[0] = q[2];
        q[1] = q[2];
        q[n + 2] = q[n + 1];
        q[n + 3] = q[n + 1];
    }

    (0..=n)
        .map(|k| {
            let a = q[k].cross(&q[k + 1]).norm();
            let b = q[k + 2].cross(&q[k + 3]).norm();
            let alpha = if a + b > TOLERANCE { a / (a + b) } else { 0.5 };
            let v = (1.0 - alpha) * q[k + 1] + alpha * q[k + 2];
            let len = v.norm();
            if len > TOLERANCE {
                v / len
            } else {
                Vector3::new(1.0, 0.0, 0.0)
            }
        })
        .collect()
}

/// Deviation bound for removing the knot at index `r` once (A9.9).
///
/// Runs the two-sided removal sweep without committing and measures the
/// closing gap.
fn removal_bound(degree: usize, knots: &[f64], cp: &[Vector4], r: usize) -> f64 {
    let u = knots[r];
    let ord = degree + 1;
    let s = knot::knot_multiplicity(u, knots, PARAM_TOL);
    let first = r - degree;
    let last = r - s;
    let off = first - 1;

    let mut temp = vec![Vector4::zeros(); last + 2 - off];
    temp[0] = cp[off];
    temp[last + 1 - off] = cp[last + 1];

    let (mut i, mut j) = (first as i64, last as i64);
    let (mut ii, mut jj) = (1i64, (last - off) as i64);

    while j - i > 0 {
        let alfi = (u - knots[i as usize]) / (knots[i as usize + ord] - knots[i as usize]);
        let alfj = (u - knots[j as usize]) / (knots[j as usize + ord] - knots[j as usize]);
        temp[ii as usize] = (cp[i as usize] - (1.0 - alfi) * temp[(ii - 1) as usize]) / alfi;
        temp[jj as usize] = (cp[j as usize] - alfj * temp[(jj + 1) as usize]) / (1.0 - alfj);
        i += 1;
        ii += 1;
        j -= 1;
        jj -= 1;
    }

    if j - i < 0 {
        (temp[(ii - 1) as usize] - temp[(jj + 1) as usize]).norm()
    } else {
        let alfi = (u - knots[i as usize]) / (knots[i as usize + ord] - knots[i as usize]);
        let blend = alfi * temp[(ii + 1) as usize] + (1.0 - alfi) * temp[(ii - 1) as usize];
        (cp[i as usize] - blend).norm()
    }
}

/// Remove the knot at index `r` once, unconditionally, averaging the
/// two-sided sweep into the control net.
fn force_remove_knot(degree: usize, knots: &mut Vec<f64>, cp: &mut Vec<Vector4>, r: usize) {
    let u = knots[r];
    let ord = degree + 1;
    let s = knot::knot_multiplicity(u, knots, PARAM_TOL);
    let first = r - degree;
    let last = r - s;
    let off = first - 1;

    let mut temp = vec![Vector4::zeros(); last + 2 - off];
    temp[0] = cp[off];
    temp[last + 1 - off] = cp[last + 1];

    let (mut i, mut j) = (first, last);
    let (mut ii, mut jj) = (1usize, last - off);
    while j > i {
        let alfi = (u - knots[i]) / (knots[i + ord] - knots[i]);
        let alfj = (u - knots[j]) / (knots[j + ord] - knots[j]);
        temp[ii] = (cp[i] - (1.0 - alfi) * temp[ii - 1]) / alfi;
        temp[jj] = (cp[j] - alfj * temp[jj + 1]) / (1.0 - alfj);
        i += 1;
        ii += 1;
        j -= 1;
        jj -= 1;
    }

    let (mut i, mut j) = (first, last);
    while j > i {
        cp[i] = temp[i - off];
        cp[j] = temp[j - off];
        i += 1;
        j -= 1;
    }

    let fout = (2 * r - s - degree) / 2;
    cp.remove(fout);
    knots.remove(r);
}

/// One pass of bounded knot removal (A9.8): repeatedly remove the knot
/// with the smallest deviation bound while every data point's accumulated
/// error stays under `max_error`.
fn remove_knots_bounded(
    degree: usize,
    knots: &mut Vec<f64>,
    cp: &mut Vec<Vector4>,
    params: &[f64],
    error: &mut [f64],
    max_error: f64,
) {
    let mut rejected: Vec<f64> = Vec::new();

    loop {
        if cp.len() <= degree + 1 {
            return;
        }
        let n = cp.len() - 1;

        // Cheapest removable interior knot (last occurrence index).
        let mut best: Option<(usize, f64)> = None;
        for r in (degree + 1)..=n {
            if knots[r + 1] - knots[r] <= PARAM_TOL {
                continue;
            }
            if rejected.iter().any(|&x| (x - knots[r]).abs() < PARAM_TOL) {
                continue;
            }
            let br = removal_bound(degree, knots, cp, r);
            if best.map_or(true, |(_, b)| br < b) {
                best = Some((r, br));
            }
        }
        let Some((r, br)) = best else { return };

        let u = knots[r];
        let s = knot::knot_multiplicity(u, knots, PARAM_TOL);

        // Project the bound onto each data parameter through the one basis
        // function that absorbs the removal (Eq. 9.81/9.82).
        let mut updated = vec![0.0; params.len()];
        let mut removable = true;
        for (i, &uki) in params.iter().enumerate() {
            let new_error = if (degree + s) % 2 == 1 {
                let k = (degree + s + 1) / 2;
                let denom = knots[r - k + degree + 2] - knots[r - k + 1];
                let alpha = (knots[r] - knots[r - k + 1]) / denom;
                (1.0 - alpha) * br * basis::one_basis_fun(r - k + 1, degree, knots, uki)
            } else {
                let k = (degree + s) / 2;
                br * basis::one_basis_fun(r - k, degree, knots, uki)
            };
            updated[i] = error[i] + new_error;
            if updated[i] > max_error {
                removable = false;
                break;
            }
        }

        if !removable {
            rejected.push(u);
            continue;
        }

        error.copy_from_slice(&updated);
        force_remove_knot(degree, knots, cp, r);
    }
}

impl NurbsCurve {
    /// Interpolate a clamped degree-`degree` NURBS through `points`.
    ///
    /// Chord-length parameterisation, averaged knots, LU solve; the result
    /// carries unit weights. Algorithm A9.1.
    pub fn global_interpolation(points: &[Point3], degree: usize) -> Result<NurbsCurve, NurbsError> {
        if degree < 1 {
            return Err(NurbsError::InvalidDegree);
        }
        if points.len() < degree + 1 {
            return Err(NurbsError::TooFewPoints {
                points: points.len(),
                degree,
            });
        }

        let count = points.len();
        let uk = knot::chord_parameterization(points);
        let knots = knot::averaged_knots(degree, &uk);

        let mut a = DMatrix::zeros(count, count);
        for (i, &u) in uk.iter().enumerate() {
            let span = basis::find_span(count - 1, degree, u, &knots);
            let b = basis::basis_funs(span, u, degree, &knots);
            for (j, &bj) in b.iter().enumerate() {
                a[(i, span - degree + j)] = bj;
            }
        }
        let rhs = DMatrix::from_fn(count, 3, |i, c| points[i][c]);
        let sol = a.lu().solve(&rhs).ok_or(NurbsError::SingularSystem)?;

        Ok(NurbsCurve::unchecked(degree, knots, unit_weight_controls(&sol)))
    }

    /// Interpolate through `points` while also matching tangent directions
    /// at the given point indices.
    ///
    /// Each tangent adds a derivative row to the system; tangent magnitudes
    /// are normalised to the total chord length so the parameterisation
    /// stays balanced.
    pub fn global_interpolation_with_tangents(
        points: &[Point3],
        tangents: &[Vector3],
        tangent_indices: &[usize],
        degree: usize,
    ) -> Result<NurbsCurve, NurbsError> {
        if degree < 1 {
            return Err(NurbsError::InvalidDegree);
        }
        if tangents.is_empty() {
            return Self::global_interpolation(points, degree);
        }
        if tangents.len() != tangent_indices.len() {
            return Err(NurbsError::TangentIndexOutOfRange {
                index: tangent_indices.len(),
            });
        }
        for (k, &idx) in tangent_indices.iter().enumerate() {
            if idx >= points.len() || (k > 0 && tangent_indices[k - 1] >= idx) {
                return Err(NurbsError::TangentIndexOutOfRange { index: idx });
            }
        }

        let size = points.len() + tangents.len();
        if size < degree + 1 {
            return Err(NurbsError::TooFewPoints {
                points: size,
                degree,
            });
        }

        let uk = knot::chord_parameterization(points);
        let total = knot::total_chord_length(points);

        // Knots averaged over the parameter list with tangent parameters
        // doubled, so every extra row gains a matching span.
        let mut expanded = Vec::with_capacity(size);
        let mut ti = 0;
        for (i, &u) in uk.iter().enumerate() {
            expanded.push(u);
            if ti < tangent_indices.len() && tangent_indices[ti] == i {
                expanded.push(u);
                ti += 1;
            }
        }
        let knots = knot::averaged_knots(degree, &expanded);

        let mut a = DMatrix::zeros(size, size);
        let mut rhs = DMatrix::zeros(size, 3);
        let mut row = 0;
        let mut ti = 0;
        for (i, &u) in uk.iter().enumerate() {
            let span = basis::find_span(size - 1, degree, u, &knots);
            if ti < tangent_indices.len() && tangent_indices[ti] == i {
                let ders = basis::ders_basis_funs(span, u, degree, 1, &knots);
                for j in 0..=degree {
                    a[(row, span - degree + j)] = ders[0][j];
                    a[(row + 1, span - degree + j)] = ders[1][j];
                }
                let t = tangents[ti].normalize() * total;
                for c in 0..3 {
                    rhs[(row, c)] = points[i][c];
                    rhs[(row + 1, c)] = t[c];
                }
                row += 2;
                ti += 1;
            } else {
                let b = basis::basis_funs(span, u, degree, &knots);
                for (j, &bj) in b.iter().enumerate() {
                    a[(row, span - degree + j)] = bj;
                }
                for c in 0..3 {
                    rhs[(row, c)] = points[i][c];
                }
                row += 1;
            }
        }

        let sol = a.lu().solve(&rhs).ok_or(NurbsError::SingularSystem)?;
        Ok(NurbsCurve::unchecked(degree, knots, unit_weight_controls(&sol)))
    }

    /// Local cubic interpolation through `points`.
    ///
    /// Tangents come from the three-point corner-cut scheme; each span gets
    /// its Bézier magnitude from the quadratic
    /// `(16 - |T0+T1|²)·α² + 12·(ΔP·(T0+T1))·α - 36·|ΔP|² = 0`, and the
    /// segments assemble into a C¹ cubic with doubled interior knots.
    pub fn local_cubic_interpolation(points: &[Point3]) -> Result<NurbsCurve, NurbsError> {
        let degree = 3;
        if points.len() < 2 {
            return Err(NurbsError::TooFewPoints {
                points: points.len(),
                degree,
            });
        }

        let n = points.len() - 1;
        let tangents = local_tangents(points);

        let mut uk = vec![0.0; n + 1];
        let mut inner: Vec<(Point3, Point3)> = Vec::with_capacity(n);
        for k in 0..n {
            let p0 = points[k];
            let p3 = points[k + 1];
            let tsum = tangents[k] + tangents[k + 1];

            let a = 16.0 - tsum.norm_squared();
            let b = 12.0 * (p3 - p0).dot(&tsum);
            let c = -36.0 * (p3 - p0).norm_squared();
            let alpha = (-b + (b * b - 4.0 * a * c).sqrt()) / (2.0 * a);

            let p1 = p0 + alpha / 3.0 * tangents[k];
            let p2 = p3 - alpha / 3.0 * tangents[k + 1];
            uk[k + 1] = uk[k] + 3.0 * (p1 - p0).norm();
            inner.push((p1, p2));
        }

        let total = uk[n];
        if total < TOLERANCE {
            return Err(NurbsError::SingularSystem);
        }

        let mut knots = vec![0.0; 2 * n + 6];
        for i in 0..4 {
            knots[2 * n + 2 + i] = 1.0;
        }
        for k in 1..n {
            let v = uk[k] / total;
            knots[2 * k + 2] = v;
            knots[2 * k + 3] = v;
        }

        let mut control_points = Vec::with_capacity(2 * n + 2);
        control_points.push(weighted(&points[0], 1.0));
        for (p1, p2) in &inner {
            control_points.push(weighted(p1, 1.0));
            control_points.push(weighted(p2, 1.0));
        }
        control_points.push(weighted(&points[n], 1.0));

        Ok(NurbsCurve::unchecked(degree, knots, control_points))
    }

    /// Least-squares fit of `ctrl_count` control points through the data,
    /// pinning both endpoints (A9.4).
    pub fn least_squares_fit(
        points: &[Point3],
        degree: usize,
        ctrl_count: usize,
    ) -> Result<NurbsCurve, NurbsError> {
        if degree < 1 {
            return Err(NurbsError::InvalidDegree);
        }
        if points.len() < 2 {
            return Err(NurbsError::TooFewPoints {
                points: points.len(),
                degree,
            });
        }
        let m = points.len() - 1;
        let n = ctrl_count - 1;
        if n < degree || n + 1 > m {
            return Err(NurbsError::InvalidControlPointCount {
                requested: ctrl_count,
                points: points.len(),
                degree,
            });
        }

        let uk = knot::chord_parameterization(points);
        let knots = knot::averaged_knots_for_fit(degree, ctrl_count, &uk);

        let mut control_points = vec![Vector4::zeros(); ctrl_count];
        control_points[0] = weighted(&points[0], 1.0);
        control_points[n] = weighted(&points[m], 1.0);

        if n >= 2 {
            // Data residuals after subtracting the pinned endpoints.
            let mut rk = vec![Vector3::zeros(); m];
            for k in 1..m {
                let n0 = basis::one_basis_fun(0, degree, &knots, uk[k]);
                let nn = basis::one_basis_fun(n, degree, &knots, uk[k]);
                rk[k] = points[k].coords - n0 * points[0].coords - nn * points[m].coords;
            }

            let nmat = DMatrix::from_fn(m - 1, n - 1, |i, j| {
                basis::one_basis_fun(j + 1, degree, &knots, uk[i + 1])
            });

            let mut rhs = DMatrix::zeros(n - 1, 3);
            for i in 0..(n - 1) {
                let mut acc = Vector3::zeros();
                for k in 1..m {
                    acc += nmat[(k - 1, i)] * rk[k];
                }
                for c in 0..3 {
                    rhs[(i, c)] = acc[c];
                }
            }

            let a = nmat.transpose() * &nmat;
            let sol = a.lu().solve(&rhs).ok_or(NurbsError::SingularSystem)?;
            for i in 0..(n - 1) {
                control_points[i + 1] =
                    Vector4::new(sol[(i, 0)], sol[(i, 1)], sol[(i, 2)], 1.0);
            }
        }

        Ok(NurbsCurve::unchecked(degree, knots, control_points))
    }

    /// Weighted, optionally constrained least-squares fit (A9.6).
    ///
    /// A positive weight makes a point (or tangent) a weighted residual; a
    /// non-positive weight turns it into a hard Lagrange constraint. The
    /// constrained system is solved through `(NᵀWN)⁻¹` and the Schur
    /// complement `M (NᵀWN)⁻¹ Mᵀ`.
    #[allow(clippy::too_many_arguments)]
    pub fn weighted_least_squares_fit(
        points: &[Point3],
        weights: &[f64],
        tangents: &[Vector3],
        tangent_indices: &[usize],
        tangent_weights: &[f64],
        degree: usize,
        ctrl_count: usize,
    ) -> Result<NurbsCurve, NurbsError> {
        if degree < 1 {
            return Err(NurbsError::InvalidDegree);
        }
        if weights.len() != points.len() {
            return Err(NurbsError::DimensionMismatch {
                knots: 0,
                control_points: weights.len(),
                degree,
            });
        }
        if tangents.len() != tangent_indices.len() || tangents.len() != tangent_weights.len() {
            return Err(NurbsError::TangentIndexOutOfRange {
                index: tangent_indices.len(),
            });
        }
        for (k, &idx) in tangent_indices.iter().enumerate() {
            if idx >= points.len() || (k > 0 && tangent_indices[k - 1] >= idx) {
                return Err(NurbsError::TangentIndexOutOfRange { index: idx });
            }
        }

        if ctrl_count < degree + 1 {
            return Err(NurbsError::InvalidControlPointCount {
                requested: ctrl_count,
                points: points.len(),
                degree,
            });
        }

        let n = ctrl_count - 1;
        let unconstrained = weights.iter().filter(|&&w| w > 0.0).count()
            + tangent_weights.iter().filter(|&&w| w > 0.0).count();
        let constrained = (points.len() + tangents.len()) - unconstrained;

        // mc >= n or mc + n >= mu + 1 leaves no room for a solution.
        if constrained >= n + 1 || constrained + n >= unconstrained {
            return Err(NurbsError::InvalidControlPointCount {
                requested: ctrl_count,
                points: points.len(),
                degree,
            });
        }

        let uk = knot::chord_parameterization(points);
        let knots = knot::averaged_knots_for_fit(degree, ctrl_count, &uk);

        let mut nmat = DMatrix::zeros(unconstrained, ctrl_count);
        let mut smat = DMatrix::zeros(unconstrained, 3);
        let mut wvec = vec![0.0; unconstrained];
        let mut mmat = DMatrix::zeros(constrained, ctrl_count);
        let mut tmat = DMatrix::zeros(constrained, 3);

        let (mut mu2, mut mc2, mut j) = (0usize, 0usize, 0usize);
        for (i, q) in points.iter().enumerate() {
            let u = uk[i];
            let span = basis::find_span(n, degree, u, &knots);
            let has_tangent = j < tangent_indices.len() && tangent_indices[j] == i;

            let rows = if has_tangent {
                basis::ders_basis_funs(span, u, degree, 1, &knots)
            } else {
                vec![basis::basis_funs(span, u, degree, &knots)]
            };

            if weights[i] > 0.0 {
                wvec[mu2] = weights[i];
                for (k, &v) in rows[0].iter().enumerate() {
                    nmat[(mu2, span - degree + k)] = v;
                }
                for c in 0..3 {
                    smat[(mu2, c)] = weights[i] * q[c];
                }
                mu2 += 1;
            } else {
                for (k, &v) in rows[0].iter().enumerate() {
                    mmat[(mc2, span - degree + k)] = v;
                }
                for c in 0..3 {
                    tmat[(mc2, c)] = q[c];
                }
                mc2 += 1;
            }

            if has_tangent {
                if tangent_weights[j] > 0.0 {
                    wvec[mu2] = tangent_weights[j];
                    for (k, &v) in rows[1].iter().enumerate() {
                        nmat[(mu2, span - degree + k)] = v;
                    }
                    for c in 0..3 {
                        smat[(mu2, c)] = tangent_weights[j] * tangents[j][c];
                    }
                    mu2 += 1;
                } else {
                    for (k, &v) in rows[1].iter().enumerate() {
                        mmat[(mc2, span - degree + k)] = v;
                    }
                    for c in 0..3 {
                        tmat[(mc2, c)] = tangents[j][c];
                    }
                    mc2 += 1;
                }
                j += 1;
            }
        }

        // NᵀWN and NᵀWS, with S already carrying the weights.
        let wn = DMatrix::from_fn(unconstrained, ctrl_count, |i, j| wvec[i] * nmat[(i, j)]);
        let ntwn = nmat.transpose() * &wn;
        let ntws = nmat.transpose() * &smat;

        let sol = if constrained == 0 {
            ntwn.lu().solve(&ntws).ok_or(NurbsError::SingularSystem)?
        } else {
            let inv = ntwn.try_inverse().ok_or(NurbsError::SingularSystem)?;
            let minv = &mmat * &inv;
            let schur = &minv * mmat.transpose();
            let rhs = &minv * &ntws - &tmat;
            let lagrange = schur.lu().solve(&rhs).ok_or(NurbsError::SingularSystem)?;
            inv * (ntws - mmat.transpose() * lagrange)
        };

        Ok(NurbsCurve::unchecked(degree, knots, unit_weight_controls(&sol)))
    }

    /// Error-bounded global approximation (A9.10).
    ///
    /// Starts from the piecewise-linear interpolant and, degree by degree,
    /// removes every knot whose induced error stays under `max_error`, then
    /// elevates and refits by least squares, re-parameterising the data by
    /// projection after each refit.
    pub fn approximate_with_error_bound(
        points: &[Point3],
        degree: usize,
        max_error: f64,
    ) -> Result<NurbsCurve, NurbsError> {
        if degree < 1 {
            return Err(NurbsError::InvalidDegree);
        }
        if points.len() < degree + 1 {
            return Err(NurbsError::TooFewPoints {
                points: points.len(),
                degree,
            });
        }

        let size = points.len();
        let m = size - 1;
        let mut uk = knot::chord_parameterization(points);
        let mut error = vec![0.0; size];

        // Degree-1 interpolant: knots are the parameters themselves.
        let mut knots = Vec::with_capacity(m + 3);
        knots.push(uk[0]);
        knots.extend_from_slice(&uk);
        knots.push(uk[m]);
        let mut cp: Vec<Vector4> = points.iter().map(|p| weighted(p, 1.0)).collect();

        let mut deg = 1;
        loop {
            remove_knots_bounded(deg, &mut knots, &mut cp, &uk, &mut error, max_error);
            if deg == degree {
                break;
            }

            let elevated = NurbsCurve::unchecked(deg, knots, cp).elevate_degree(1)?;
            deg += 1;
            knots = elevated.knots;
            cp = elevated.control_points;

            // Refit at the new degree with the same control-point count
            // when the data still over-determines the system.
            if cp.len() > deg && cp.len() + 1 <= size {
                if let Ok(fit) = Self::least_squares_fit(points, deg, cp.len()) {
                    for i in 0..size {
                        let u = fit.closest_parameter(&points[i]);
                        uk[i] = u;
                        error[i] = (fit.rational_derivs_at(u, 0)[0] - points[i].coords).norm();
                    }
                    knots = fit.knots;
                    cp = fit.control_points;
                }
            }
        }

        Ok(NurbsCurve::unchecked(degree, knots, cp))
    }
}
