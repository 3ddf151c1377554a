//! Degree elevation and reduction.
//!
//! Algorithms A5.9 and A5.11 from "The NURBS Book". Both sweep the curve
//! segment by segment: elevation maps each implicit Bézier segment through
//! a precomputed `bezalfs` coefficient table and then restores continuity
//! at the joints with a knot-removal pass; reduction replaces each segment
//! by its best lower-degree approximation while accumulating the induced
//! error per knot span against the modification tolerance.

use crate::math::{binomial, Vector4, PARAM_TOL};
use crate::nurbs::{knot, NurbsCurve, NurbsError};

/// Reduce a degree-`p` Bézier control polygon to degree `p-1`.
///
/// Returns the reduced polygon and the maximal deviation bound (Eq. 5.40
/// to 5.42; the Bernstein factor is dropped, making the bound
/// conservative).
fn bez_degree_reduce(bpts: &[Vector4]) -> (Vec<Vector4>, f64) {
    let p = bpts.len() - 1;
    let r = (p - 1) / 2;

    let mut rbpts = vec![Vector4::zeros(); p];
    rbpts[0] = bpts[0];
    rbpts[p - 1] = bpts[p];

    let alfa = |i: usize| i as f64 / p as f64;

    if p % 2 == 0 {
        for i in 1..=r {
            rbpts[i] = (bpts[i] - alfa(i) * rbpts[i - 1]) / (1.0 - alfa(i));
        }
        for i in ((r + 1)..=(p - 2)).rev() {
            rbpts[i] = (bpts[i + 1] - (1.0 - alfa(i + 1)) * rbpts[i + 1]) / alfa(i + 1);
        }
        let err = (bpts[r + 1] - 0.5 * (rbpts[r] + rbpts[r + 1])).norm();
        (rbpts, err)
    } else {
        for i in 1..r {
            rbpts[i] = (bpts[i] - alfa(i) * rbpts[i - 1]) / (1.0 - alfa(i));
        }
        for i in ((r + 1)..=(p - 2)).rev() {
            rbpts[i] = (bpts[i + 1] - (1.0 - alfa(i + 1)) * rbpts[i + 1]) / alfa(i + 1);
        }
        let left = (bpts[r] - alfa(r) * rbpts[r - 1]) / (1.0 - alfa(r));
        let right = (bpts[r + 1] - (1.0 - alfa(r + 1)) * rbpts[r + 1]) / alfa(r + 1);
        rbpts[r] = 0.5 * (left + right);
        let err = (left - right).norm();
        (rbpts, err)
    }
}

impl NurbsCurve {
    /// Raise the curve degree by `times` without moving the curve.
    pub fn elevate_degree(&self, times: usize) -> Result<NurbsCurve, NurbsError> {
        if times == 0 {
            return Err(NurbsError::ZeroInsertion);
        }

        let p = self.degree;
        let t = times;
        let n = self.control_points.len() - 1;
        let m = n + p + 1;
        let ph = p + t;
        let ph2 = ph / 2;
        let knots = &self.knots;
        let cp = &self.control_points;

        // Final sizes are known up front: every distinct knot gains
        // multiplicity `t`.
        let interior = knot::distinct_knots(knots).len() - 2;
        let nh1 = n + 1 + t * (interior + 1);
        let mh1 = nh1 + ph + 1;

        // Bézier elevation coefficients:
        //   bezalfs[i][j] = C(p,j)·C(t,i-j) / C(p+t,i)
        let mut bezalfs = vec![vec![0.0; p + 1]; ph + 1];
        bezalfs[0][0] = 1.0;
        bezalfs[ph][p] = 1.0;
        for i in 1..=ph2 {
            let inv = 1.0 / binomial(ph, i);
            let mpi = p.min(i);
            for j in i.saturating_sub(t)..=mpi {
                bezalfs[i][j] = inv * binomial(p, j) * binomial(t, i - j);
            }
        }
        for i in (ph2 + 1)..ph {
            let mpi = p.min(i);
            for j in i.saturating_sub(t)..=mpi {
                bezalfs[i][j] = bezalfs[ph - i][p - j];
            }
        }

        let mut new_knots = vec![0.0; mh1];
        let mut q = vec![Vector4::zeros(); nh1];

        let mut kind = ph + 1;
        let mut cind = 1usize;
        let mut r: i64 = -1;
        let mut a = p;
        let mut b = p + 1;
        let mut ua = knots[0];

        q[0] = cp[0];
        for i in 0..=ph {
            new_knots[i] = ua;
        }

        let mut bpts: Vec<Vector4> = cp[0..=p].to_vec();
        let mut nextbpts = vec![Vector4::zeros(); p.saturating_sub(1)];
        let mut alfs = vec![0.0; p.saturating_sub(1)];
        let mut ebpts = vec![Vector4::zeros(); ph + 1];

        while b < m {
            let i = b;
            while b < m && (knots[b + 1] - knots[b]).abs() < PARAM_TOL {
                b += 1;
            }
            let mul = b - i + 1;
            let ub = knots[b];

            let oldr = r;
            r = p as i64 - mul as i64;

            let lbz = if oldr > 0 { ((oldr + 2) / 2) as usize } else { 1 };
            let rbz = if r > 0 {
                ph - ((r as usize) + 1) / 2
            } else {
                ph
            };

            // Insert U[b] until the working segment is Bézier.
            if r > 0 {
                let numer = ub - ua;
                for k in ((mul + 1)..=p).rev() {
                    alfs[k - mul - 1] = numer / (knots[a + k] - ua);
                }
                for j in 1..=(r as usize) {
                    let save = r as usize - j;
                    let s = mul + j;
                    for k in (s..=p).rev() {
                        bpts[k] = alfs[k - s] * bpts[k] + (1.0 - alfs[k - s]) * bpts[k - 1];
                    }
                    nextbpts[save] = bpts[p];
                }
            }

            // Elevate the Bézier segment.
            for i in lbz..=ph {
                ebpts[i] = Vector4::zeros();
                let mpi = p.min(i);
                for j in i.saturating_sub(t)..=mpi {
                    ebpts[i] += bezalfs[i][j] * bpts[j];
                }
            }

            // Knot removal pass restoring the joint continuity U[a] had.
            if oldr > 1 {
                let mut first = kind as i64 - 2;
                let mut last = kind as i64;
                let den = ub - ua;
                let bet = (ub - new_knots[kind - 1]) / den;

                for tr in 1..oldr {
                    let mut i = first;
                    let mut j = last;
                    let mut kj = j - kind as i64 + 1;

                    while j - i > tr {
                        if (i as usize) < cind {
                            let alf =
                                (ub - new_knots[i as usize]) / (ua - new_knots[i as usize]);
                            q[i as usize] =
                                alf * q[i as usize] + (1.0 - alf) * q[(i - 1) as usize];
                        }
                        if j >= lbz as i64 {
                            if j - tr <= kind as i64 - ph as i64 + oldr {
                                let gam = (ub - new_knots[(j - tr) as usize]) / den;
                                ebpts[kj as usize] =
                                    gam * ebpts[kj as usize] + (1.0 - gam) * ebpts[(kj + 1) as usize];
                            } else {
                                ebpts[kj as usize] =
                                    bet * ebpts[kj as usize] + (1.0 - bet) * ebpts[(kj + 1) as usize];
                            }
                        }
                        i += 1;
                        j -= 1;
                        kj -= 1;
                    }

                    first -= 1;
                    last += 1;
                }
            }

            // Emit the joint knot at its elevated multiplicity.
            if a != p {
                for _ in 0..(ph as i64 - oldr) as usize {
                    new_knots[kind] = ua;
                    kind += 1;
                }
            }
            for j in lbz..=rbz {
                q[cind] = ebpts[j];
                cind += 1;
            }

            if b < m {
                for j in 0..(r.max(0) as usize) {
                    bpts[j] = nextbpts[j];
                }
                for j in (r.max(0) as usize)..=p {
                    bpts[j] = cp[b - p + j];
                }
                a = b;
                b += 1;
                ua = ub;
            } else {
                for i in 0..=ph {
                    new_knots[kind + i] = ub;
                }
            }
        }

        debug_assert_eq!(kind + ph + 1, mh1);
        debug_assert_eq!(cind, nh1);

        Ok(NurbsCurve::unchecked(ph, new_knots, q))
    }

    /// Lower the curve degree by one.
    ///
    /// Fails with [`NurbsError::NotReducible`] as soon as the accumulated
    /// deviation in any knot span would exceed the weight-normalised
    /// modification tolerance; in that case the input is simply not
    /// representable at the lower degree.
    pub fn reduce_degree(&self) -> Result<NurbsCurve, NurbsError> {
        let p = self.degree;
        if p < 2 {
            return Err(NurbsError::InvalidDegree);
        }

        let n = self.control_points.len() - 1;
        let m = n + p + 1;
        let ph = p - 1;
        let knots = &self.knots;
        let cp = &self.control_points;

        let tol = knot::modify_tolerance(cp);

        // Generous buffers, truncated to the tracked sizes at the end.
        let mut new_knots = vec![0.0; m + 1];
        let mut q = vec![Vector4::zeros(); n + 1];
        let mut errors = vec![0.0; m + 1];

        let mut kind = ph + 1;
        let mut cind = 1usize;
        let mut r: i64 = -1;
        let mut a = p;
        let mut b = p + 1;

        q[0] = cp[0];
        for i in 0..=ph {
            new_knots[i] = knots[0];
        }

        let mut bpts: Vec<Vector4> = cp[0..=p].to_vec();
        let mut nextbpts = vec![Vector4::zeros(); p.saturating_sub(1)];
        let mut alfs = vec![0.0; p.saturating_sub(1)];

        while b < m {
            let i = b;
            while b < m && (knots[b + 1] - knots[b]).abs() < PARAM_TOL {
                b += 1;
            }
            let mult = b - i + 1;
            let oldr = r;
            r = p as i64 - mult as i64;

            let lbz = if oldr > 0 { ((oldr + 2) / 2) as usize } else { 1 };

            if r > 0 {
                let numer = knots[b] - knots[a];
                for k in ((mult + 1)..=p).rev() {
                    alfs[k - mult - 1] = numer / (knots[a + k] - knots[a]);
                }
                for j in 1..=(r as usize) {
                    let save = r as usize - j;
                    let s = mult + j;
                    for k in (s..=p).rev() {
                        bpts[k] = alfs[k - s] * bpts[k] + (1.0 - alfs[k - s]) * bpts[k - 1];
                    }
                    nextbpts[save] = bpts[p];
                }
            }

            let (mut rbpts, max_err) = bez_degree_reduce(&bpts);
            errors[a] += max_err;
            if errors[a] > tol {
                return Err(NurbsError::NotReducible);
            }

            // Remove the joint knot oldr times.
            if oldr > 0 {
                let mut first = kind as i64;
                let mut last = kind as i64;
                let mut i_after = first;

                for k in 0..oldr {
                    let mut i = first;
                    let mut j = last;
                    let mut kj = j - kind as i64;

                    while j - i > k {
                        let alfa = (knots[a] - new_knots[(i - 1) as usize])
                            / (knots[b] - new_knots[(i - 1) as usize]);
                        let beta = (knots[a] - new_knots[(j - k - 1) as usize])
                            / (knots[b] - new_knots[(j - k - 1) as usize]);
                        q[(i - 1) as usize] = (q[(i - 1) as usize]
                            - (1.0 - alfa) * q[(i - 2) as usize])
                            / alfa;
                        rbpts[kj as usize] = (rbpts[kj as usize]
                            - beta * rbpts[(kj + 1) as usize])
                            / (1.0 - beta);
                        i += 1;
                        j -= 1;
                        kj -= 1;
                    }

                    // Deviation bound of this removal step.
                    let br = if j - i < k {
                        (q[(i - 2) as usize] - rbpts[(kj + 1) as usize]).norm()
                    } else {
                        let delta = (knots[a] - new_knots[(i - 1) as usize])
                            / (knots[b] - new_knots[(i - 1) as usize]);
                        let blend = delta * rbpts[(kj + 1) as usize]
                            + (1.0 - delta) * q[(i - 2) as usize];
                        (q[(i - 1) as usize] - blend).norm()
                    };

                    // The affected knot spans accumulate the bound.
                    let big_k = a as i64 + oldr - k;
                    let qq = (2 * p as i64 - k + 1) / 2;
                    let l = (big_k - qq).max(0) as usize;
                    for ii in l..=a {
                        errors[ii] += br;
                        if errors[ii] > tol {
                            return Err(NurbsError::NotReducible);
                        }
                    }

                    first -= 1;
                    last += 1;
                    i_after = i;
                }

                cind = (i_after - 1) as usize;
            }

            if a != p {
                for _ in 0..(ph as i64 - oldr) as usize {
                    new_knots[kind] = knots[a];
                    kind += 1;
                }
            }
            for i in lbz..=ph {
                q[cind] = rbpts[i];
                cind += 1;
            }

            if b < m {
                for i in 0..(r.max(0) as usize) {
                    bpts[i] = nextbpts[i];
                }
                for i in (r.max(0) as usize)..=p {
                    bpts[i] = cp[b - p + i];
                }
                a = b;
                b += 1;
            } else {
                for i in 0..=ph {
                    new_knots[kind + i] = knots[b];
                }
            }
        }

        new_knots.truncate(kind + ph + 1);
        q.truncate(kind);

        Ok(NurbsCurve::unchecked(ph, new_knots, q))
    }
}
