//! Knot refinement: single and bulk insertion, Bézier decomposition,
//! bounded knot removal, and unclamping.
//!
//! Algorithms A5.1, A5.4, A5.6, A5.8 and A12.1 from "The NURBS Book",
//! operating on homogeneous control points so rational curves refine
//! exactly.

use crate::math::{Vector4, PARAM_TOL};
use crate::nurbs::{basis, knot, NurbsCurve, NurbsError};

impl NurbsCurve {
    /// Insert the knot `u` up to `times` times (Boehm insertion).
    ///
    /// The count is clamped so the resulting multiplicity never exceeds the
    /// degree; if `u` is already at full multiplicity the curve is returned
    /// unchanged. The curve's trace is preserved exactly.
    pub fn insert_knot(&self, u: f64, times: usize) -> Result<NurbsCurve, NurbsError> {
        if times == 0 {
            return Err(NurbsError::ZeroInsertion);
        }
        self.check_param(u)?;

        let p = self.degree;
        let n = self.control_points.len() - 1;
        let knots = &self.knots;
        let cp = &self.control_points;

        let k = basis::find_span(n, p, u, knots);
        let s = knot::knot_multiplicity(u, knots, PARAM_TOL);
        let r = times.min(p.saturating_sub(s));
        if r == 0 {
            return Ok(self.clone());
        }

        let mut new_knots = Vec::with_capacity(knots.len() + r);
        new_knots.extend_from_slice(&knots[..=k]);
        new_knots.extend(std::iter::repeat(u).take(r));
        new_knots.extend_from_slice(&knots[k + 1..]);

        let mut q = vec![Vector4::zeros(); n + 1 + r];
        for i in 0..=(k - p) {
            q[i] = cp[i];
        }
        for i in (k - s)..=n {
            q[i + r] = cp[i];
        }

        // Working triangle over the affected control points.
        let mut temp: Vec<Vector4> = (0..=(p - s)).map(|i| cp[k - p + i]).collect();

        let mut l = 0;
        for j in 1..=r {
            l = k - p + j;
            for i in 0..=(p - j - s) {
                let alpha = (u - knots[l + i]) / (knots[i + k + 1] - knots[l + i]);
                temp[i] = alpha * temp[i + 1] + (1.0 - alpha) * temp[i];
            }
            q[l] = temp[0];
            q[k + r - j - s] = temp[p - j - s];
        }
        for i in (l + 1)..(k - s) {
            q[i] = temp[i - l];
        }

        Ok(NurbsCurve::unchecked(p, new_knots, q))
    }

    /// Insert a whole non-decreasing batch of knots in one sweep.
    ///
    /// Equivalent to repeated [`NurbsCurve::insert_knot`] but with a single
    /// pass over the control net. A vanishing blend numerator degenerates
    /// to a straight copy, preserving continuity.
    pub fn refine_knots(&self, xs: &[f64]) -> Result<NurbsCurve, NurbsError> {
        if xs.is_empty() {
            return Err(NurbsError::ZeroInsertion);
        }
        if xs.windows(2).any(|w| w[1] < w[0]) {
            return Err(NurbsError::DecreasingKnots);
        }
        for &x in xs {
            self.check_param(x)?;
        }

        let p = self.degree;
        let n = self.control_points.len() - 1;
        let m = n + p + 1;
        let r = xs.len() - 1;
        let knots = &self.knots;
        let cp = &self.control_points;

        let a = basis::find_span(n, p, xs[0], knots);
        let b = basis::find_span(n, p, xs[r], knots) + 1;

        let mut new_knots = vec![0.0; m + r + 2];
        let mut q = vec![Vector4::zeros(); n + r + 2];

        for j in 0..=a {
            new_knots[j] = knots[j];
        }
        for j in (b + p)..=m {
            new_knots[j + r + 1] = knots[j];
        }
        for j in 0..=(a - p) {
            q[j] = cp[j];
        }
        for j in (b - 1)..=n {
            q[j + r + 1] = cp[j];
        }

        let mut i = b + p - 1;
        let mut k = b + p + r;
        for jj in (0..=r).rev() {
            while xs[jj] <= knots[i] && i > a {
                q[k - p - 1] = cp[i - p - 1];
                new_knots[k] = knots[i];
                k -= 1;
                i -= 1;
            }

            q[k - p - 1] = q[k - p];
            for l in 1..=p {
                let ind = k - p + l;
                let mut alpha = new_knots[k + l] - xs[jj];
                if alpha.abs() < PARAM_TOL {
                    q[ind - 1] = q[ind];
                } else {
                    alpha /= new_knots[k + l] - knots[i - p + l];
                    q[ind - 1] = alpha * q[ind - 1] + (1.0 - alpha) * q[ind];
                }
            }

            new_knots[k] = xs[jj];
            k -= 1;
        }

        NurbsCurve::new(p, new_knots, q)
    }

    /// Decompose the curve into its Bézier segments.
    ///
    /// Each segment is a `degree+1`-point homogeneous control polygon; the
    /// segments cover the distinct knot spans in order, sharing endpoints.
    pub fn decompose(&self) -> Vec<Vec<Vector4>> {
        let p = self.degree;
        let n = self.control_points.len() - 1;
        let m = n + p + 1;
        let knots = &self.knots;
        let cp = &self.control_points;

        let mut segments: Vec<Vec<Vector4>> = Vec::new();
        let mut current: Vec<Vector4> = cp[0..=p].to_vec();

        let mut a = p;
        let mut b = p + 1;
        while b < m {
            let i = b;
            while b < m && (knots[b + 1] - knots[b]).abs() < PARAM_TOL {
                b += 1;
            }
            let mult = b - i + 1;
            let mut next: Vec<Vector4> = vec![Vector4::zeros(); p + 1];

            if mult < p {
                let numer = knots[b] - knots[a];
                let mut alphas = vec![0.0; p];
                for j in ((mult + 1)..=p).rev() {
                    alphas[j - mult - 1] = numer / (knots[a + j] - knots[a]);
                }

                let r = p - mult;
                for j in 1..=r {
                    let save = r - j;
                    let s = mult + j;
                    for k in (s..=p).rev() {
                        let alpha = alphas[k - s];
                        current[k] = alpha * current[k] + (1.0 - alpha) * current[k - 1];
                    }
                    if b < m {
                        next[save] = current[p];
                    }
                }
            }

            segments.push(current);
            current = next;

            if b < m {
                for j in (p - mult)..=p {
                    current[j] = cp[b - p + j];
                }
                a = b;
                b += 1;
            }
        }

        segments
    }

    /// Attempt to remove knot `u` up to `times` times.
    ///
    /// Removal is accepted only while the curve deviates by at most the
    /// weight-normalised modification tolerance; the first rejected attempt
    /// stops the loop. Returns the number of removals actually performed
    /// together with the resulting curve (the input curve when zero).
    pub fn remove_knot(&self, u: f64, times: usize) -> Result<(usize, NurbsCurve), NurbsError> {
        if times == 0 {
            return Err(NurbsError::ZeroInsertion);
        }
        self.check_param(u)?;

        let p = self.degree;
        let n = self.control_points.len() - 1;
        let m = n + p + 1;
        let ord = p + 1;

        // Boundary knots of a clamped curve are not removable.
        let (dmin, dmax) = self.domain();
        if u <= dmin + PARAM_TOL || u >= dmax - PARAM_TOL {
            return Ok((0, self.clone()));
        }

        let s = knot::knot_multiplicity(u, &self.knots, PARAM_TOL);
        if s == 0 {
            return Ok((0, self.clone()));
        }

        let tol = knot::modify_tolerance(&self.control_points);
        let r = basis::find_span(n, p, u, &self.knots);

        let knots = &self.knots;
        let cp = &self.control_points;
        let mut new_knots = knots.clone();
        let mut q = cp.clone();

        let mut first = (r - p) as i64;
        let mut last = (r - s) as i64;
        let mut temp = vec![Vector4::zeros(); 2 * p + 2];

        let mut removed = 0;
        for t in 0..times.min(s) {
            let t = t as i64;
            let off = first - 1;
            temp[0] = q[off as usize];
            temp[(last + 1 - off) as usize] = q[(last + 1) as usize];

            let mut i = first;
            let mut j = last;
            let mut ii: i64 = 1;
            let mut jj = last - off;

            while j - i > t {
                let alfi = (u - knots[i as usize]) / (knots[i as usize + ord + t as usize] - knots[i as usize]);
                let alfj = (u - knots[(j - t) as usize]) / (knots[j as usize + ord] - knots[(j - t) as usize]);
                temp[ii as usize] = (q[i as usize] - (1.0 - alfi) * temp[(ii - 1) as usize]) / alfi;
                temp[jj as usize] = (q[j as usize] - alfj * temp[(jj + 1) as usize]) / (1.0 - alfj);
                i += 1;
                ii += 1;
                j -= 1;
                jj -= 1;
            }

            // Is the gap closable within tolerance?
            let removable = if j - i < t {
                (temp[(ii - 1) as usize] - temp[(jj + 1) as usize]).norm() <= tol
            } else {
                let alfi = (u - knots[i as usize]) / (knots[i as usize + ord + t as usize] - knots[i as usize]);
                let blend = alfi * temp[(ii + t + 1) as usize] + (1.0 - alfi) * temp[(ii - 1) as usize];
                (q[i as usize] - blend).norm() <= tol
            };

            if !removable {
                break;
            }

            let mut i = first;
            let mut j = last;
            while j - i > t {
                q[i as usize] = temp[(i - off) as usize];
                q[j as usize] = temp[(j - off) as usize];
                i += 1;
                j -= 1;
            }

            removed += 1;
            first -= 1;
            last += 1;
        }

        if removed == 0 {
            return Ok((0, self.clone()));
        }

        // Shift out the removed knots and compact the control net.
        for k in (r + 1)..=m {
            new_knots[k - removed] = knots[k];
        }
        new_knots.truncate(m + 1 - removed);

        let fout = (2 * r - s - p) / 2;
        let mut j = fout as i64;
        let mut i = j;
        for k in 1..removed {
            if k % 2 == 1 {
                i += 1;
            } else {
                j -= 1;
            }
        }
        for k in (i as usize + 1)..=n {
            q[j as usize] = q[k];
            j += 1;
        }
        q.truncate(n + 1 - removed);

        Ok((removed, NurbsCurve::unchecked(p, new_knots, q)))
    }

    /// Unclamp both ends of a clamped curve.
    ///
    /// The knots outside the domain become genuinely non-uniform and the
    /// boundary control points move; the curve over its original domain is
    /// unchanged.
    pub fn unclamp(&self) -> NurbsCurve {
        let p = self.degree;
        let n = self.control_points.len() - 1;

        let mut knots = self.knots.clone();
        let mut cp = self.control_points.clone();

        // Left end.
        for i in 0..(p.saturating_sub(1)) {
            knots[p - i - 1] = knots[p - i] - (knots[n - i + 1] - knots[n - i]);
            let mut k = p - 1;
            for j in (0..=i).rev() {
                let alfa = (knots[p] - knots[k]) / (knots[p + j + 1] - knots[k]);
                cp[j] = (cp[j] - alfa * cp[j + 1]) / (1.0 - alfa);
                k -= 1;
            }
        }
        knots[0] = knots[1] - (knots[n - p + 2] - knots[n - p + 1]);

        // Right end.
        for i in 0..(p.saturating_sub(1)) {
            knots[n + i + 2] = knots[n + i + 1] + (knots[p + i + 1] - knots[p + i]);
            for j in (0..=i).rev() {
                let alfa = (knots[n + 1] - knots[n - j]) / (knots[n - j + i + 2] - knots[n - j]);
                cp[n - j] = (cp[n - j] - (1.0 - alfa) * cp[n - j - 1]) / alfa;
            }
        }
        knots[n + p + 1] = knots[n + p] + (knots[2 * p] - knots[2 * p - 1]);

        NurbsCurve::unchecked(p, knots, cp)
    }
}
