//! Chronological initial guess for force inversions.
//!
//! Keeps a short ring of past force solutions and projects the new source
//! onto the subspace they span: with `V` the orthonormalized history and
//! `A = Q^dag Q`, the guess is `V a` where `(V^dag A V) a = V^dag b`.
//! Along a trajectory the operator changes slowly, so the guess cuts the
//! iteration count of every force solve after the first.

use std::collections::VecDeque;

use num_complex::Complex;

use crate::core::{DiracApply, DiracParams, FermionMatrix};
use crate::field::SpinorField;

/// A history vector shorter than this after orthogonalization carries no
/// new direction and is dropped from the basis.
const BASIS_EPS: f64 = 1e-28;

pub struct ChronoGuess {
    past: VecDeque<SpinorField<f64>>,
    cap: usize,
}

impl ChronoGuess {
    /// `cap == 0` disables the history entirely (every guess is zero).
    pub fn new(cap: usize) -> Self {
        ChronoGuess { past: VecDeque::with_capacity(cap), cap }
    }

    pub fn len(&self) -> usize {
        self.past.len()
    }

    pub fn is_empty(&self) -> bool {
        self.past.is_empty()
    }

    /// Record a converged solution, evicting the oldest when full.
    pub fn push(&mut self, x: &SpinorField<f64>) {
        if self.cap == 0 {
            return;
        }
        if self.past.len() == self.cap {
            self.past.pop_front();
        }
        self.past.push_back(x.clone());
    }

    /// Write the projected guess for `A x = b` into `out` and return the
    /// number of history vectors that contributed. An empty history (or a
    /// degenerate projection) yields the zero guess.
    pub fn guess<O: DiracApply<f64>>(
        &self,
        op: &O,
        params: DiracParams,
        b: &SpinorField<f64>,
        out: &mut SpinorField<f64>,
    ) -> usize {
        out.zero();
        if self.past.is_empty() {
            return 0;
        }
        let comm = op.comm();
        let geom = op.geometry();

        // modified Gram-Schmidt over the history, newest last
        let mut basis: Vec<SpinorField<f64>> = Vec::with_capacity(self.past.len());
        for past in &self.past {
            let mut v = past.clone();
            for u in &basis {
                let c = u.dot(&v, comm);
                v.axpy(Complex::new(-c.re, -c.im), u);
            }
            let n2 = v.sqnorm(comm);
            if n2 < BASIS_EPS {
                continue;
            }
            v.scale(1.0 / n2.sqrt());
            basis.push(v);
        }
        if basis.is_empty() {
            return 0;
        }

        let n = basis.len();
        let mut av = SpinorField::zeros(geom);
        let mut gram = vec![vec![Complex::new(0.0, 0.0); n]; n];
        let mut rhs = vec![Complex::new(0.0, 0.0); n];
        for j in 0..n {
            let mut vj = basis[j].clone();
            op.apply_sq(params, &mut av, &mut vj);
            for i in 0..n {
                gram[i][j] = basis[i].dot(&av, comm);
            }
            rhs[j] = basis[j].dot(b, comm);
        }

        let Some(coeffs) = solve_dense(&mut gram, &mut rhs) else {
            return 0;
        };
        for (v, a) in basis.iter().zip(coeffs) {
            out.axpy(a, v);
        }
        n
    }
}

/// In-place Gaussian elimination with partial pivoting for the small
/// projected system. Returns `None` when the system is singular.
fn solve_dense(
    m: &mut [Vec<Complex<f64>>],
    rhs: &mut [Complex<f64>],
) -> Option<Vec<Complex<f64>>> {
    let n = rhs.len();
    for col in 0..n {
        let pivot =
            (col..n).max_by(|&a, &b| m[a][col].norm_sqr().total_cmp(&m[b][col].norm_sqr()))?;
        if m[pivot][col].norm_sqr() < f64::MIN_POSITIVE {
            return None;
        }
        m.swap(col, pivot);
        rhs.swap(col, pivot);
        for row in col + 1..n {
            let f = m[row][col] / m[col][col];
            for c in col..n {
                let sub = f * m[col][c];
                m[row][c] -= sub;
            }
            let sub = f * rhs[col];
            rhs[row] -= sub;
        }
    }
    let mut sol = vec![Complex::new(0.0, 0.0); n];
    for row in (0..n).rev() {
        let mut acc = rhs[row];
        for c in row + 1..n {
            acc -= m[row][c] * sol[c];
        }
        sol[row] = acc / m[row][row];
    }
    Some(sol)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::Geometry;
    use crate::operator::HoppingOperator;
    use crate::parallel::UniverseComm;
    use crate::rng::{GaussianNoise, GaussianSampler};
    use approx::assert_abs_diff_eq;

    fn noise(geom: &Geometry, seed: u64) -> SpinorField<f64> {
        let mut f = SpinorField::zeros(geom);
        GaussianSampler::seeded(seed).draw_gaussian(&mut f);
        f
    }

    #[test]
    fn ring_evicts_oldest() {
        let geom = Geometry::serial([2, 2, 2, 2]);
        let mut chrono = ChronoGuess::new(2);
        for seed in 0..4 {
            chrono.push(&noise(&geom, seed));
        }
        assert_eq!(chrono.len(), 2);

        let mut disabled = ChronoGuess::new(0);
        disabled.push(&noise(&geom, 5));
        assert!(disabled.is_empty());
    }

    #[test]
    fn empty_history_gives_zero_guess() {
        let geom = Geometry::serial([2, 2, 2, 2]);
        let comm = UniverseComm::serial();
        let op = HoppingOperator::new(geom.clone(), &comm);
        let chrono = ChronoGuess::new(3);
        let b = noise(&geom, 1);
        let mut out = noise(&geom, 2);
        assert_eq!(chrono.guess(&op, DiracParams::with_mass(0.1), &b, &mut out), 0);
        assert_eq!(out.sqnorm(&comm), 0.0);
    }

    #[test]
    fn recovers_solution_in_span() {
        // if b = A x_prev for a stored x_prev, the projection is exact
        let geom = Geometry::serial([4, 2, 2, 2]);
        let comm = UniverseComm::serial();
        let op = HoppingOperator::new(geom.clone(), &comm);
        let params = DiracParams::with_twist(0.2, 0.1);

        let mut x_prev = noise(&geom, 7);
        let mut b = SpinorField::zeros(&geom);
        op.apply_sq(params, &mut b, &mut x_prev);

        let mut chrono = ChronoGuess::new(2);
        chrono.push(&x_prev);
        chrono.push(&noise(&geom, 8));

        let mut out = SpinorField::zeros(&geom);
        let used = chrono.guess(&op, params, &b, &mut out);
        assert_eq!(used, 2);

        let mut resid = b.clone();
        let mut aout = SpinorField::zeros(&geom);
        op.apply_sq(params, &mut aout, &mut out);
        resid.mul_add_assign(-1.0, &aout);
        let rel = resid.sqnorm(&comm) / b.sqnorm(&comm);
        assert_abs_diff_eq!(rel, 0.0, epsilon = 1e-18);
    }

    #[test]
    fn duplicate_history_is_deflated() {
        let geom = Geometry::serial([2, 2, 2, 2]);
        let comm = UniverseComm::serial();
        let op = HoppingOperator::new(geom.clone(), &comm);
        let params = DiracParams::with_mass(0.3);
        let v = noise(&geom, 9);
        let mut chrono = ChronoGuess::new(3);
        chrono.push(&v);
        chrono.push(&v);
        let b = noise(&geom, 10);
        let mut out = SpinorField::zeros(&geom);
        // the second copy carries no new direction
        assert_eq!(chrono.guess(&op, params, &b, &mut out), 1);
    }
}
