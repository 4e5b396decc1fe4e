//! Multi-shift conjugate gradient for `(Q^dag Q + sigma_k) x_k = b`.
//!
//! One Krylov recurrence runs on the unshifted operator; every shifted
//! solution is reconstructed from it through scalar recurrences
//! (Jegerlehner, hep-lat/9612014). The cost of the whole family is one
//! operator application and two global reductions per iteration, the same
//! as a single plain CG.
//!
//! When `0.0` appears among the shifts its recurrence coefficients reduce
//! to the seed coefficients exactly, so that solution is bit-identical to
//! a plain CG run with the same kernel order.
//!
//! The mixed-precision entry point runs the multi-shift pass in f32 and
//! polishes each shift with a single-shift f64 defect-correction solve.

use num_traits::Float;

use crate::core::{DiracApply, DiracParams, FermionMatrix};
use crate::field::SpinorField;
use crate::solver::cg::CgSolver;
use crate::utils::convergence::{Convergence, SolveStats};

/// Floor for the low-precision tolerance: below this, f32 arithmetic can
/// no longer reduce the true residual and the phase would spin.
const FLT_ERR2_MIN: f64 = 1e-10;

pub struct MshiftSolver {
    conv: Convergence,
}

impl MshiftSolver {
    /// `err2` is the squared relative residual target applied to every
    /// shift, `max_iter == 0` means no iteration cap.
    pub fn new(err2: f64, max_iter: usize) -> Self {
        MshiftSolver { conv: Convergence { err2, max_iter } }
    }

    /// Solve `(Q^dag Q + sigma_k) x_k = b` for every shift at once.
    ///
    /// `xs` must hold one field per shift; all are overwritten (the
    /// shifted recurrences require zero initial guesses). A shift whose
    /// scalar recurrence degenerates has converged as far as this Krylov
    /// space can take it and is retired with the solution built so far.
    /// Hitting the iteration cap sets `SolveStats::converged = false`;
    /// the caller decides whether that aborts.
    pub fn solve<T, O>(
        &self,
        op: &O,
        params: DiracParams,
        shifts: &[f64],
        b: &SpinorField<T>,
        xs: &mut [SpinorField<T>],
    ) -> SolveStats
    where
        T: Float + Send + Sync,
        O: DiracApply<T>,
    {
        assert_eq!(shifts.len(), xs.len(), "one solution field per shift");
        let comm = op.comm();
        let geom = op.geometry();
        let nshifts = shifts.len();

        for x in xs.iter_mut() {
            x.zero();
        }
        let bsq = b.sqnorm(comm);
        if bsq == 0.0 || nshifts == 0 {
            return SolveStats { iterations: 0, final_res2: 0.0, converged: true };
        }

        // seed system state (unshifted operator)
        let mut r = b.clone();
        let mut p = b.clone();
        let mut mp = SpinorField::zeros(geom);
        let mut rsq = bsq;
        let mut alpha_old = 1.0f64;
        let mut beta_old = 0.0f64;

        // per-shift scalar state and direction fields
        let mut zeta = vec![1.0f64; nshifts];
        let mut zeta_prev = vec![1.0f64; nshifts];
        let mut zeta_next = vec![1.0f64; nshifts];
        let mut res2 = vec![1.0f64; nshifts];
        let mut active = vec![true; nshifts];
        let mut pk: Vec<SpinorField<T>> = (0..nshifts).map(|_| b.clone()).collect();

        let mut iterations = 0usize;
        let mut converged = true;
        loop {
            let mut any_active = false;
            for k in 0..nshifts {
                if !active[k] {
                    continue;
                }
                res2[k] = zeta[k] * zeta[k] * rsq;
                if self.conv.reached(res2[k], bsq) {
                    active[k] = false;
                } else {
                    any_active = true;
                }
            }
            if !any_active {
                break;
            }
            if self.conv.cap_hit(iterations) {
                converged = false;
                break;
            }

            op.apply_sq(params, &mut mp, &mut p);
            let pap = p.dot_re(&mp, comm);
            if pap == 0.0 {
                converged = false;
                break;
            }
            let alpha = rsq / pap;

            for k in 0..nshifts {
                if !active[k] {
                    continue;
                }
                let denom = alpha * beta_old * (zeta_prev[k] - zeta[k])
                    + zeta_prev[k] * alpha_old * (1.0 + shifts[k] * alpha);
                if denom.abs() < f64::MIN_POSITIVE {
                    // recurrence degenerate: this shift has extracted all
                    // the Krylov space holds for it
                    active[k] = false;
                    continue;
                }
                zeta_next[k] = zeta[k] * zeta_prev[k] * alpha_old / denom;
                let alpha_k = alpha * zeta_next[k] / zeta[k];
                xs[k].mul_add_assign(T::from(alpha_k).unwrap_or_else(T::zero), &pk[k]);
            }

            r.mul_add_assign(T::from(-alpha).unwrap_or_else(T::zero), &mp);
            let rsq_new = r.sqnorm(comm);
            let beta = rsq_new / rsq;

            for k in 0..nshifts {
                if !active[k] {
                    continue;
                }
                let ratio = zeta_next[k] / zeta[k];
                let beta_k = beta * ratio * ratio;
                pk[k].lc_assign(
                    T::from(beta_k).unwrap_or_else(T::zero),
                    T::from(zeta_next[k]).unwrap_or_else(T::zero),
                    &r,
                );
                zeta_prev[k] = zeta[k];
                zeta[k] = zeta_next[k];
            }
            p.lc_assign(T::from(beta).unwrap_or_else(T::zero), T::one(), &r);

            alpha_old = alpha;
            beta_old = beta;
            rsq = rsq_new;
            iterations += 1;
        }

        let worst = res2.iter().cloned().fold(0.0f64, f64::max) / bsq;
        SolveStats { iterations, final_res2: worst, converged }
    }

    /// Mixed-precision family solve: a multi-shift pass in f32 followed by
    /// one f64 defect-correction CG per shift.
    ///
    /// `flt_err2` is the squared relative target of the low-precision
    /// phase (clamped to what f32 can deliver); the final tolerance is
    /// this solver's `err2`. Reported iterations are summed over both
    /// phases.
    pub fn solve_mixed<O>(
        &self,
        op: &O,
        params: DiracParams,
        shifts: &[f64],
        b: &SpinorField<f64>,
        xs: &mut [SpinorField<f64>],
        flt_err2: f64,
    ) -> SolveStats
    where
        O: DiracApply<f64> + DiracApply<f32>,
    {
        assert_eq!(shifts.len(), xs.len(), "one solution field per shift");
        let comm = op.comm();
        let geom = op.geometry();

        let bsq = b.sqnorm(comm);
        if bsq == 0.0 || shifts.is_empty() {
            for x in xs.iter_mut() {
                x.zero();
            }
            return SolveStats { iterations: 0, final_res2: 0.0, converged: true };
        }

        let mut b_lo = SpinorField::<f32>::zeros(geom);
        b_lo.assign_from(b);
        let mut xs_lo: Vec<SpinorField<f32>> =
            (0..shifts.len()).map(|_| SpinorField::zeros(geom)).collect();

        let low = MshiftSolver::new(flt_err2.max(FLT_ERR2_MIN), self.conv.max_iter);
        let lo_stats = low.solve(op, params, shifts, &b_lo, &mut xs_lo);

        let mut iterations = lo_stats.iterations;
        let mut converged = lo_stats.converged;
        let mut worst = 0.0f64;
        let mut mp = SpinorField::zeros(geom);
        let mut e = SpinorField::zeros(geom);

        for (k, x) in xs.iter_mut().enumerate() {
            x.assign_from(&xs_lo[k]);

            // true f64 residual of the upcast solution
            <O as DiracApply<f64>>::apply_sq(op, params, &mut mp, x);
            if shifts[k] != 0.0 {
                mp.mul_add_assign(shifts[k], x);
            }
            let mut r = b.clone();
            r.mul_add_assign(-1.0, &mp);
            let rsq = r.sqnorm(comm);
            if self.conv.reached(rsq, bsq) {
                worst = worst.max(rsq / bsq);
                continue;
            }

            // polish: residual target rescaled so the corrected solution
            // meets err2 relative to b
            let polish = CgSolver::new(self.conv.err2 * bsq / rsq, self.conv.max_iter);
            e.zero();
            let stats = polish.solve(op, params, shifts[k], &r, &mut e);
            x.mul_add_assign(1.0, &e);
            iterations += stats.iterations;
            converged = converged && stats.converged;
            worst = worst.max(stats.final_res2 * rsq / bsq);
        }

        SolveStats { iterations, final_res2: worst, converged }
    }
}
