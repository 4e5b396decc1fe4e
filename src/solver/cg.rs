//! Conjugate gradient on `Q^dag Q + sigma` with an initial guess.
//!
//! This is the single-shift workhorse behind the defect-correction phase
//! of the mixed-precision solver and the chronologically seeded force
//! solves. The shifted multi-system pass lives in `cg_mshift`; the two
//! share kernel and reduction order so a zero shift reproduces the
//! multi-shift seed system bit for bit.

use num_traits::Float;

use crate::core::{DiracApply, DiracParams, FermionMatrix};
use crate::field::SpinorField;
use crate::utils::convergence::{Convergence, SolveStats};

pub struct CgSolver {
    conv: Convergence,
}

impl CgSolver {
    /// `err2` is the squared relative residual target, `max_iter == 0`
    /// means no iteration cap.
    pub fn new(err2: f64, max_iter: usize) -> Self {
        CgSolver { conv: Convergence { err2, max_iter } }
    }

    /// Solve `(Q^dag Q + sigma) x = b`, starting from the incoming `x`.
    ///
    /// Hitting the iteration cap is reported through
    /// `SolveStats::converged`, not as an error; the caller owns that
    /// policy.
    pub fn solve<T, O>(
        &self,
        op: &O,
        params: DiracParams,
        sigma: f64,
        b: &SpinorField<T>,
        x: &mut SpinorField<T>,
    ) -> SolveStats
    where
        T: Float + Send + Sync,
        O: DiracApply<T>,
    {
        let comm = op.comm();
        let geom = op.geometry();
        let sigma_t = T::from(sigma).unwrap_or_else(T::zero);

        let bsq = b.sqnorm(comm);
        if bsq == 0.0 {
            x.zero();
            return SolveStats { iterations: 0, final_res2: 0.0, converged: true };
        }

        let mut mp = SpinorField::zeros(geom);
        op.apply_sq(params, &mut mp, x);
        if sigma != 0.0 {
            mp.mul_add_assign(sigma_t, x);
        }
        let mut r = b.clone();
        r.mul_add_assign(-T::one(), &mp);
        let mut p = r.clone();
        let mut rsq = r.sqnorm(comm);

        let mut iterations = 0usize;
        let mut converged = true;
        loop {
            if self.conv.reached(rsq, bsq) {
                break;
            }
            if self.conv.cap_hit(iterations) {
                converged = false;
                break;
            }

            op.apply_sq(params, &mut mp, &mut p);
            if sigma != 0.0 {
                mp.mul_add_assign(sigma_t, &p);
            }
            let pap = p.dot_re(&mp, comm);
            if pap == 0.0 {
                // exact stagnation, nothing further to extract
                converged = self.conv.reached(rsq, bsq);
                break;
            }
            let alpha = rsq / pap;
            let alpha_t = T::from(alpha).unwrap_or_else(T::zero);
            x.mul_add_assign(alpha_t, &p);
            r.mul_add_assign(-alpha_t, &mp);

            let rsq_new = r.sqnorm(comm);
            let beta = rsq_new / rsq;
            p.lc_assign(T::from(beta).unwrap_or_else(T::zero), T::one(), &r);
            rsq = rsq_new;
            iterations += 1;
        }

        SolveStats { iterations, final_res2: rsq / bsq, converged }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::Geometry;
    use crate::operator::HoppingOperator;
    use crate::parallel::UniverseComm;
    use crate::rng::{GaussianNoise, GaussianSampler};

    #[test]
    fn zero_source_short_circuits() {
        let geom = Geometry::serial([4, 2, 2, 2]);
        let comm = UniverseComm::serial();
        let op = HoppingOperator::new(geom.clone(), &comm);
        let b = SpinorField::<f64>::zeros(&geom);
        let mut x = SpinorField::zeros(&geom);
        GaussianSampler::seeded(9).draw_gaussian(&mut x);
        let stats = CgSolver::new(1e-20, 0).solve(&op, DiracParams::with_mass(0.2), 0.0, &b, &mut x);
        assert!(stats.converged);
        assert_eq!(stats.iterations, 0);
        assert!(x.sqnorm(&comm) == 0.0);
    }

    #[test]
    fn warm_start_needs_fewer_iterations() {
        let geom = Geometry::serial([4, 2, 2, 2]);
        let comm = UniverseComm::serial();
        let op = HoppingOperator::new(geom.clone(), &comm);
        let params = DiracParams::with_twist(0.3, 0.1);
        let mut b = SpinorField::zeros(&geom);
        GaussianSampler::seeded(11).draw_gaussian(&mut b);

        let solver = CgSolver::new(1e-24, 0);
        let mut cold = SpinorField::zeros(&geom);
        let cold_stats = solver.solve(&op, params, 0.1, &b, &mut cold);
        assert!(cold_stats.converged);

        let mut warm = cold.clone();
        let warm_stats = solver.solve(&op, params, 0.1, &b, &mut warm);
        assert!(warm_stats.converged);
        assert!(warm_stats.iterations <= cold_stats.iterations);
        assert!(warm_stats.iterations <= 2);
    }

    #[test]
    fn cap_is_reported_not_fatal() {
        let geom = Geometry::serial([4, 2, 2, 2]);
        let comm = UniverseComm::serial();
        let op = HoppingOperator::new(geom.clone(), &comm);
        let mut b = SpinorField::zeros(&geom);
        GaussianSampler::seeded(13).draw_gaussian(&mut b);
        let mut x = SpinorField::zeros(&geom);
        let stats = CgSolver::new(1e-28, 1).solve(&op, DiracParams::with_mass(0.2), 0.0, &b, &mut x);
        assert!(!stats.converged);
        assert_eq!(stats.iterations, 1);
    }
}
