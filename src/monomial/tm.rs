//! Twisted-mass monomial: `S = |Q(m, mu)^{-1} phi|^2`.

use crate::config::MonomialOptions;
use crate::core::{DiracApply, DiracParams, FermionMatrix, HmcOperator};
use crate::error::HmcError;
use crate::field::{Geometry, SpinorField};
use crate::rng::GaussianNoise;
use crate::solver::ChronoGuess;

use super::{chrono_force_solve, invert_q, Monomial, MonomialKind, Scratch};

pub struct TmMonomial {
    opts: MonomialOptions,
    pf: SpinorField<f64>,
    chrono: ChronoGuess,
}

impl TmMonomial {
    pub fn new(geom: &Geometry, opts: MonomialOptions) -> Self {
        TmMonomial {
            pf: SpinorField::zeros(geom),
            chrono: ChronoGuess::new(opts.mre_past),
            opts,
        }
    }

    fn params(&self) -> DiracParams {
        DiracParams::with_twist(self.opts.mass, self.opts.mu)
    }
}

impl<O: HmcOperator> Monomial<O> for TmMonomial {
    fn kind(&self) -> MonomialKind {
        MonomialKind::TwistedMass
    }

    fn init_traj(&mut self, op: &O, scratch: &mut Scratch) {
        scratch.ensure(op.geometry());
    }

    fn gaussian_pf(&mut self, noise: &mut dyn GaussianNoise) {
        noise.draw_gaussian(&mut self.pf);
    }

    fn correct_pf(&mut self, op: &O, scratch: &mut Scratch) -> Result<usize, HmcError> {
        let tmp = scratch.ensure(op.geometry());
        tmp.copy_from(&self.pf);
        <O as DiracApply<f64>>::apply(op, self.params(), &mut self.pf, tmp);
        Ok(0)
    }

    fn correct_la_pf(&mut self, op: &O, scratch: &mut Scratch) -> Result<usize, HmcError> {
        let tmp = scratch.ensure(op.geometry());
        tmp.copy_from(&self.pf);
        self.pf.zero();
        invert_q(op, self.params(), self.opts.mt_prec, tmp, &mut self.pf)
    }

    fn pseudofermion(&self) -> &SpinorField<f64> {
        &self.pf
    }

    fn add_local_action(&self, loc_action: &mut [f64]) {
        self.pf.accumulate_site_action(loc_action);
    }

    fn force(
        &mut self,
        op: &O,
        _scratch: &mut Scratch,
        mom: &mut O::Momentum,
    ) -> Result<usize, HmcError> {
        let params = self.params();
        let geom = op.geometry();
        let mut sol = SpinorField::zeros(geom);
        let iters =
            chrono_force_solve(op, params, &self.opts, &mut self.chrono, &self.pf, &mut sol)?;
        let mut y = SpinorField::zeros(geom);
        <O as DiracApply<f64>>::apply(op, params, &mut y, &mut sol);
        op.add_force(params, mom, 1.0, &mut sol, &mut y);
        Ok(iters)
    }
}
