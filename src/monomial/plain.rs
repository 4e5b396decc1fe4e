//! Two-flavour monomial: `S = |Q(m)^{-1} phi|^2`.

use crate::config::MonomialOptions;
use crate::core::{DiracApply, DiracParams, FermionMatrix, HmcOperator};
use crate::error::HmcError;
use crate::field::{Geometry, SpinorField};
use crate::rng::GaussianNoise;
use crate::solver::ChronoGuess;

use super::{chrono_force_solve, invert_q, Monomial, MonomialKind, Scratch};

pub struct PlainMonomial {
    opts: MonomialOptions,
    pf: SpinorField<f64>,
    chrono: ChronoGuess,
}

impl PlainMonomial {
    pub fn new(geom: &Geometry, opts: MonomialOptions) -> Self {
        PlainMonomial {
            pf: SpinorField::zeros(geom),
            chrono: ChronoGuess::new(opts.mre_past),
            opts,
        }
    }

    fn params(&self) -> DiracParams {
        DiracParams::with_mass(self.opts.mass)
    }
}

impl<O: HmcOperator> Monomial<O> for PlainMonomial {
    fn kind(&self) -> MonomialKind {
        MonomialKind::Plain
    }

    fn init_traj(&mut self, op: &O, scratch: &mut Scratch) {
        scratch.ensure(op.geometry());
    }

    fn gaussian_pf(&mut self, noise: &mut dyn GaussianNoise) {
        noise.draw_gaussian(&mut self.pf);
    }

    /// Heatbath map: `phi <- Q xi`, no inversion needed.
    fn correct_pf(&mut self, op: &O, scratch: &mut Scratch) -> Result<usize, HmcError> {
        let tmp = scratch.ensure(op.geometry());
        tmp.copy_from(&self.pf);
        <O as DiracApply<f64>>::apply(op, self.params(), &mut self.pf, tmp);
        Ok(0)
    }

    /// Inverse map: `phi <- Q^{-1} phi`, so `|phi|^2` is the action.
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
