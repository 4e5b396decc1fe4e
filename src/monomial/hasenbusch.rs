//! Mass-split Hasenbusch monomial: `S = |Q(m)^{-1} Q(m+dm) phi|^2`.
//!
//! The heavier operator `Q(m+dm)` preconditions the light one, trading a
//! cheap extra monomial for a much better conditioned force term.

use crate::config::MonomialOptions;
use crate::core::{DiracApply, DiracParams, FermionMatrix, HmcOperator};
use crate::error::HmcError;
use crate::field::{Geometry, SpinorField};
use crate::rng::GaussianNoise;
use crate::solver::ChronoGuess;

use super::{chrono_force_solve, invert_q, Monomial, MonomialKind, Scratch};

pub struct HasenbuschMonomial {
    opts: MonomialOptions,
    pf: SpinorField<f64>,
    chrono: ChronoGuess,
}

impl HasenbuschMonomial {
    pub fn new(geom: &Geometry, opts: MonomialOptions) -> Self {
        HasenbuschMonomial {
            pf: SpinorField::zeros(geom),
            chrono: ChronoGuess::new(opts.mre_past),
            opts,
        }
    }

    /// Light operator, the one whose inverse enters the action.
    fn light(&self) -> DiracParams {
        DiracParams::with_mass(self.opts.mass)
    }

    /// Heavy (preconditioning) operator.
    fn heavy(&self) -> DiracParams {
        self.light().shifted_mass(self.opts.dm)
    }
}

impl<O: HmcOperator> Monomial<O> for HasenbuschMonomial {
    fn kind(&self) -> MonomialKind {
        MonomialKind::Hasenbusch
    }

    fn init_traj(&mut self, op: &O, scratch: &mut Scratch) {
        scratch.ensure(op.geometry());
    }

    fn gaussian_pf(&mut self, noise: &mut dyn GaussianNoise) {
        noise.draw_gaussian(&mut self.pf);
    }

    /// Heatbath map: `phi <- Q(m+dm)^{-1} Q(m) xi`.
    fn correct_pf(&mut self, op: &O, scratch: &mut Scratch) -> Result<usize, HmcError> {
        let tmp = scratch.ensure(op.geometry());
        tmp.copy_from(&self.pf);
        <O as DiracApply<f64>>::apply(op, self.light(), &mut self.pf, tmp);
        tmp.zero();
        let iters = invert_q(op, self.heavy(), self.opts.mt_prec, &mut self.pf, tmp)?;
        self.pf.copy_from(tmp);
        Ok(iters)
    }

    /// Inverse map: `phi <- Q(m)^{-1} Q(m+dm) phi`.
    fn correct_la_pf(&mut self, op: &O, scratch: &mut Scratch) -> Result<usize, HmcError> {
        let tmp = scratch.ensure(op.geometry());
        <O as DiracApply<f64>>::apply(op, self.heavy(), tmp, &mut self.pf);
        self.pf.zero();
        invert_q(op, self.light(), self.opts.mt_prec, tmp, &mut self.pf)
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
        scratch: &mut Scratch,
        mom: &mut O::Momentum,
    ) -> Result<usize, HmcError> {
        let light = self.light();
        let heavy = self.heavy();
        let geom = op.geometry();

        // X = (Q(m)^dag Q(m))^{-1} Q(m+dm) phi
        let b = scratch.ensure(geom);
        <O as DiracApply<f64>>::apply(op, heavy, b, &mut self.pf);
        let mut sol = SpinorField::zeros(geom);
        let iters = chrono_force_solve(op, light, &self.opts, &mut self.chrono, b, &mut sol)?;

        // light bilinear (X, Q(m) X) minus the mixed bilinear (phi, X)
        let mut y = SpinorField::zeros(geom);
        <O as DiracApply<f64>>::apply(op, light, &mut y, &mut sol);
        op.add_force(light, mom, 1.0, &mut sol, &mut y);
        op.add_force(heavy, mom, -1.0, &mut self.pf, &mut sol);
        Ok(iters)
    }
}
