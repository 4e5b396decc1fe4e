//! Twist-split Hasenbusch monomial:
//! `S = |Q(m, mu)^{-1} Q(m, mu + dmu) phi|^2`.
//!
//! Same splitting idea as the mass-split monomial, with the shift applied
//! to the twisted-mass term instead of the bare mass.

use crate::config::MonomialOptions;
use crate::core::{DiracApply, DiracParams, FermionMatrix, HmcOperator};
use crate::error::HmcError;
use crate::field::{Geometry, SpinorField};
use crate::rng::GaussianNoise;
use crate::solver::ChronoGuess;

use super::{chrono_force_solve, invert_q, Monomial, MonomialKind, Scratch};

pub struct HasenbuschTmMonomial {
    opts: MonomialOptions,
    pf: SpinorField<f64>,
    chrono: ChronoGuess,
}

impl HasenbuschTmMonomial {
    pub fn new(geom: &Geometry, opts: MonomialOptions) -> Self {
        HasenbuschTmMonomial {
            pf: SpinorField::zeros(geom),
            chrono: ChronoGuess::new(opts.mre_past),
            opts,
        }
    }

    fn light(&self) -> DiracParams {
        DiracParams::with_twist(self.opts.mass, self.opts.mu)
    }

    fn heavy(&self) -> DiracParams {
        self.light().shifted_twist(self.opts.dmu)
    }
}

impl<O: HmcOperator> Monomial<O> for HasenbuschTmMonomial {
    fn kind(&self) -> MonomialKind {
        MonomialKind::HasenbuschTwistedMass
    }

    fn init_traj(&mut self, op: &O, scratch: &mut Scratch) {
        scratch.ensure(op.geometry());
    }

    fn gaussian_pf(&mut self, noise: &mut dyn GaussianNoise) {
        noise.draw_gaussian(&mut self.pf);
    }

    /// Heatbath map: `phi <- Q(mu + dmu)^{-1} Q(mu) xi`.
    fn correct_pf(&mut self, op: &O, scratch: &mut Scratch) -> Result<usize, HmcError> {
        let tmp = scratch.ensure(op.geometry());
        tmp.copy_from(&self.pf);
        <O as DiracApply<f64>>::apply(op, self.light(), &mut self.pf, tmp);
        tmp.zero();
        let iters = invert_q(op, self.heavy(), self.opts.mt_prec, &mut self.pf, tmp)?;
        self.pf.copy_from(tmp);
        Ok(iters)
    }

    /// Inverse map: `phi <- Q(mu)^{-1} Q(mu + dmu) phi`.
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

        // X = (Q(mu)^dag Q(mu))^{-1} Q(mu + dmu) phi
        let b = scratch.ensure(geom);
        <O as DiracApply<f64>>::apply(op, heavy, b, &mut self.pf);
        let mut sol = SpinorField::zeros(geom);
        let iters = chrono_force_solve(op, light, &self.opts, &mut self.chrono, b, &mut sol)?;

        let mut y = SpinorField::zeros(geom);
        <O as DiracApply<f64>>::apply(op, light, &mut y, &mut sol);
        op.add_force(light, mom, 1.0, &mut sol, &mut y);
        op.add_force(heavy, mom, -1.0, &mut self.pf, &mut sol);
        Ok(iters)
    }
}
