//! Collection of monomials driven together through a trajectory.

use std::collections::BTreeMap;

use crate::core::HmcOperator;
use crate::error::HmcError;
use crate::rng::GaussianNoise;

use super::{Monomial, MonomialKind, Scratch};

/// The full fermion action as a sum of monomials, plus the per-kind
/// shared workspace.
pub struct MonomialRegistry<O: HmcOperator> {
    monomials: Vec<Box<dyn Monomial<O>>>,
    scratch: BTreeMap<MonomialKind, Scratch>,
}

impl<O: HmcOperator> MonomialRegistry<O> {
    pub fn new() -> Self {
        MonomialRegistry { monomials: Vec::new(), scratch: BTreeMap::new() }
    }

    pub fn push(&mut self, monomial: Box<dyn Monomial<O>>) {
        self.monomials.push(monomial);
    }

    pub fn len(&self) -> usize {
        self.monomials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.monomials.is_empty()
    }

    /// Allocate trajectory workspace for every registered kind.
    pub fn init_traj(&mut self, op: &O) {
        let Self { monomials, scratch } = self;
        for m in monomials {
            let kind = m.kind();
            m.init_traj(op, scratch.entry(kind).or_default());
        }
    }

    /// Heatbath: draw noise and map it through every monomial, in
    /// registration order. Returns the summed inverter iterations.
    pub fn refresh_pseudofermions(
        &mut self,
        op: &O,
        noise: &mut dyn GaussianNoise,
    ) -> Result<usize, HmcError> {
        let Self { monomials, scratch } = self;
        let mut iterations = 0;
        for m in monomials {
            let kind = m.kind();
            m.gaussian_pf(noise);
            iterations += m.correct_pf(op, scratch.entry(kind).or_default())?;
        }
        Ok(iterations)
    }

    /// Map every pseudofermion back for the accept/reject energy.
    pub fn correct_la_pseudofermions(&mut self, op: &O) -> Result<usize, HmcError> {
        let Self { monomials, scratch } = self;
        let mut iterations = 0;
        for m in monomials {
            let kind = m.kind();
            iterations += m.correct_la_pf(op, scratch.entry(kind).or_default())?;
        }
        Ok(iterations)
    }

    /// Add every monomial's per-site action density into `loc_action`.
    pub fn add_local_action(&self, loc_action: &mut [f64]) {
        for m in &self.monomials {
            m.add_local_action(loc_action);
        }
    }

    /// Accumulate the total fermion force into `mom`.
    pub fn force(&mut self, op: &O, mom: &mut O::Momentum) -> Result<usize, HmcError> {
        let Self { monomials, scratch } = self;
        let mut iterations = 0;
        for m in monomials {
            let kind = m.kind();
            iterations += m.force(op, scratch.entry(kind).or_default(), mom)?;
        }
        Ok(iterations)
    }
}

impl<O: HmcOperator> Default for MonomialRegistry<O> {
    fn default() -> Self {
        Self::new()
    }
}
