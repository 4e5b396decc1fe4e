//! Operator traits and the parameter set threaded through every
//! application.
//!
//! Operators carry no mass or twist state of their own: the caller passes a
//! [`DiracParams`] into every apply, so two monomials with different
//! Hasenbusch parameters can share one operator instance without mutating
//! any shared state between calls.

use num_traits::Float;

use crate::field::{Geometry, SpinorField};
use crate::parallel::UniverseComm;

/// Mass and twisted-mass parameters of one operator application.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DiracParams {
    /// Bare fermion mass.
    pub mass: f64,
    /// Twisted-mass term `+ i mu` on the diagonal of `Q`.
    pub mu: f64,
}

impl DiracParams {
    pub fn with_mass(mass: f64) -> Self {
        DiracParams { mass, mu: 0.0 }
    }

    pub fn with_twist(mass: f64, mu: f64) -> Self {
        DiracParams { mass, mu }
    }

    /// Same mass, twist shifted by `dmu` (Hasenbusch splitting in `mu`).
    pub fn shifted_twist(&self, dmu: f64) -> Self {
        DiracParams { mass: self.mass, mu: self.mu + dmu }
    }

    /// Same twist, mass shifted by `dm` (Hasenbusch splitting in the mass).
    pub fn shifted_mass(&self, dm: f64) -> Self {
        DiracParams { mass: self.mass + dm, mu: self.mu }
    }
}

/// What every fermion operator exposes independent of working precision.
pub trait FermionMatrix {
    /// Geometry of the fields this operator acts on.
    fn geometry(&self) -> &Geometry;
    /// Communication layer used for halo exchange and reductions.
    fn comm(&self) -> &UniverseComm;
}

/// One working precision of the Dirac-style operator `Q` and the normal
/// operator `Q^dag Q` the inverters run on.
///
/// `input` is mutable because applying the stencil refreshes its halo
/// slices in place; the interior of `input` is never modified.
pub trait DiracApply<T: Float + Send + Sync>: FermionMatrix {
    /// `out = Q(params) input`.
    fn apply(&self, params: DiracParams, out: &mut SpinorField<T>, input: &mut SpinorField<T>);

    /// `out = Q(params)^dag input`.
    fn apply_dag(&self, params: DiracParams, out: &mut SpinorField<T>, input: &mut SpinorField<T>);

    /// `out = Q(params)^dag Q(params) input`. Hermitian positive definite;
    /// this is the operator every shifted solve inverts.
    fn apply_sq(&self, params: DiracParams, out: &mut SpinorField<T>, input: &mut SpinorField<T>);
}

/// Molecular-dynamics force contribution of a fermion bilinear.
pub trait FermionForce: DiracApply<f64> {
    /// Momentum (or force accumulator) type the integrator owns.
    type Momentum;

    /// Accumulate `coeff` times the force of the bilinear `<y, dQ/dU x>`
    /// into `mom`. `x` and `y` get their halos refreshed; their interiors
    /// are untouched.
    fn add_force(
        &self,
        params: DiracParams,
        mom: &mut Self::Momentum,
        coeff: f64,
        x: &mut SpinorField<f64>,
        y: &mut SpinorField<f64>,
    );
}

/// Everything a pseudofermion monomial needs from an operator: both
/// working precisions plus the force term.
pub trait HmcOperator: DiracApply<f64> + DiracApply<f32> + FermionForce {}

impl<O> HmcOperator for O where O: DiracApply<f64> + DiracApply<f32> + FermionForce {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn param_shifts_compose() {
        let p = DiracParams::with_twist(0.1, 0.05);
        let q = p.shifted_twist(0.02).shifted_mass(-0.03);
        assert_eq!(q, DiracParams { mass: 0.07, mu: 0.07 });
        assert_eq!(DiracParams::with_mass(0.1).mu, 0.0);
    }
}
