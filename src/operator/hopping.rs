//! Nearest-neighbour hopping operator with a twisted-mass diagonal.
//!
//! `Q(m, mu) = (m + 4) + i mu - (1/2) sum_mu (T_mu + T_-mu)` where `T_mu`
//! shifts by one site. The hopping part is Hermitian, so the adjoint only
//! flips the sign of the twist and `Q^dag Q` is Hermitian positive definite
//! for `m > -4`. One generic implementation covers both working
//! precisions.

use num_complex::Complex;
use num_traits::Float;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

use crate::core::{DiracApply, DiracParams, FermionForce, FermionMatrix};
use crate::field::{Geometry, SpinorField};
use crate::parallel::{Comm, UniverseComm};

pub struct HoppingOperator<'c> {
    geom: Geometry,
    comm: &'c UniverseComm,
}

impl<'c> HoppingOperator<'c> {
    pub fn new(geom: Geometry, comm: &'c UniverseComm) -> Self {
        HoppingOperator { geom, comm }
    }

    /// `out = (diag + i mu) input - (1/2) sum of neighbours`, with the halo
    /// of `input` already refreshed.
    fn stencil<T: Float + Send + Sync>(
        &self,
        diag: f64,
        mu: f64,
        out: &mut SpinorField<T>,
        input: &SpinorField<T>,
    ) {
        let geom = &self.geom;
        let diag = Complex::new(
            T::from(diag).unwrap_or_else(T::zero),
            T::from(mu).unwrap_or_else(T::zero),
        );
        let half = T::from(0.5).unwrap_or_else(T::zero);
        let src = input.as_slice();

        let kernel = |idx: usize, o: &mut Complex<T>| {
            let mut hop = Complex::new(T::zero(), T::zero());
            for mu in 0..4 {
                hop = hop + src[geom.neighbor(idx, mu, true)] + src[geom.neighbor(idx, mu, false)];
            }
            *o = diag * src[idx] - hop.scale(half);
        };

        #[cfg(feature = "rayon")]
        out.interior_mut()
            .par_iter_mut()
            .enumerate()
            .for_each(|(idx, o)| kernel(idx, o));
        #[cfg(not(feature = "rayon"))]
        for (idx, o) in out.interior_mut().iter_mut().enumerate() {
            kernel(idx, o);
        }
    }
}

impl FermionMatrix for HoppingOperator<'_> {
    fn geometry(&self) -> &Geometry {
        &self.geom
    }

    fn comm(&self) -> &UniverseComm {
        self.comm
    }
}

impl<T: Float + Send + Sync> DiracApply<T> for HoppingOperator<'_> {
    fn apply(&self, params: DiracParams, out: &mut SpinorField<T>, input: &mut SpinorField<T>) {
        self.comm.exchange_halo(&self.geom, input.as_mut_slice());
        self.stencil(params.mass + 4.0, params.mu, out, input);
    }

    fn apply_dag(&self, params: DiracParams, out: &mut SpinorField<T>, input: &mut SpinorField<T>) {
        self.comm.exchange_halo(&self.geom, input.as_mut_slice());
        self.stencil(params.mass + 4.0, -params.mu, out, input);
    }

    fn apply_sq(&self, params: DiracParams, out: &mut SpinorField<T>, input: &mut SpinorField<T>) {
        let mut tmp = SpinorField::zeros(&self.geom);
        self.apply(params, &mut tmp, input);
        self.apply_dag(params, out, &mut tmp);
    }
}

impl FermionForce for HoppingOperator<'_> {
    /// One real component per site and direction, length `volume * 4`.
    type Momentum = Vec<f64>;

    fn add_force(
        &self,
        _params: DiracParams,
        mom: &mut Self::Momentum,
        coeff: f64,
        x: &mut SpinorField<f64>,
        y: &mut SpinorField<f64>,
    ) {
        assert_eq!(mom.len(), self.geom.volume() * 4, "momentum length mismatch");
        self.comm.exchange_halo(&self.geom, x.as_mut_slice());
        self.comm.exchange_halo(&self.geom, y.as_mut_slice());

        let xs = x.as_slice();
        let ys = y.as_slice();
        // derivative of the forward hopping term of the bilinear <y, Q x>
        for idx in 0..self.geom.volume() {
            for mu in 0..4 {
                let nbr = self.geom.neighbor(idx, mu, true);
                let f = (ys[idx].conj() * xs[nbr] + xs[idx].conj() * ys[nbr]).re;
                mom[idx * 4 + mu] += coeff * (-0.5) * f;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parallel::UniverseComm;
    use approx::assert_abs_diff_eq;

    fn setup() -> (Geometry, UniverseComm) {
        (Geometry::serial([4, 2, 2, 2]), UniverseComm::serial())
    }

    fn noise(geom: &Geometry, seed: u64) -> SpinorField<f64> {
        use crate::rng::{GaussianNoise, GaussianSampler};
        let mut f = SpinorField::zeros(geom);
        GaussianSampler::seeded(seed).draw_gaussian(&mut f);
        f
    }

    #[test]
    fn constant_mode_eigenvalue() {
        // a constant field is an eigenvector with eigenvalue m + 4 - 4 = m
        let (geom, comm) = setup();
        let op = HoppingOperator::new(geom.clone(), &comm);
        let params = DiracParams::with_mass(0.3);
        let mut input = SpinorField::zeros(&geom);
        for c in input.interior_mut() {
            *c = Complex::new(1.0, 0.0);
        }
        let mut out = SpinorField::zeros(&geom);
        op.apply(params, &mut out, &mut input);
        for c in out.interior() {
            assert_abs_diff_eq!(c.re, 0.3, epsilon = 1e-13);
            assert_abs_diff_eq!(c.im, 0.0, epsilon = 1e-13);
        }
    }

    #[test]
    fn adjoint_identity() {
        // <y, Q x> == <Q^dag y, x>
        let (geom, comm) = setup();
        let op = HoppingOperator::new(geom.clone(), &comm);
        let params = DiracParams::with_twist(0.2, 0.15);
        let mut x = noise(&geom, 1);
        let mut y = noise(&geom, 2);
        let mut qx = SpinorField::zeros(&geom);
        let mut qdy = SpinorField::zeros(&geom);
        op.apply(params, &mut qx, &mut x);
        op.apply_dag(params, &mut qdy, &mut y);
        let lhs = y.dot(&qx, &comm);
        let rhs = qdy.dot(&x, &comm);
        assert_abs_diff_eq!(lhs.re, rhs.re, epsilon = 1e-10);
        assert_abs_diff_eq!(lhs.im, rhs.im, epsilon = 1e-10);
    }

    #[test]
    fn normal_operator_is_positive() {
        let (geom, comm) = setup();
        let op = HoppingOperator::new(geom.clone(), &comm);
        let params = DiracParams::with_twist(0.1, 0.05);
        let mut x = noise(&geom, 3);
        let mut qqx = SpinorField::zeros(&geom);
        op.apply_sq(params, &mut qqx, &mut x);
        let quad = x.dot(&qqx, &comm);
        assert!(quad.re > 0.0);
        assert_abs_diff_eq!(quad.im, 0.0, epsilon = 1e-10);
    }

    #[test]
    fn halo_exchange_is_idempotent() {
        let (geom, comm) = setup();
        let mut f = noise(&geom, 4);
        comm.exchange_halo(&geom, f.as_mut_slice());
        let once = f.as_slice().to_vec();
        comm.exchange_halo(&geom, f.as_mut_slice());
        assert_eq!(f.as_slice(), &once[..]);
    }
}
