//! Pseudofermion monomials: the additive fermion terms of the HMC action.
//!
//! Every monomial owns one pseudofermion field and answers the same small
//! protocol the trajectory driver speaks: allocate trajectory workspace,
//! draw heatbath noise, map the noise to the distribution its action
//! defines (`correct_pf`), map back for the accept/reject energy
//! (`correct_la_pf`), expose per-site action density, and accumulate its
//! molecular-dynamics force. Workspace is shared between all monomials of
//! the same kind; a monomial's own field dies with it (plain `Drop`), the
//! shared workspace does not.

pub mod hasenbusch;
pub mod hasenbusch_tm;
pub mod plain;
pub mod registry;
pub mod tm;

pub use hasenbusch::HasenbuschMonomial;
pub use hasenbusch_tm::HasenbuschTmMonomial;
pub use plain::PlainMonomial;
pub use registry::MonomialRegistry;
pub use tm::TmMonomial;

use crate::config::MonomialOptions;
use crate::core::{DiracApply, DiracParams, FermionMatrix, HmcOperator};
use crate::error::HmcError;
use crate::field::{Geometry, SpinorField};
use crate::rng::GaussianNoise;
use crate::solver::{ChronoGuess, MshiftSolver};

/// Monomial variants, used as the key for shared workspace.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MonomialKind {
    Plain,
    TwistedMass,
    Hasenbusch,
    HasenbuschTwistedMass,
}

/// Trajectory workspace shared by all monomials of one kind.
#[derive(Default)]
pub struct Scratch {
    field: Option<SpinorField<f64>>,
}

impl Scratch {
    /// Allocate on first use; later calls return the same field.
    pub fn ensure(&mut self, geom: &Geometry) -> &mut SpinorField<f64> {
        self.field.get_or_insert_with(|| SpinorField::zeros(geom))
    }
}

/// One additive term of the fermion action.
///
/// All fallible operations report the inverter iterations they spent; a
/// non-converging inversion during heatbath or accept/reject is fatal to
/// the trajectory and surfaces as an error here.
pub trait Monomial<O: HmcOperator> {
    fn kind(&self) -> MonomialKind;

    /// Prepare trajectory workspace. Idempotent.
    fn init_traj(&mut self, op: &O, scratch: &mut Scratch);

    /// Overwrite the pseudofermion with heatbath noise.
    fn gaussian_pf(&mut self, noise: &mut dyn GaussianNoise);

    /// Map the freshly drawn noise to this monomial's distribution.
    fn correct_pf(&mut self, op: &O, scratch: &mut Scratch) -> Result<usize, HmcError>;

    /// Inverse map, leaving the pseudofermion so that its squared norm is
    /// the monomial's action.
    fn correct_la_pf(&mut self, op: &O, scratch: &mut Scratch) -> Result<usize, HmcError>;

    fn pseudofermion(&self) -> &SpinorField<f64>;

    /// Add the per-site action density into the caller's accumulator.
    fn add_local_action(&self, loc_action: &mut [f64]);

    /// Accumulate this monomial's force (minus the action gradient) into
    /// `mom`.
    fn force(&mut self, op: &O, scratch: &mut Scratch, mom: &mut O::Momentum)
        -> Result<usize, HmcError>;
}

/// `x = Q(params)^{-1} b` through the normal equations: one adjoint
/// application followed by a zero-shift solve on `Q^dag Q`. Used by the
/// heatbath and accept/reject maps, where failing to converge is fatal.
pub(crate) fn invert_q<O: DiracApply<f64>>(
    op: &O,
    params: DiracParams,
    err2: f64,
    b: &mut SpinorField<f64>,
    x: &mut SpinorField<f64>,
) -> Result<usize, HmcError> {
    let mut qdb = SpinorField::zeros(op.geometry());
    op.apply_dag(params, &mut qdb, b);
    let stats = MshiftSolver::new(err2, 0).solve(op, params, &[0.0], &qdb, std::slice::from_mut(x));
    if stats.converged {
        Ok(stats.iterations)
    } else {
        Err(HmcError::NotConverged {
            iterations: stats.iterations,
            final_res2: stats.final_res2,
        })
    }
}

/// Force-grade solve of `Q^dag Q x = b`: chronological guess, then a
/// mixed-precision defect-corrected solve of the remaining residual, then
/// record the solution in the history.
pub(crate) fn chrono_force_solve<O: HmcOperator>(
    op: &O,
    params: DiracParams,
    opts: &MonomialOptions,
    chrono: &mut ChronoGuess,
    b: &SpinorField<f64>,
    x: &mut SpinorField<f64>,
) -> Result<usize, HmcError> {
    let comm = op.comm();
    let geom = op.geometry();

    let bsq = b.sqnorm(comm);
    if bsq == 0.0 {
        x.zero();
        return Ok(0);
    }

    chrono.guess(op, params, b, x);
    let mut ax = SpinorField::zeros(geom);
    <O as DiracApply<f64>>::apply_sq(op, params, &mut ax, x);
    let mut r = b.clone();
    r.mul_add_assign(-1.0, &ax);
    let rsq = r.sqnorm(comm);
    if rsq <= opts.force_prec * bsq {
        chrono.push(x);
        return Ok(0);
    }

    // correction tolerance rescaled so the final solution meets
    // force_prec relative to b
    let solver = MshiftSolver::new(opts.force_prec * bsq / rsq, 0);
    let mut e = SpinorField::zeros(geom);
    let stats = solver.solve_mixed(
        op,
        params,
        &[0.0],
        &r,
        std::slice::from_mut(&mut e),
        opts.force_prec_flt,
    );
    x.mul_add_assign(1.0, &e);
    chrono.push(x);
    if stats.converged {
        Ok(stats.iterations)
    } else {
        Err(HmcError::NotConverged {
            iterations: stats.iterations,
            final_res2: stats.final_res2,
        })
    }
}
