//! Krylov inverters for the Hermitian normal operator `Q^dag Q`.
//!
//! [`CgSolver`] handles a single (possibly shifted) system with an
//! arbitrary initial guess; [`MshiftSolver`] solves a whole family
//! `(Q^dag Q + sigma_k) x_k = b` in one Krylov pass and drives the
//! mixed-precision path; [`ChronoGuess`] seeds force solves from the
//! trajectory history.

pub mod cg;
pub mod cg_mshift;
pub mod mre;

pub use cg::CgSolver;
pub use cg_mshift::MshiftSolver;
pub use mre::ChronoGuess;
