//! lathmc: pseudofermion monomials and multi-shift inverters for HMC
//!
//! This crate provides the fermionic building blocks of a Hybrid Monte
//! Carlo update: an additive monomial decomposition of the pseudofermion
//! action (plain, twisted-mass and Hasenbusch-split variants), the
//! multi-shift conjugate gradient family solver that powers them, a
//! mixed-precision defect-correction path, and a chronological initial
//! guess for the force inversions. Fields live on a 1-D decomposed
//! lattice with halo exchange behind a pluggable communication layer.

pub mod parallel;

pub mod config;
pub mod core;
pub mod error;
pub mod field;
pub mod monomial;
pub mod operator;
pub mod rng;
pub mod solver;
pub mod utils;

// Re-exports for convenience
pub use config::*;
pub use core::*;
pub use error::*;
pub use field::*;
pub use monomial::*;
pub use operator::*;
pub use rng::*;
pub use solver::*;

// Re-export SolveStats at the crate root for convenience
pub use utils::convergence::SolveStats;
