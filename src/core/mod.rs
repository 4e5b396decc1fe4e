//! Core operator abstractions shared by the solver and monomial layers.

pub mod traits;

pub use traits::{DiracApply, DiracParams, FermionForce, FermionMatrix, HmcOperator};
