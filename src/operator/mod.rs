//! Fermion operators.

pub mod hopping;

pub use hopping::HoppingOperator;
