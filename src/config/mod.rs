//! Run-time configuration for monomials and their inverters.

pub mod options;

pub use options::MonomialOptions;
