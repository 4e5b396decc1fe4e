//! Shared utilities for the solver and monomial layers.

pub mod convergence;
