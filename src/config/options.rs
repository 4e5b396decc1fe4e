//! Per-monomial parameter block.
//!
//! One options struct serves every monomial variant; the fields a variant
//! does not use (`dmu` for a plain monomial, say) are simply ignored by it.

/// Parameters of one pseudofermion monomial.
#[derive(Clone, Copy, Debug)]
pub struct MonomialOptions {
    /// Bare fermion mass.
    pub mass: f64,
    /// Twisted-mass parameter of the operator (twisted variants).
    pub mu: f64,
    /// Hasenbusch shift in the twist (twisted Hasenbusch variant).
    pub dmu: f64,
    /// Hasenbusch shift in the mass (mass-split variant).
    pub dm: f64,
    /// Squared relative residual target for heatbath and action inversions.
    pub mt_prec: f64,
    /// Squared relative residual target for force inversions.
    pub force_prec: f64,
    /// Target for the low-precision phase of mixed-precision force solves.
    pub force_prec_flt: f64,
    /// Number of past force solutions kept for the chronological guess.
    pub mre_past: usize,
}

impl Default for MonomialOptions {
    fn default() -> Self {
        MonomialOptions {
            mass: 0.0,
            mu: 0.0,
            dmu: 0.0,
            dm: 0.0,
            mt_prec: 1e-14,
            force_prec: 1e-14,
            force_prec_flt: 1e-6,
            mre_past: 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_tight() {
        let opts = MonomialOptions::default();
        assert!(opts.mt_prec <= 1e-14);
        assert!(opts.force_prec_flt > opts.force_prec);
        assert_eq!(opts.mre_past, 2);
    }
}
