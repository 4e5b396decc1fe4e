//! Fermion fields over a decomposed lattice.
//!
//! A [`SpinorField`] is a dense array of complex components, one per site
//! of the local sub-lattice, followed by a two-slice halo region along the
//! decomposed (time) direction. The same layout is used at both working
//! precisions; [`SpinorField::assign_from`] converts between them.
//!
//! Linear-algebra kernels operate on the interior only; the halo exists for
//! operator stencils and is refreshed through [`Comm::exchange_halo`].
//! Inner products and norms accumulate locally in f64 and in a fixed order,
//! then reduce once through the communication layer, so results are
//! bit-reproducible for a fixed decomposition.

use num_complex::Complex;
use num_traits::Float;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

use crate::parallel::Comm;

/// Local sub-lattice extents plus the position of this partition in the
/// 1-D time-direction decomposition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Geometry {
    local: [usize; 4], // T X Y Z, T after decomposition
    np_t: usize,
    rank_t: usize,
}

impl Geometry {
    pub fn new(local: [usize; 4], np_t: usize, rank_t: usize) -> Self {
        assert!(local.iter().all(|&e| e > 0), "zero lattice extent");
        assert!(np_t >= 1 && rank_t < np_t, "invalid decomposition");
        Geometry { local, np_t, rank_t }
    }

    /// Single-partition geometry (one process owns the whole lattice).
    pub fn serial(local: [usize; 4]) -> Self {
        Self::new(local, 1, 0)
    }

    pub fn local_t(&self) -> usize {
        self.local[0]
    }

    pub fn global_t(&self) -> usize {
        self.local[0] * self.np_t
    }

    pub fn np_t(&self) -> usize {
        self.np_t
    }

    pub fn rank_t(&self) -> usize {
        self.rank_t
    }

    /// Sites in one time-slice.
    pub fn slice_vol(&self) -> usize {
        self.local[1] * self.local[2] * self.local[3]
    }

    /// Interior sites of the local sub-lattice.
    pub fn volume(&self) -> usize {
        self.local[0] * self.slice_vol()
    }

    /// Interior plus the two halo time-slices.
    pub fn field_len(&self) -> usize {
        self.volume() + 2 * self.slice_vol()
    }

    /// Linear index of a site. `t` may be `-1` (lower halo) or `local_t`
    /// (upper halo); the spatial coordinates must be in range.
    pub fn site(&self, t: isize, x: usize, y: usize, z: usize) -> usize {
        let [_, lx, ly, lz] = self.local;
        debug_assert!(x < lx && y < ly && z < lz);
        let xyz = (x * ly + y) * lz + z;
        if t == -1 {
            self.volume() + xyz
        } else if t == self.local[0] as isize {
            self.volume() + self.slice_vol() + xyz
        } else {
            debug_assert!(t >= 0 && (t as usize) < self.local[0]);
            t as usize * self.slice_vol() + xyz
        }
    }

    /// Coordinates of an interior site index.
    pub fn coords(&self, idx: usize) -> (usize, usize, usize, usize) {
        debug_assert!(idx < self.volume());
        let [_, _, ly, lz] = self.local;
        let sv = self.slice_vol();
        let t = idx / sv;
        let rem = idx % sv;
        let x = rem / (ly * lz);
        let y = (rem / lz) % ly;
        let z = rem % lz;
        (t, x, y, z)
    }

    /// Index of the neighbour of interior site `idx` in direction `mu`
    /// (0 = t, 1..3 spatial). Time neighbours at the partition boundary
    /// land in the halo; spatial directions are periodic within the
    /// partition (they are not decomposed).
    pub fn neighbor(&self, idx: usize, mu: usize, forward: bool) -> usize {
        let (t, x, y, z) = self.coords(idx);
        let [_, lx, ly, lz] = self.local;
        match mu {
            0 => {
                // site() maps t = -1 and t = local_t into the halo
                let tn = if forward { t as isize + 1 } else { t as isize - 1 };
                self.site(tn, x, y, z)
            }
            1 => {
                let xn = if forward { (x + 1) % lx } else { (x + lx - 1) % lx };
                self.site(t as isize, xn, y, z)
            }
            2 => {
                let yn = if forward { (y + 1) % ly } else { (y + ly - 1) % ly };
                self.site(t as isize, x, yn, z)
            }
            3 => {
                let zn = if forward { (z + 1) % lz } else { (z + lz - 1) % lz };
                self.site(t as isize, x, y, zn)
            }
            _ => panic!("direction out of range: {mu}"),
        }
    }
}

/// Dense complex field over a local sub-lattice plus halo.
#[derive(Clone, Debug)]
pub struct SpinorField<T> {
    data: Vec<Complex<T>>,
    geom: Geometry,
}

impl<T: Float + Send + Sync> SpinorField<T> {
    pub fn zeros(geom: &Geometry) -> Self {
        SpinorField {
            data: vec![Complex::new(T::zero(), T::zero()); geom.field_len()],
            geom: geom.clone(),
        }
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geom
    }

    /// Full storage, halo included (as the communication layer sees it).
    pub fn as_slice(&self) -> &[Complex<T>] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [Complex<T>] {
        &mut self.data
    }

    /// Interior sites only.
    pub fn interior(&self) -> &[Complex<T>] {
        &self.data[..self.geom.volume()]
    }

    pub fn interior_mut(&mut self) -> &mut [Complex<T>] {
        let vol = self.geom.volume();
        &mut self.data[..vol]
    }

    pub fn zero(&mut self) {
        let z = Complex::new(T::zero(), T::zero());
        for c in &mut self.data {
            *c = z;
        }
    }

    pub fn copy_from(&mut self, other: &Self) {
        assert_eq!(self.geom, other.geom, "field geometry mismatch");
        self.data.copy_from_slice(&other.data);
    }

    /// self += a * other (interior only).
    pub fn axpy(&mut self, a: Complex<T>, other: &Self) {
        assert_eq!(self.geom, other.geom, "field geometry mismatch");
        let vol = self.geom.volume();
        #[cfg(feature = "rayon")]
        {
            self.data[..vol]
                .par_iter_mut()
                .zip(other.data[..vol].par_iter())
                .for_each(|(s, o)| *s = *s + a * *o);
        }
        #[cfg(not(feature = "rayon"))]
        {
            for (s, o) in self.data[..vol].iter_mut().zip(&other.data[..vol]) {
                *s = *s + a * *o;
            }
        }
    }

    /// self += a * other with a real coefficient (interior only).
    pub fn mul_add_assign(&mut self, a: T, other: &Self) {
        assert_eq!(self.geom, other.geom, "field geometry mismatch");
        let vol = self.geom.volume();
        #[cfg(feature = "rayon")]
        {
            self.data[..vol]
                .par_iter_mut()
                .zip(other.data[..vol].par_iter())
                .for_each(|(s, o)| *s = *s + o.scale(a));
        }
        #[cfg(not(feature = "rayon"))]
        {
            for (s, o) in self.data[..vol].iter_mut().zip(&other.data[..vol]) {
                *s = *s + o.scale(a);
            }
        }
    }

    /// self *= a (interior only).
    pub fn scale(&mut self, a: T) {
        let vol = self.geom.volume();
        #[cfg(feature = "rayon")]
        {
            self.data[..vol].par_iter_mut().for_each(|s| *s = s.scale(a));
        }
        #[cfg(not(feature = "rayon"))]
        {
            for s in &mut self.data[..vol] {
                *s = s.scale(a);
            }
        }
    }

    /// self = a * self + b * other (interior only).
    pub fn lc_assign(&mut self, a: T, b: T, other: &Self) {
        assert_eq!(self.geom, other.geom, "field geometry mismatch");
        let vol = self.geom.volume();
        #[cfg(feature = "rayon")]
        {
            self.data[..vol]
                .par_iter_mut()
                .zip(other.data[..vol].par_iter())
                .for_each(|(s, o)| *s = s.scale(a) + o.scale(b));
        }
        #[cfg(not(feature = "rayon"))]
        {
            for (s, o) in self.data[..vol].iter_mut().zip(&other.data[..vol]) {
                *s = s.scale(a) + o.scale(b);
            }
        }
    }

    /// Local squared norm of the interior, accumulated in f64 in site order.
    pub fn sqnorm_local(&self) -> f64 {
        let mut acc = 0.0f64;
        for c in self.interior() {
            let re = c.re.to_f64().unwrap_or(0.0);
            let im = c.im.to_f64().unwrap_or(0.0);
            acc += re * re + im * im;
        }
        acc
    }

    /// Local inner product `<self, other>` (conjugate-linear in `self`),
    /// accumulated in f64 in site order.
    pub fn dot_local(&self, other: &Self) -> Complex<f64> {
        assert_eq!(self.geom, other.geom, "field geometry mismatch");
        let mut re = 0.0f64;
        let mut im = 0.0f64;
        for (a, b) in self.interior().iter().zip(other.interior()) {
            let ar = a.re.to_f64().unwrap_or(0.0);
            let ai = a.im.to_f64().unwrap_or(0.0);
            let br = b.re.to_f64().unwrap_or(0.0);
            let bi = b.im.to_f64().unwrap_or(0.0);
            re += ar * br + ai * bi;
            im += ar * bi - ai * br;
        }
        Complex::new(re, im)
    }

    /// Global squared norm (one reduction).
    pub fn sqnorm<C: Comm>(&self, comm: &C) -> f64 {
        comm.all_reduce(self.sqnorm_local())
    }

    /// Real part of the global inner product (one reduction).
    pub fn dot_re<C: Comm>(&self, other: &Self, comm: &C) -> f64 {
        comm.all_reduce(self.dot_local(other).re)
    }

    /// Global inner product (two reductions).
    pub fn dot<C: Comm>(&self, other: &Self, comm: &C) -> Complex<f64> {
        let local = self.dot_local(other);
        Complex::new(comm.all_reduce(local.re), comm.all_reduce(local.im))
    }

    /// Precision conversion, halo included.
    pub fn assign_from<S: Float + Send + Sync>(&mut self, other: &SpinorField<S>) {
        assert_eq!(self.geom, other.geom, "field geometry mismatch");
        for (dst, src) in self.data.iter_mut().zip(&other.data) {
            *dst = Complex::new(
                T::from(src.re.to_f64().unwrap_or(0.0)).unwrap_or_else(T::zero),
                T::from(src.im.to_f64().unwrap_or(0.0)).unwrap_or_else(T::zero),
            );
        }
    }

    /// Add `|psi(x)|^2` for every interior site into the caller's per-site
    /// accumulator. Never resets the accumulator.
    pub fn accumulate_site_action(&self, loc_action: &mut [f64]) {
        assert_eq!(loc_action.len(), self.geom.volume(), "accumulator length mismatch");
        for (acc, c) in loc_action.iter_mut().zip(self.interior()) {
            let re = c.re.to_f64().unwrap_or(0.0);
            let im = c.im.to_f64().unwrap_or(0.0);
            *acc += re * re + im * im;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parallel::UniverseComm;
    use approx::assert_abs_diff_eq;

    fn geom() -> Geometry {
        Geometry::serial([4, 2, 2, 2])
    }

    fn filled(geom: &Geometry, f: impl Fn(usize) -> (f64, f64)) -> SpinorField<f64> {
        let mut s = SpinorField::zeros(geom);
        for (i, c) in s.interior_mut().iter_mut().enumerate() {
            let (re, im) = f(i);
            *c = Complex::new(re, im);
        }
        s
    }

    #[test]
    fn geometry_sizes() {
        let g = geom();
        assert_eq!(g.volume(), 32);
        assert_eq!(g.slice_vol(), 8);
        assert_eq!(g.field_len(), 48);
        assert_eq!(g.global_t(), 4);
    }

    #[test]
    fn neighbor_wraps_into_halo_in_time() {
        let g = geom();
        let bottom = g.site(0, 1, 0, 1);
        let top = g.site(3, 1, 0, 1);
        assert!(g.neighbor(bottom, 0, false) >= g.volume());
        assert!(g.neighbor(top, 0, true) >= g.volume() + g.slice_vol());
        // spatial directions stay interior
        for mu in 1..4 {
            assert!(g.neighbor(bottom, mu, true) < g.volume());
            assert!(g.neighbor(bottom, mu, false) < g.volume());
        }
    }

    #[test]
    fn neighbor_is_involutive_in_space() {
        let g = geom();
        for idx in 0..g.volume() {
            for mu in 1..4 {
                let fwd = g.neighbor(idx, mu, true);
                assert_eq!(g.neighbor(fwd, mu, false), idx);
            }
        }
    }

    #[test]
    fn kernels_match_reference() {
        let g = geom();
        let mut a = filled(&g, |i| (i as f64, -(i as f64)));
        let b = filled(&g, |i| (1.0, 0.5 * i as f64));
        a.mul_add_assign(2.0, &b);
        assert_abs_diff_eq!(a.interior()[3].re, 3.0 + 2.0, epsilon = 1e-15);
        assert_abs_diff_eq!(a.interior()[3].im, -3.0 + 3.0, epsilon = 1e-15);

        let mut c = filled(&g, |i| (i as f64, 0.0));
        c.lc_assign(0.5, 2.0, &b);
        assert_abs_diff_eq!(c.interior()[4].re, 2.0 + 2.0, epsilon = 1e-15);
    }

    #[test]
    fn dot_is_conjugate_linear() {
        let g = geom();
        let comm = UniverseComm::serial();
        let a = filled(&g, |i| (i as f64 * 0.1, 0.2));
        let b = filled(&g, |i| (0.3, i as f64 * 0.05));
        let ab = a.dot(&b, &comm);
        let ba = b.dot(&a, &comm);
        assert_abs_diff_eq!(ab.re, ba.re, epsilon = 1e-12);
        assert_abs_diff_eq!(ab.im, -ba.im, epsilon = 1e-12);
        assert_abs_diff_eq!(a.dot(&a, &comm).im, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn precision_round_trip() {
        let g = geom();
        let a = filled(&g, |i| (i as f64 * 0.25, -0.5));
        let mut lo = SpinorField::<f32>::zeros(&g);
        lo.assign_from(&a);
        let mut back = SpinorField::<f64>::zeros(&g);
        back.assign_from(&lo);
        // exactly representable values survive the round trip
        for (x, y) in a.interior().iter().zip(back.interior()) {
            assert_eq!(x.re, y.re);
            assert_eq!(x.im, y.im);
        }
    }

    #[test]
    fn site_action_accumulates() {
        let g = geom();
        let a = filled(&g, |_| (1.0, 1.0));
        let mut loc = vec![0.5; g.volume()];
        a.accumulate_site_action(&mut loc);
        for v in &loc {
            assert_abs_diff_eq!(*v, 2.5, epsilon = 1e-15);
        }
    }
}
