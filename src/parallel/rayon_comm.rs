// rayon-based shared-memory backend: one partition, threaded field kernels

use num_complex::Complex;
use num_traits::Float;

use crate::field::Geometry;

pub struct RayonComm;

impl RayonComm {
    pub fn new() -> Self {
        rayon::ThreadPoolBuilder::new()
            .num_threads(num_cpus::get())
            .build_global()
            .ok();
        RayonComm
    }

    /// Worker threads available to the field kernels.
    pub fn threads(&self) -> usize {
        num_cpus::get()
    }
}

impl Default for RayonComm {
    fn default() -> Self {
        Self::new()
    }
}

impl super::Comm for RayonComm {
    fn rank(&self) -> usize {
        0
    }
    // One sub-lattice partition; threads are not ranks.
    fn size(&self) -> usize {
        1
    }
    fn barrier(&self) {
        rayon::scope(|_| {});
    }
    fn all_reduce(&self, x: f64) -> f64 {
        x // no-op for shared memory
    }
    fn exchange_halo<T: Float>(&self, geom: &Geometry, field: &mut [Complex<T>]) {
        super::periodic_halo(geom, field);
    }
}
