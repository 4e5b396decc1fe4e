//! Process-set communication layer.
//!
//! The solver and monomial layers are data-parallel over a fixed set of
//! cooperating processes, each owning one sub-lattice partition. Everything
//! they need from the communications layer is captured by the [`Comm`]
//! trait: global reductions (one per inner product or norm) and the halo
//! exchange issued by every operator application. Both are synchronization
//! points: all processes must reach them in the same order and the same
//! number of times, or the program deadlocks. A failed reduction or
//! exchange is fatal to the whole process group; no retry model exists at
//! this layer.

use num_complex::Complex;
use num_traits::Float;

use crate::field::Geometry;

pub trait Comm {
    fn rank(&self) -> usize;
    fn size(&self) -> usize;
    fn barrier(&self);
    /// Global sum of `x` over the process set.
    fn all_reduce(&self, x: f64) -> f64;
    /// Refresh the two halo time-slices of `field` from the neighbouring
    /// sub-lattices. Idempotent: exchanging twice leaves the field
    /// bit-identical.
    fn exchange_halo<T: Float>(&self, geom: &Geometry, field: &mut [Complex<T>]);
}

/// Halo refresh for a single-partition (shared-memory) layout: the lattice
/// is periodic in time, so both halo slices come from the local interior.
pub(crate) fn periodic_halo<T: Float>(geom: &Geometry, field: &mut [Complex<T>]) {
    let sv = geom.slice_vol();
    let vol = geom.volume();
    let lt = geom.local_t();
    assert_eq!(field.len(), geom.field_len(), "field does not match geometry");
    // lower halo (t = -1) <- top interior slice
    field.copy_within((lt - 1) * sv..vol, vol);
    // upper halo (t = local_t) <- bottom interior slice
    field.copy_within(0..sv, vol + sv);
}

#[cfg(feature = "mpi")]
pub mod mpi_comm;
#[cfg(feature = "mpi")]
pub use mpi_comm::MpiComm;

#[cfg(feature = "rayon")]
pub mod rayon_comm;
#[cfg(feature = "rayon")]
pub use rayon_comm::RayonComm;

pub enum UniverseComm {
    Serial,
    #[cfg(feature = "rayon")]
    Rayon(RayonComm),
    #[cfg(feature = "mpi")]
    Mpi(MpiComm),
}

impl UniverseComm {
    /// Single process, single thread.
    pub fn serial() -> Self {
        UniverseComm::Serial
    }

    /// Single process, Rayon-threaded field kernels.
    #[cfg(feature = "rayon")]
    pub fn shared() -> Self {
        UniverseComm::Rayon(RayonComm::new())
    }

    /// One MPI rank per sub-lattice partition.
    #[cfg(feature = "mpi")]
    pub fn distributed() -> Self {
        UniverseComm::Mpi(MpiComm::new())
    }
}

impl Comm for UniverseComm {
    fn rank(&self) -> usize {
        match self {
            UniverseComm::Serial => 0,
            #[cfg(feature = "rayon")]
            UniverseComm::Rayon(comm) => comm.rank(),
            #[cfg(feature = "mpi")]
            UniverseComm::Mpi(comm) => comm.rank(),
        }
    }

    fn size(&self) -> usize {
        match self {
            UniverseComm::Serial => 1,
            #[cfg(feature = "rayon")]
            UniverseComm::Rayon(comm) => comm.size(),
            #[cfg(feature = "mpi")]
            UniverseComm::Mpi(comm) => comm.size(),
        }
    }

    fn barrier(&self) {
        match self {
            UniverseComm::Serial => {}
            #[cfg(feature = "rayon")]
            UniverseComm::Rayon(comm) => comm.barrier(),
            #[cfg(feature = "mpi")]
            UniverseComm::Mpi(comm) => comm.barrier(),
        }
    }

    fn all_reduce(&self, x: f64) -> f64 {
        match self {
            UniverseComm::Serial => x,
            #[cfg(feature = "rayon")]
            UniverseComm::Rayon(comm) => comm.all_reduce(x),
            #[cfg(feature = "mpi")]
            UniverseComm::Mpi(comm) => comm.all_reduce(x),
        }
    }

    fn exchange_halo<T: Float>(&self, geom: &Geometry, field: &mut [Complex<T>]) {
        match self {
            UniverseComm::Serial => periodic_halo(geom, field),
            #[cfg(feature = "rayon")]
            UniverseComm::Rayon(comm) => comm.exchange_halo(geom, field),
            #[cfg(feature = "mpi")]
            UniverseComm::Mpi(comm) => comm.exchange_halo(geom, field),
        }
    }
}
