/// MPI-based communication backend.
///
/// One MPI rank owns one sub-lattice partition; the time direction is
/// decomposed over a 1-D ring of ranks. Global reductions go through
/// `all_reduce_into`, halo slices travel as packed `f64` pairs so that the
/// same code path serves both working precisions.
///
/// Only available when the `mpi` feature is enabled.
use mpi::topology::SimpleCommunicator;
use mpi::traits::*;
use num_complex::Complex;
use num_traits::Float;

use crate::field::Geometry;

/// MPI communicator wrapper for distributed sub-lattices.
pub struct MpiComm {
    /// The MPI world communicator (all processes in the job).
    pub world: SimpleCommunicator,
    /// The rank (ID) of this process within the communicator.
    pub rank: usize,
    /// The total number of processes in the communicator.
    pub size: usize,
}

impl MpiComm {
    /// Initializes MPI and constructs a new `MpiComm` instance.
    ///
    /// # Panics
    /// Panics if MPI initialization fails.
    pub fn new() -> Self {
        let universe = mpi::initialize().unwrap();
        let world = universe.world();
        let rank = world.rank() as usize;
        let size = world.size() as usize;
        MpiComm { world, rank, size }
    }
}

/// Pack one time-slice of complex components into interleaved re/im pairs.
fn pack<T: Float>(slice: &[Complex<T>], out: &mut [f64]) {
    for (c, pair) in slice.iter().zip(out.chunks_exact_mut(2)) {
        pair[0] = c.re.to_f64().unwrap_or(0.0);
        pair[1] = c.im.to_f64().unwrap_or(0.0);
    }
}

fn unpack<T: Float>(buf: &[f64], out: &mut [Complex<T>]) {
    for (pair, c) in buf.chunks_exact(2).zip(out.iter_mut()) {
        *c = Complex::new(
            T::from(pair[0]).unwrap_or_else(T::zero),
            T::from(pair[1]).unwrap_or_else(T::zero),
        );
    }
}

impl super::Comm for MpiComm {
    fn rank(&self) -> usize {
        self.rank
    }
    fn size(&self) -> usize {
        self.size
    }
    fn barrier(&self) {
        self.world.barrier();
    }

    /// All-reduce sum across the process set.
    fn all_reduce(&self, x: f64) -> f64 {
        use mpi::collective::SystemOperation;
        let mut y = x;
        self.world.all_reduce_into(&x, &mut y, &SystemOperation::sum());
        y
    }

    /// Ring exchange of the two boundary time-slices along the decomposed
    /// direction. Every rank sends its top slice up / bottom slice down and
    /// receives the matching halo slices; `send_receive_into` keeps the
    /// pattern deadlock-free.
    fn exchange_halo<T: Float>(&self, geom: &Geometry, field: &mut [Complex<T>]) {
        if geom.np_t() == 1 {
            super::periodic_halo(geom, field);
            return;
        }
        assert_eq!(field.len(), geom.field_len(), "field does not match geometry");

        let sv = geom.slice_vol();
        let vol = geom.volume();
        let lt = geom.local_t();
        let up = ((geom.rank_t() + 1) % geom.np_t()) as i32;
        let down = ((geom.rank_t() + geom.np_t() - 1) % geom.np_t()) as i32;

        let mut send_top = vec![0.0f64; 2 * sv];
        let mut send_bottom = vec![0.0f64; 2 * sv];
        pack(&field[(lt - 1) * sv..vol], &mut send_top);
        pack(&field[0..sv], &mut send_bottom);

        let mut recv_lower = vec![0.0f64; 2 * sv];
        let mut recv_upper = vec![0.0f64; 2 * sv];

        // top slice -> upper neighbour's lower halo; receive ours from below
        mpi::point_to_point::send_receive_into(
            &send_top[..],
            &self.world.process_at_rank(up),
            &mut recv_lower[..],
            &self.world.process_at_rank(down),
        );
        // bottom slice -> lower neighbour's upper halo; receive ours from above
        mpi::point_to_point::send_receive_into(
            &send_bottom[..],
            &self.world.process_at_rank(down),
            &mut recv_upper[..],
            &self.world.process_at_rank(up),
        );

        unpack(&recv_lower, &mut field[vol..vol + sv]);
        unpack(&recv_upper, &mut field[vol + sv..vol + 2 * sv]);
    }
}
