//! Family solve against repeated single-shift CG on a small lattice.

use criterion::{criterion_group, criterion_main, Criterion};

use lathmc::core::DiracParams;
use lathmc::field::{Geometry, SpinorField};
use lathmc::operator::HoppingOperator;
use lathmc::parallel::UniverseComm;
use lathmc::rng::{GaussianNoise, GaussianSampler};
use lathmc::solver::{CgSolver, MshiftSolver};

const SHIFTS: [f64; 6] = [0.0, -0.1, -0.2, 0.1, 0.2, 0.3];

fn bench_mshift(c: &mut Criterion) {
    let geom = Geometry::serial([4, 4, 4, 4]);
    let comm = UniverseComm::serial();
    let op = HoppingOperator::new(geom.clone(), &comm);
    let params = DiracParams::with_twist(0.3, 0.5);
    let mut b = SpinorField::zeros(&geom);
    GaussianSampler::seeded(1).draw_gaussian(&mut b);

    let mut group = c.benchmark_group("shifted_family");

    group.bench_function("multi_shift", |bench| {
        let solver = MshiftSolver::new(1e-20, 0);
        let mut xs: Vec<SpinorField<f64>> =
            (0..SHIFTS.len()).map(|_| SpinorField::zeros(&geom)).collect();
        bench.iter(|| solver.solve(&op, params, &SHIFTS, &b, &mut xs));
    });

    group.bench_function("per_shift_cg", |bench| {
        let solver = CgSolver::new(1e-20, 0);
        let mut x = SpinorField::zeros(&geom);
        bench.iter(|| {
            for sigma in SHIFTS {
                x.zero();
                solver.solve(&op, params, sigma, &b, &mut x);
            }
        });
    });

    group.finish();
}

criterion_group!(benches, bench_mshift);
criterion_main!(benches);
