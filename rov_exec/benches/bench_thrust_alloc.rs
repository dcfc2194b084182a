//! # Thrust Allocation Benchmark

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use rov_lib::thrust_alloc::{build_mixing_matrix, Params, ThrustAlloc, ThrusterSpec, Wrench};

fn thrust_alloc_benchmark(c: &mut Criterion) {
    // ---- Build an 8 thruster vectored layout ----

    let h = std::f64::consts::FRAC_1_SQRT_2;
    let spec = |pos_m_vb: [f64; 3], dir_vb: [f64; 3]| ThrusterSpec { pos_m_vb, dir_vb };

    let thrusters = vec![
        spec([0.2, 0.15, 0.0], [h, -h, 0.0]),
        spec([0.2, -0.15, 0.0], [h, h, 0.0]),
        spec([-0.2, 0.15, 0.0], [h, h, 0.0]),
        spec([-0.2, -0.15, 0.0], [h, -h, 0.0]),
        spec([0.2, 0.15, 0.1], [0.0, 0.0, 1.0]),
        spec([0.2, -0.15, 0.1], [0.0, 0.0, 1.0]),
        spec([-0.2, 0.15, 0.1], [0.0, 0.0, 1.0]),
        spec([-0.2, -0.15, 0.1], [0.0, 0.0, 1.0]),
    ];

    let alloc = ThrustAlloc::new(&Params {
        thrusters: thrusters.clone(),
        ..Default::default()
    })
    .unwrap();

    let wrench = Wrench::new(0.3, -0.2, 0.5, 0.05, -0.1, 0.4);

    // ---- Benchmarks ----

    c.bench_function("build_mixing_matrix", |b| {
        b.iter(|| build_mixing_matrix(black_box(&thrusters)))
    });

    c.bench_function("allocate", |b| {
        b.iter(|| alloc.matrix().allocate(black_box(&wrench)))
    });

    c.bench_function("process", |b| b.iter(|| alloc.process(black_box(&wrench))));
}

criterion_group!(benches, thrust_alloc_benchmark);
criterion_main!(benches);
