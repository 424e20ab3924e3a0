use std::thread;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use asyncdp_core::{Algorithm, CheckpointLog, RunConfig, SampleStyle, SharedValueStore};
use asyncdp_env::SailingOracle;
use asyncdp_solver::solve;

/// Compare-and-improve calls per thread in the contention benchmark
const UPDATES: usize = 20_000;

/// Measure write-lock contention on the shared store
fn bench_store_contention(c: &mut Criterion) {
    let mut group = c.benchmark_group("Store Contention");

    for threads in [1_usize, 2, 4, 8] {
        group.throughput(Throughput::Elements((threads * UPDATES) as u64));
        group.bench_with_input(BenchmarkId::from_parameter(threads), &threads, |b, &threads| {
            b.iter(|| {
                let store = SharedValueStore::new(512, 8);
                thread::scope(|scope| {
                    for worker in 0..threads {
                        let store = &store;
                        scope.spawn(move || {
                            for step in 0..UPDATES {
                                let state = (step * 31 + worker) % 512;
                                store.compare_and_improve(state, step as f64, worker % 8);
                            }
                        });
                    }
                });
                black_box(store.read(0));
            });
        });
    }
    group.finish();
}

/// Measure end-to-end solver throughput on a small sailing grid
fn bench_solvers(c: &mut Criterion) {
    let mut group = c.benchmark_group("Sailing Solvers");
    group.sample_size(10);

    let cases = [
        ("async-qvi", Algorithm::AsyncQvi, 4),
        ("q-learning", Algorithm::QLearning, 4),
        ("vrvi", Algorithm::Vrvi, 1),
    ];
    for (name, algorithm, threads) in cases {
        let config = RunConfig {
            algorithm,
            style: SampleStyle::Uniform,
            num_threads: threads,
            len_state: 8 * 10 * 10,
            len_action: 8,
            gamma: 0.95,
            max_outer_iter: if algorithm == Algorithm::Vrvi { 2 } else { 50_000 },
            max_inner_iter: if algorithm == Algorithm::Vrvi { 2 } else { 1 },
            check_step: 1_000_000,
            test_max_episode: 1,
            test_max_step: 1,
            seed: Some(7),
            ..RunConfig::default()
        };
        group.bench_function(name, |b| {
            b.iter(|| {
                let log = CheckpointLog::silent();
                let solution =
                    solve(&config, |id| SailingOracle::for_worker(&config, id), &log).unwrap();
                black_box(solution.iterations);
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_store_contention, bench_solvers);
criterion_main!(benches);
