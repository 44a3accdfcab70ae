//! Seek latency benchmarks.
//!
//! Measures playhead moves against a settled cache. Each iteration seeks away
//! and back so the cache stays in the same shape across iterations.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use rewind::{Frame, SaveSystem, SaveSystemConfig, TickBudget};
use rewind_sim::{InputGenerator, SimEngine, SimSaveSystem};

const FRAMES: u64 = 5000;
const HOME: Frame = Frame::new(FRAMES / 2);

fn settled_system(state_len: usize) -> SimSaveSystem {
    let engine = SimEngine::power_on(7, state_len).unwrap();
    let inputs = InputGenerator::new(7).timeline(FRAMES);
    let config = SaveSystemConfig::default()
        .with_global_budget(128 * state_len as u64)
        .with_block_budget(64 * state_len as u64)
        .with_tick_budget(TickBudget::Steps(5000))
        .with_lookahead(0);
    let mut system = SaveSystem::new(engine, inputs, config).unwrap();
    system.set_current_frame(HOME).unwrap();
    while system.tick().unwrap().progress < 1.0 {}
    system
}

// ============================================================================
// Seek Benchmarks
// ============================================================================

fn bench_frame_step_back(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame_step_back");

    for state_len in [256, 4096, 65536] {
        group.throughput(Throughput::Bytes(state_len as u64));
        let mut system = settled_system(state_len);
        let back = Frame::new(FRAMES / 2 - 1);

        group.bench_with_input(BenchmarkId::from_parameter(state_len), &state_len, |b, _| {
            b.iter(|| {
                system.set_current_frame(black_box(back)).unwrap();
                system.set_current_frame(black_box(HOME)).unwrap();
            });
        });
    }

    group.finish();
}

fn bench_seek_distance(c: &mut Criterion) {
    let mut group = c.benchmark_group("seek_distance");
    let mut system = settled_system(4096);

    for distance in [10u64, 100, 1000] {
        let target = Frame::new(FRAMES / 2 - distance);
        group.bench_with_input(BenchmarkId::from_parameter(distance), &distance, |b, _| {
            b.iter(|| {
                system.set_current_frame(black_box(target)).unwrap();
                system.set_current_frame(black_box(HOME)).unwrap();
            });
        });
    }

    group.finish();
}

// ============================================================================
// Rebuild Benchmarks
// ============================================================================

fn bench_idle_tick(c: &mut Criterion) {
    let mut system = settled_system(4096);

    c.bench_function("idle_tick", |b| {
        b.iter(|| black_box(system.tick().unwrap()));
    });
}

criterion_group!(benches, bench_frame_step_back, bench_seek_distance, bench_idle_tick);
criterion_main!(benches);
