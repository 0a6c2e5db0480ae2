//! Simulation benchmarks for siam_core.
//!
//! Run with: `cargo bench -p siam_core`

// Benchmark binaries don't need docs on macro-generated functions
#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};

use siam_core::combat::{calculate_damage, calculate_hit_chance, range_modifier};
use siam_core::commander::CommanderConfig;
use siam_core::math::Fixed;
use siam_test_utils::fixtures::{battle, skirmish};

/// Ticks of a pitched battle at several army sizes.
pub fn battle_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("battle_tick");
    for per_side in [8, 32, 128] {
        group.bench_with_input(BenchmarkId::from_parameter(per_side), &per_side, |b, &n| {
            b.iter_batched(
                || battle(1, n),
                |mut sim| {
                    for _ in 0..20 {
                        black_box(sim.tick());
                    }
                    sim
                },
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

/// One minute of game time with a commander, harvesting and production.
pub fn skirmish_benchmark(c: &mut Criterion) {
    c.bench_function("skirmish_1200_ticks", |b| {
        b.iter_batched(
            || skirmish(7, CommanderConfig::balanced()),
            |mut sim| {
                sim.run(1200);
                black_box(sim.state_hash())
            },
            BatchSize::SmallInput,
        );
    });
}

/// The per-strike formulas.
pub fn combat_benchmark(c: &mut Criterion) {
    let accuracy = Fixed::from_num(85);
    let damage = Fixed::from_num(12);
    let armor = Fixed::from_num(30);
    let max_range = Fixed::from_num(15);

    c.bench_function("strike_formulas", |b| {
        b.iter(|| {
            let distance = black_box(Fixed::from_num(9));
            let chance = calculate_hit_chance(accuracy, distance, false);
            let dealt = calculate_damage(damage, armor, range_modifier(distance, max_range));
            black_box((chance, dealt))
        });
    });
}

criterion_group!(benches, battle_benchmark, skirmish_benchmark, combat_benchmark);
criterion_main!(benches);
