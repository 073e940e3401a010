//! Turn loop benchmarks for tactics_core.
//!
//! Run with: `cargo bench -p tactics_core`

// Benchmark binaries don't need docs on macro-generated functions
#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use tactics_core::pathfinding::find_path;
use tactics_core::prelude::*;
use tactics_test_utils::determinism::advance_turn;
use tactics_test_utils::fixtures::skirmish;

/// A full skirmish played for 50 turns from a fixed seed.
pub fn skirmish_benchmark(c: &mut Criterion) {
    c.bench_function("skirmish_50_turns", |b| {
        b.iter(|| {
            let mut sim = skirmish(black_box(17));
            for _ in 0..50 {
                if advance_turn(&mut sim).is_terminal() {
                    break;
                }
            }
            black_box(sim.state_hash())
        })
    });
}

/// Path search across an open 64x64 floor with a long wall.
pub fn pathfinding_benchmark(c: &mut Criterion) {
    let mut map = TileMap::new(64, 64);
    for y in 0..60 {
        map.set(GridPos::new(32, y), CellType::Wall);
    }
    c.bench_function("find_path_64", |b| {
        b.iter(|| {
            find_path(black_box(GridPos::new(1, 1)), black_box(GridPos::new(62, 1)), |p| {
                map.is_passable(p)
            })
        })
    });
}

criterion_group!(benches, skirmish_benchmark, pathfinding_benchmark);
criterion_main!(benches);
