//! Benchmarks for vote tallying
//!
//! Run with: cargo bench -p veritas-consensus

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use veritas_consensus::{tally, Ballot};
use veritas_core::VotingStrategy;

fn generate_ballots(n: usize) -> Vec<Ballot> {
    (0..n)
        .map(|i| {
            let x = (i as f64 * 0.618).fract();
            Ballot::new(format!("judge-{:03}", i), x, 1.0 - x / 2.0, 0.5 + x)
        })
        .collect()
}

fn bench_strategies(c: &mut Criterion) {
    let ballots = generate_ballots(5);
    let strategies = [
        VotingStrategy::Majority,
        VotingStrategy::weighted(),
        VotingStrategy::Unanimous,
        VotingStrategy::Threshold { fraction: 0.6 },
    ];

    let mut group = c.benchmark_group("tally_5_judges");
    for strategy in strategies.iter() {
        group.bench_with_input(BenchmarkId::from_parameter(strategy.name()), strategy, |b, s| {
            b.iter(|| black_box(tally(s, &ballots)))
        });
    }
    group.finish();
}

fn bench_panel_size(c: &mut Criterion) {
    let mut group = c.benchmark_group("weighted_tally");
    for size in [3, 10, 100].iter() {
        let ballots = generate_ballots(*size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &ballots, |b, ballots| {
            b.iter(|| black_box(tally(&VotingStrategy::weighted(), ballots)))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_strategies, bench_panel_size);
criterion_main!(benches);
