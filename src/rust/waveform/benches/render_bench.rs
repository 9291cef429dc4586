// Copyright 2025 Tiny Labs Inc
// SPDX-License-Identifier: Apache-2.0

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use siggen_units::seconds;
use std::hint::black_box;
use waveform::{CodeRange, Quantizer, TimeBase, Waveform, evaluate, harmonics};

/// Square wave approximation from the first `terms` odd harmonics.
fn odd_harmonics(terms: u32) -> Waveform {
    let series: Vec<(u32, f64)> = (0..terms)
        .map(|k| {
            let index = 2 * k + 1;
            (index, 1.0 / f64::from(index))
        })
        .collect();
    harmonics(seconds(1e-3), &series).unwrap()
}

fn bench_evaluate(c: &mut Criterion) {
    let depths = [1024, 16384, 262144];
    let wave = odd_harmonics(8);

    let mut group = c.benchmark_group("evaluate");

    for &depth in &depths {
        let time_base = TimeBase::new(seconds(1e-3), depth).unwrap();
        group.bench_with_input(BenchmarkId::new("harmonics", depth), &depth, |b, _| {
            b.iter(|| black_box(evaluate(&wave, &time_base).unwrap()));
        });
    }

    group.finish();
}

fn bench_quantize(c: &mut Criterion) {
    let depths = [1024, 16384, 262144];
    let wave = odd_harmonics(8);
    let quantizer = Quantizer::new(CodeRange::signed(16).unwrap(), 8.0, 10.0).unwrap();

    let mut group = c.benchmark_group("quantize");

    for &depth in &depths {
        let time_base = TimeBase::new(seconds(1e-3), depth).unwrap();
        let samples = evaluate(&wave, &time_base).unwrap();
        group.bench_with_input(BenchmarkId::new("signed16", depth), &depth, |b, _| {
            b.iter(|| black_box(quantizer.quantize(&samples)));
        });
    }

    group.finish();
}

fn bench_tree_size(c: &mut Criterion) {
    let time_base = TimeBase::new(seconds(1e-3), 16384).unwrap();

    let mut group = c.benchmark_group("tree_size");

    for terms in [1, 4, 16, 64] {
        let wave = odd_harmonics(terms);
        group.bench_with_input(BenchmarkId::new("odd_harmonics", terms), &terms, |b, _| {
            b.iter(|| black_box(evaluate(&wave, &time_base).unwrap()));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_evaluate, bench_quantize, bench_tree_size);
criterion_main!(benches);
