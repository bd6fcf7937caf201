//! Time module benchmarks
//!
//! Benchmarks cover duration parsing/formatting to ensure the time module
//! stays performant on the synchronizer's hot paths (retry backoff
//! computation, audit timestamp formatting).
//!
//! Run with: `cargo bench --bench time_bench -p forgesheet-common --features
//! runtime`

use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use forgesheet_common::time::duration::{parse_duration, parse_duration_ms};
use forgesheet_common::time::format::{
    format_duration, format_duration_compact, format_duration_ms, format_duration_verbose,
};

type ParseScenario = (&'static str, &'static [&'static str]);

// -----------------------------------------------------------------------------
// Duration parsing benchmarks
// -----------------------------------------------------------------------------

fn bench_duration_parsing(c: &mut Criterion) {
    const SIMPLE_INPUTS: &[&str] = &["5s", "30s", "10m", "2h", "3d", "1w"];
    const COMPOUND_INPUTS: &[&str] = &["1h 30m", "2h 15m 30s", "3d 4h 5m", "6h 45m", "12h 5m 30s"];
    const FRACTIONAL_INPUTS: &[&str] = &["1.5s", "2.25m", "0.5h", "1.75d"];
    const MILLIS_INPUTS: &[&str] = &["500ms", "1s 250ms", "2m 15s 10ms", "750ms"];
    const MICROS_INPUTS: &[&str] = &["100us", "250us", "999us", "1s 500us"];
    const INVALID_INPUTS: &[&str] = &["", "5", "abc", "60x", "1h20"];

    let mut group = c.benchmark_group("duration_parsing");

    let parse_scenarios: &[ParseScenario] = &[
        ("simple", SIMPLE_INPUTS),
        ("compound", COMPOUND_INPUTS),
        ("fractional", FRACTIONAL_INPUTS),
    ];

    for (name, inputs) in parse_scenarios {
        group.throughput(Throughput::Elements(inputs.len() as u64));
        group.bench_with_input(BenchmarkId::new("parse_duration", *name), inputs, |b, inputs| {
            b.iter(|| {
                for &input in (*inputs).iter() {
                    black_box(parse_duration(black_box(input)).unwrap());
                }
            });
        });
    }

    let parse_ms_scenarios: &[ParseScenario] =
        &[("millis", MILLIS_INPUTS), ("micros", MICROS_INPUTS)];

    for (name, inputs) in parse_ms_scenarios {
        group.throughput(Throughput::Elements(inputs.len() as u64));
        group.bench_with_input(
            BenchmarkId::new("parse_duration_ms", *name),
            inputs,
            |b, inputs| {
                b.iter(|| {
                    for &input in (*inputs).iter() {
                        black_box(parse_duration_ms(black_box(input)).unwrap());
                    }
                });
            },
        );
    }

    group.bench_with_input(
        BenchmarkId::new("parse_duration", "invalid_inputs"),
        INVALID_INPUTS,
        |b, inputs| {
            b.iter(|| {
                for &input in (*inputs).iter() {
                    let err = parse_duration(black_box(input)).unwrap_err();
                    black_box(err);
                }
            });
        },
    );

    group.finish();
}

// -----------------------------------------------------------------------------
// Duration formatting benchmarks
// -----------------------------------------------------------------------------

fn bench_duration_formatting(c: &mut Criterion) {
    let mut group = c.benchmark_group("duration_formatting");

    let canonical_durations = vec![
        Duration::from_micros(250),
        Duration::from_millis(1),
        Duration::from_millis(275),
        Duration::from_secs(45),
        Duration::from_secs(65),
        Duration::from_secs(3665),
        Duration::from_secs(172_801),
    ];

    let ms_precision = vec![
        Duration::from_millis(5),
        Duration::from_millis(125),
        Duration::from_secs(1) + Duration::from_millis(500),
        Duration::from_secs(61) + Duration::from_millis(275),
    ];

    group.throughput(Throughput::Elements(canonical_durations.len() as u64));
    group.bench_function("format_standard", |b| {
        b.iter(|| {
            for duration in &canonical_durations {
                black_box(format_duration(black_box(*duration)));
            }
        });
    });

    group.throughput(Throughput::Elements(ms_precision.len() as u64));
    group.bench_function("format_ms_precision", |b| {
        b.iter(|| {
            for duration in &ms_precision {
                black_box(format_duration_ms(black_box(*duration)));
            }
        });
    });

    group.throughput(Throughput::Elements(canonical_durations.len() as u64));
    group.bench_function("format_compact", |b| {
        b.iter(|| {
            for duration in &canonical_durations {
                black_box(format_duration_compact(black_box(*duration)));
            }
        });
    });

    group.throughput(Throughput::Elements(canonical_durations.len() as u64));
    group.bench_function("format_verbose", |b| {
        b.iter(|| {
            for duration in &canonical_durations {
                black_box(format_duration_verbose(black_box(*duration)));
            }
        });
    });

    group.finish();
}

criterion_group!(time_benches, bench_duration_parsing, bench_duration_formatting);
criterion_main!(time_benches);
