//! Benchmarks for sample table lookups.
//!
//! Measures chunk, offset and time resolution on a synthetic track with a
//! multi-row sample-to-chunk table.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use nalcast_media::fixture::{build_file, length_prefixed, FixtureTrack};
use nalcast_media::{Container, ParseOptions};

const SAMPLES: usize = 3000;

fn container() -> Container {
    let samples: Vec<Vec<u8>> = (0..SAMPLES)
        .map(|i| {
            let slice = vec![0x41; 32 + i % 64];
            length_prefixed(&[&[0x09, 0xF0], &slice])
        })
        .collect();

    // Runs of 10, 5 and then 1 sample per chunk.
    let video = FixtureTrack::video(1, samples)
        .with_stsc(vec![(1, 10, 1), (101, 5, 1), (301, 1, 1)])
        .with_sync_samples(Some((1..=SAMPLES as u32).step_by(30).collect()));
    Container::parse(build_file(&[video]), ParseOptions::default()).unwrap()
}

fn bench_sample_to_chunk(c: &mut Criterion) {
    let container = container();
    let track = container.track(1).unwrap();
    let mut group = c.benchmark_group("sample_to_chunk");

    for sample in [0u32, 1500, SAMPLES as u32 - 1] {
        group.bench_with_input(BenchmarkId::from_parameter(sample), &sample, |b, &s| {
            b.iter(|| track.sample_to_chunk(black_box(s)).unwrap());
        });
    }
    group.finish();
}

fn bench_sample_to_offset(c: &mut Criterion) {
    let container = container();
    let track = container.track(1).unwrap();
    let mut group = c.benchmark_group("sample_to_offset");

    for sample in [0u32, 1500, SAMPLES as u32 - 1] {
        group.bench_with_input(BenchmarkId::from_parameter(sample), &sample, |b, &s| {
            b.iter(|| track.sample_to_offset(black_box(s)).unwrap());
        });
    }
    group.finish();
}

fn bench_lookups(c: &mut Criterion) {
    let container = container();
    let track = container.track(1).unwrap();
    let mut group = c.benchmark_group("track_lookups");

    group.bench_function("time_to_sample", |b| {
        b.iter(|| track.time_to_sample(black_box(60_000)).unwrap());
    });
    group.bench_function("sync_sample_at_or_before", |b| {
        b.iter(|| track.sync_sample_at_or_before(black_box(2999)).unwrap());
    });
    group.bench_function("sample_nal_units", |b| {
        b.iter(|| track.sample_nal_units(black_box(2000)).unwrap());
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_sample_to_chunk,
    bench_sample_to_offset,
    bench_lookups
);
criterion_main!(benches);
