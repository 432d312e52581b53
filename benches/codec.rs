// benches/codec.rs
//! Content entry encode / decode throughput

use intunewin_rs::{decode, encode, CodecKeys, StreamConfig};

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;
use std::io::Cursor;

const KEY: [u8; 32] = [0x11; 32];
const MAC_KEY: [u8; 32] = [0x22; 32];
const IV: [u8; 16] = [0x33; 16];

// --- Size constants ---
const KB: usize = 1024;
const MB: usize = 1024 * 1024;

fn format_size(bytes: usize) -> String {
    if bytes >= MB {
        format!("{} MiB", bytes / MB)
    } else if bytes >= KB {
        format!("{} KiB", bytes / KB)
    } else {
        format!("{bytes} B")
    }
}

fn keys() -> CodecKeys<'static> {
    CodecKeys {
        encryption_key: &KEY,
        iv: &IV,
        mac_key: &MAC_KEY,
    }
}

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode");
    let config = StreamConfig::default();

    for &size in &[KB, 64 * KB, MB, 10 * MB] {
        let input = vec![0x41u8; size];

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::new("size", format_size(size)), &size, |b, _| {
            b.iter(|| {
                let mut out = Cursor::new(Vec::with_capacity(size + 64));
                let summary = encode(
                    &mut Cursor::new(black_box(&input)),
                    &mut out,
                    &keys(),
                    &config,
                )
                .unwrap();
                black_box(summary);
            });
        });
    }

    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");
    let config = StreamConfig::default();

    for &size in &[KB, 64 * KB, MB, 10 * MB] {
        let mut entry = Cursor::new(Vec::<u8>::new());
        encode(&mut Cursor::new(vec![0x41u8; size]), &mut entry, &keys(), &config).unwrap();
        let entry = entry.into_inner();

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::new("size", format_size(size)), &size, |b, _| {
            b.iter(|| {
                let mut plain = Vec::with_capacity(size);
                decode(
                    &mut Cursor::new(black_box(&entry)),
                    &mut plain,
                    &KEY,
                    &IV,
                    &config,
                )
                .unwrap();
                black_box(plain);
            });
        });
    }

    group.finish();
}

fn bench_chunk_sizes(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode_chunk_size");
    let input = vec![0x41u8; 4 * MB];
    group.throughput(Throughput::Bytes(input.len() as u64));

    for &chunk in &[4 * KB, 64 * KB, 512 * KB, 2 * MB] {
        let config = StreamConfig::default().with_chunk_size(chunk);
        group.bench_with_input(BenchmarkId::new("chunk", format_size(chunk)), &chunk, |b, _| {
            b.iter(|| {
                let mut out = Cursor::new(Vec::with_capacity(input.len() + 64));
                black_box(encode(&mut Cursor::new(&input), &mut out, &keys(), &config).unwrap());
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_encode, bench_decode, bench_chunk_sizes);
criterion_main!(benches);
