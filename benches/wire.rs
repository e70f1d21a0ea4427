//! Wire and Store Benchmarks for CacheDB
//!
//! Measures the frame decoder, reply encoding, and store operations.

use bytes::Bytes;
use cachedb::protocol::{FrameDecoder, Reply};
use cachedb::storage::Store;
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use std::sync::Arc;

/// Benchmark SET operations
fn bench_set(c: &mut Criterion) {
    let store = Arc::new(Store::new());

    let mut group = c.benchmark_group("set");
    group.throughput(Throughput::Elements(1));

    group.bench_function("set_small", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = Bytes::from(format!("key:{}", i));
            store.set(key, Bytes::from("small_value"));
            i += 1;
        });
    });

    group.bench_function("set_medium", |b| {
        let mut i = 0u64;
        let value = Bytes::from("x".repeat(1024)); // 1KB value
        b.iter(|| {
            let key = Bytes::from(format!("key:{}", i));
            store.set(key, value.clone());
            i += 1;
        });
    });

    group.finish();
}

/// Benchmark GET operations
fn bench_get(c: &mut Criterion) {
    let store = Arc::new(Store::new());

    // Pre-populate with data
    for i in 0..100_000 {
        let key = Bytes::from(format!("key:{}", i));
        let value = Bytes::from(format!("value:{}", i));
        store.set(key, value);
    }

    let mut group = c.benchmark_group("get");
    group.throughput(Throughput::Elements(1));

    group.bench_function("get_existing", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = format!("key:{}", i % 100_000);
            black_box(store.get(key.as_bytes()));
            i += 1;
        });
    });

    group.bench_function("get_missing", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = format!("missing:{}", i);
            black_box(store.get(key.as_bytes()));
            i += 1;
        });
    });

    group.finish();
}

/// Benchmark frame decoding
fn bench_decode(c: &mut Criterion) {
    let decoder = FrameDecoder::new();

    let mut group = c.benchmark_group("decode");
    group.throughput(Throughput::Elements(1));

    let ping = b"*1\r\n$4\r\nPING\r\n".to_vec();
    group.bench_function("decode_ping", |b| {
        b.iter(|| black_box(decoder.decode(&ping).unwrap()));
    });

    let set = b"*3\r\n$3\r\nSET\r\n$8\r\nuser:101\r\n$4\r\nAriz\r\n".to_vec();
    group.bench_function("decode_set", |b| {
        b.iter(|| black_box(decoder.decode(&set).unwrap()));
    });

    let mut large = format!("*3\r\n$3\r\nSET\r\n$3\r\nbig\r\n${}\r\n", 64 * 1024).into_bytes();
    large.extend(std::iter::repeat(b'x').take(64 * 1024));
    large.extend_from_slice(b"\r\n");
    group.bench_function("decode_set_64k_value", |b| {
        b.iter(|| black_box(decoder.decode(&large).unwrap()));
    });

    group.finish();
}

/// Benchmark reply encoding
fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode");
    group.throughput(Throughput::Elements(1));

    group.bench_function("encode_ok", |b| {
        b.iter(|| black_box(Reply::ok().encode()));
    });

    let value = Bytes::from("x".repeat(1024));
    group.bench_function("encode_bulk_1k", |b| {
        b.iter(|| black_box(Reply::bulk(value.clone()).encode()));
    });

    group.finish();
}

criterion_group!(benches, bench_set, bench_get, bench_decode, bench_encode);
criterion_main!(benches);
