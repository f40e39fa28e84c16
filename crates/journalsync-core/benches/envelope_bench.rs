//! Benchmarks for the payload codec and merge
//!
//! Run with: cargo bench -p journalsync-core
//!
//! These benchmarks establish performance baselines for:
//! - Raw AEAD encrypt/decrypt at several payload sizes
//! - Entry pack/unpack with and without embeddings
//! - Last-write-wins merge of a remote batch

use std::collections::HashMap;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use journalsync_core::crypto::PayloadCrypto;
use journalsync_core::sync::{last_write_wins_merge, pack_entry, unpack_entry};
use journalsync_core::{ChangeRecord, ContentKey, EntrySnapshot};

// ============================================================================
// AEAD Benchmarks
// ============================================================================

fn bench_aead(c: &mut Criterion) {
    let crypto = PayloadCrypto::new(&PayloadCrypto::generate_key());
    let mut group = c.benchmark_group("aead");

    for size in [64usize, 1024, 16 * 1024, 256 * 1024] {
        let data = vec![0x42u8; size];
        let payload = crypto.encrypt(&data).unwrap();
        group.throughput(Throughput::Bytes(size as u64));

        group.bench_with_input(BenchmarkId::new("encrypt", size), &data, |b, data| {
            b.iter(|| black_box(crypto.encrypt(data).unwrap()))
        });
        group.bench_with_input(BenchmarkId::new("decrypt", size), &payload, |b, payload| {
            b.iter(|| black_box(crypto.decrypt(payload).unwrap()))
        });
    }

    group.finish();
}

// ============================================================================
// Envelope Benchmarks
// ============================================================================

fn sample_change(embedding_len: usize) -> ChangeRecord {
    let entry = EntrySnapshot::with_text("e1", "Quiet morning, coffee on the balcony. ".repeat(20));
    let change = ChangeRecord::upsert("e1", 1_700_000_000_000, entry);
    if embedding_len == 0 {
        change
    } else {
        change.with_embedding(vec![0.125; embedding_len])
    }
}

fn bench_envelope(c: &mut Criterion) {
    let key = ContentKey::generate();
    let mut group = c.benchmark_group("envelope");

    for embedding_len in [0usize, 384, 1536] {
        let change = sample_change(embedding_len);
        let payload = pack_entry(&change, &key).unwrap();

        group.bench_with_input(
            BenchmarkId::new("pack", embedding_len),
            &change,
            |b, change| b.iter(|| black_box(pack_entry(change, &key).unwrap())),
        );
        group.bench_with_input(
            BenchmarkId::new("unpack", embedding_len),
            &payload,
            |b, payload| b.iter(|| black_box(unpack_entry(payload, "c1", "e1", &key).unwrap())),
        );
    }

    group.finish();
}

// ============================================================================
// Merge Benchmarks
// ============================================================================

fn bench_merge(c: &mut Criterion) {
    let mut group = c.benchmark_group("merge");

    for count in [100usize, 1000] {
        let local: HashMap<String, ChangeRecord> = (0..count)
            .map(|i| {
                let id = format!("e{}", i);
                (id.clone(), ChangeRecord::upsert(&id, 100, EntrySnapshot::default()))
            })
            .collect();
        let remote: Vec<ChangeRecord> = (0..count)
            .map(|i| {
                let id = format!("e{}", i);
                ChangeRecord::upsert(id, if i % 2 == 0 { 200 } else { 50 }, EntrySnapshot::default())
            })
            .collect();

        group.bench_function(BenchmarkId::new("half_newer", count), |b| {
            b.iter_batched(
                || (local.clone(), remote.clone()),
                |(mut local, remote)| black_box(last_write_wins_merge(&mut local, remote)),
                criterion::BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

criterion_group!(benches, bench_aead, bench_envelope, bench_merge);
criterion_main!(benches);
