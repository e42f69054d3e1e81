//! Criterion benchmarks for lookups and sequential scans.
//!
//! Run with:
//!   cargo bench --bench lookup
//!
//! Databases are built in memory so the numbers reflect the lookup path
//! (hashing, table probes, record compares) rather than disk latency; the
//! memory-mapped provider takes the same code path over a page cache.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use cdb::{Cdb, CdbMake, CdbSeq, MemFile};

fn build(records: u32) -> (Vec<u8>, Vec<Vec<u8>>) {
    let mut make = CdbMake::start(MemFile::new()).unwrap();
    let mut keys = Vec::with_capacity(records as usize);
    for i in 0..records {
        let key = format!("key-{:08}", i).into_bytes();
        make.add(&key, format!("value for record {}", i).as_bytes())
            .unwrap();
        keys.push(key);
    }
    (make.finish().unwrap().into_bytes(), keys)
}

fn bench_find(c: &mut Criterion) {
    let mut group = c.benchmark_group("find");

    for &records in &[1_000u32, 100_000] {
        let (bytes, keys) = build(records);
        let mut db = Cdb::new(MemFile::from_bytes(bytes)).unwrap();

        // ── hits, cycling through every key ─────────────────────────────────
        group.bench_with_input(BenchmarkId::new("hit", records), &records, |b, _| {
            let mut i = 0usize;
            b.iter(|| {
                i = (i + 1) % keys.len();
                assert!(db.find(&keys[i]).unwrap());
                db.datalen()
            })
        });

        // ── misses ──────────────────────────────────────────────────────────
        group.bench_with_input(BenchmarkId::new("miss", records), &records, |b, _| {
            let mut i = 0u64;
            b.iter(|| {
                i += 1;
                assert!(!db.find(format!("absent-{}", i).as_bytes()).unwrap());
            })
        });
    }

    group.finish();
}

fn bench_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("scan");

    let records = 100_000u32;
    let (bytes, _) = build(records);
    let fsize = bytes.len() as u64;
    let mut db = Cdb::new(MemFile::from_bytes(bytes)).unwrap();

    group.throughput(Throughput::Bytes(fsize));
    group.bench_function(BenchmarkId::new("full", records), |b| {
        b.iter(|| {
            let mut seq = CdbSeq::new();
            let mut n = 0u32;
            while seq.next(&mut db).unwrap() {
                n += 1;
            }
            assert_eq!(n, records);
        })
    });

    group.finish();
}

fn bench_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("build");
    group.sample_size(20);

    for &records in &[1_000u32, 100_000] {
        group.bench_with_input(BenchmarkId::new("mem", records), &records, |b, &records| {
            b.iter(|| {
                let mut make = CdbMake::start(MemFile::new()).unwrap();
                for i in 0..records {
                    make.add(format!("key-{:08}", i).as_bytes(), b"value").unwrap();
                }
                make.finish().unwrap().into_bytes().len()
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_find, bench_scan, bench_build);
criterion_main!(benches);
