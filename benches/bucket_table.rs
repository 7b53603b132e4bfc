use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use once_cell::sync::Lazy;
use rand::Rng;

use osbf::bucket::{Bucket, BucketTable, Find};

const CAPACITY: [usize; 3] = [1_021, 16_411, 131_071];
const TOTAL_OPERATIONS: u64 = 2_000;

static RANDOM_HASHES: Lazy<Vec<(u32, u32)>> = Lazy::new(|| {
    let mut rng = rand::thread_rng();
    let mut hashes = Vec::with_capacity(TOTAL_OPERATIONS as usize);
    for _ in 0..TOTAL_OPERATIONS {
        hashes.push((rng.gen_range(1, u32::MAX), rng.gen_range(1, u32::MAX)));
    }
    hashes
});

fn fresh_table(n: usize) -> (Vec<Bucket>, Vec<u8>) {
    (vec![Bucket::ZERO; n], vec![0u8; n])
}

fn insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("bucket_table_insert");
    group.throughput(Throughput::Elements(TOTAL_OPERATIONS));

    for &capacity in CAPACITY.iter() {
        group.bench_with_input(
            BenchmarkId::new("insert", capacity),
            &capacity,
            |b, &capacity| {
                b.iter(|| {
                    let (mut buckets, mut flags) = fresh_table(capacity);
                    let mut table = BucketTable::new(&mut buckets, &mut flags);
                    for &(h1, h2) in RANDOM_HASHES.iter() {
                        if let Find::Insertable(i) = table.find(h1, h2) {
                            table.insert(i, h1, h2, 1, 29, 128, true);
                        }
                    }
                });
            },
        );
    }
    group.finish();
}

fn find_and_update(c: &mut Criterion) {
    let mut group = c.benchmark_group("bucket_table_find_update");
    group.throughput(Throughput::Elements(TOTAL_OPERATIONS));

    for &capacity in CAPACITY.iter() {
        let (mut buckets, mut flags) = fresh_table(capacity);
        {
            let mut table = BucketTable::new(&mut buckets, &mut flags);
            for &(h1, h2) in RANDOM_HASHES.iter() {
                if let Find::Insertable(i) = table.find(h1, h2) {
                    table.insert(i, h1, h2, 1, 29, 128, true);
                }
            }
            table.clear_flags();
        }

        group.bench_with_input(
            BenchmarkId::new("find_then_update", capacity),
            &capacity,
            |b, _| {
                b.iter(|| {
                    let mut table = BucketTable::new(&mut buckets.clone(), &mut flags.clone());
                    for &(h1, h2) in RANDOM_HASHES.iter() {
                        if let Find::Found(i) = table.find(h1, h2) {
                            table.update(i, 1);
                        }
                    }
                });
            },
        );
    }
    group.finish();
}

criterion_group!(benches, insert, find_and_update);
criterion_main!(benches);
