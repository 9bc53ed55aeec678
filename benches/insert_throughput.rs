use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use tscache::cache::{CacheSettings, WriteCache};
use tscache::storage::memory::MemoryStorage;

fn bench_insert(c: &mut Criterion) {
    let targets: Vec<String> = (0..100).map(|i| format!("host-{i}/cpu/cpu-idle.rrd")).collect();
    let cache = WriteCache::start(CacheSettings::new(2, 0), Arc::new(MemoryStorage::new()))
        .expect("start write cache");

    let mut time = 0i64;
    c.bench_function("insert_100_targets", |b| {
        b.iter(|| {
            time += 1;
            let target = &targets[(time % 100) as usize];
            cache
                .insert(black_box(target), black_box("1:0.500000"), time)
                .expect("insert");
        })
    });

    cache.stop().expect("stop write cache");
}

criterion_group!(benches, bench_insert);
criterion_main!(benches);
