use criterion::{criterion_group, criterion_main, Criterion};

use vkrt_core::hashtable::{KeyMode, OpenTable};

fn insert_benchmark(c: &mut Criterion) {
    c.bench_function("open table: insert 256 sequential keys", |b| {
        b.iter(|| {
            let mut table: OpenTable<u32> = OpenTable::new(512, KeyMode::Sensitive);
            for i in 0..256u32 {
                table.insert(&format!("textures/wall{i:04}"), i);
            }
            table
        })
    });
}

fn find_benchmark(c: &mut Criterion) {
    let mut table: OpenTable<u32> = OpenTable::new(512, KeyMode::Sensitive);
    for i in 0..256u32 {
        table.insert(&format!("textures/wall{i:04}"), i);
    }

    c.bench_function("open table: find present key", |b| {
        b.iter(|| table.find("textures/wall0128"))
    });

    c.bench_function("open table: find absent key", |b| {
        b.iter(|| table.find("textures/does_not_exist"))
    });
}

criterion_group!(hash_table, insert_benchmark, find_benchmark);
criterion_main!(hash_table);
