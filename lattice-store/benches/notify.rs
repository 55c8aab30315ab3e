//! Notification pass benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use lattice_store::{batch, Store, StoreOptions};
use serde_json::{json, Value};

fn wide_state(rows: usize) -> Value {
    let rows: Vec<Value> = (0..rows)
        .map(|i| json!({"id": i, "label": format!("row {i}"), "done": false}))
        .collect();
    json!({"rows": rows, "filter": "all"})
}

/// Register a signal for every row label, like a list rendering each row.
fn subscribed_store(rows: usize) -> Store {
    let store = Store::new(wide_state(rows), StoreOptions::default());
    for i in 0..rows {
        let _ = store.signal(&format!("rows.{i}.label"));
    }
    store
}

fn leaf_write(c: &mut Criterion) {
    let mut group = c.benchmark_group("leaf_write");
    for rows in [10, 100, 1000] {
        let store = subscribed_store(rows);
        let mut n = 0u64;
        group.bench_with_input(BenchmarkId::from_parameter(rows), &rows, |b, _| {
            b.iter(|| {
                n += 1;
                store.set("rows.0.label", black_box(json!(n))).unwrap();
            })
        });
    }
    group.finish();
}

fn parent_overwrite(c: &mut Criterion) {
    let mut group = c.benchmark_group("parent_overwrite");
    for rows in [10, 100, 1000] {
        let store = subscribed_store(rows);
        let next = wide_state(rows)["rows"].clone();
        group.bench_with_input(BenchmarkId::from_parameter(rows), &rows, |b, _| {
            b.iter(|| store.set("rows", black_box(next.clone())).unwrap())
        });
    }
    group.finish();
}

fn batched_writes(c: &mut Criterion) {
    let store = subscribed_store(100);
    let mut n = 0u64;
    c.bench_function("batched_writes_100", |b| {
        b.iter(|| {
            n += 1;
            batch(|| {
                for i in 0..100 {
                    store.set(&format!("rows.{i}.done"), json!(n % 2 == 0)).unwrap();
                }
            })
        })
    });
}

criterion_group!(benches, leaf_write, parent_overwrite, batched_writes);
criterion_main!(benches);
