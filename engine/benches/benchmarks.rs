//! Performance benchmarks for strand-engine.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use strand_engine::{Hlc, Id, NodeId, Query, Slot, Store, TripleStore, Value, Variable};
use tokio::runtime::{Builder, Runtime};

fn hlc(ms: u64) -> Hlc {
    Hlc {
        physical_ms: ms,
        logical: 0,
        node_id: NodeId(1),
    }
}

fn current_thread_runtime() -> Runtime {
    Builder::new_current_thread().build().unwrap()
}

fn populated_store(count: u64) -> TripleStore {
    let rt = current_thread_runtime();
    let mut store = TripleStore::new(1);
    let attr = Id::attribute("users", "name");
    rt.block_on(async {
        for i in 0..count {
            store
                .add(vec![strand_engine::Fact::new(
                    Id::generate(),
                    attr,
                    Value::String(format!("user_{i}")),
                    hlc(1000 + i),
                )])
                .await
                .unwrap();
        }
    });
    store
}

fn bench_store_add(c: &mut Criterion) {
    let rt = current_thread_runtime();
    let mut group = c.benchmark_group("store_add");

    group.bench_function("add_single_fact", |b| {
        let mut store = TripleStore::new(1);
        let attr = Id::attribute("users", "name");
        let mut counter = 0u64;
        b.iter(|| {
            counter += 1;
            rt.block_on(store.add(vec![strand_engine::Fact::new(
                black_box(Id::generate()),
                attr,
                Value::String(format!("user_{counter}")),
                hlc(counter),
            )]))
            .unwrap()
        })
    });

    for size in [100u64, 1_000, 10_000] {
        group.bench_with_input(BenchmarkId::new("add_batch", size), &size, |b, &size| {
            b.iter(|| {
                let mut store = TripleStore::new(1);
                let attr = Id::attribute("users", "name");
                let facts = (0..size)
                    .map(|i| {
                        strand_engine::Fact::new(
                            Id::generate(),
                            attr,
                            Value::String(format!("user_{i}")),
                            hlc(i),
                        )
                    })
                    .collect();
                rt.block_on(store.add(black_box(facts))).unwrap()
            })
        });
    }

    group.finish();
}

fn bench_store_query(c: &mut Criterion) {
    let rt = current_thread_runtime();
    let mut group = c.benchmark_group("store_query");

    for size in [100u64, 1_000, 10_000] {
        let store = populated_store(size);
        let attr = Id::attribute("users", "name");

        group.bench_with_input(BenchmarkId::new("scan_by_attribute", size), &size, |b, _| {
            b.iter(|| {
                let mut query = Query::new(vec![Variable::new("e"), Variable::new("name")]);
                query.where_.push(strand_engine::Pattern::new(
                    Slot::var("e"),
                    Slot::from(attr),
                    Slot::var("name"),
                ));
                rt.block_on(store.query(black_box(&query))).unwrap()
            })
        });
    }

    group.finish();
}

fn bench_conflict_resolution(c: &mut Criterion) {
    let rt = current_thread_runtime();
    let mut group = c.benchmark_group("conflict_resolution");

    group.bench_function("repeated_writes_same_entity_attribute", |b| {
        let entity = Id::generate();
        let attr = Id::attribute("users", "name");
        let mut counter = 0u64;
        b.iter(|| {
            counter += 1;
            let mut store = TripleStore::new(1);
            rt.block_on(async {
                for i in 0..100u64 {
                    store
                        .add(vec![strand_engine::Fact::new(
                            entity,
                            attr,
                            Value::String(format!("v{i}")),
                            hlc(black_box(i)),
                        )])
                        .await
                        .unwrap();
                }
            });
        })
    });

    group.finish();
}

criterion_group!(benches, bench_store_add, bench_store_query, bench_conflict_resolution);
criterion_main!(benches);
