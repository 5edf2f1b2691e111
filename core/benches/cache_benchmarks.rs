//! Order cache benchmarks
//!
//! Measures the hot read path (cache hit), overwrite cost and lookup through
//! [`OrderQuery`] when the entry is already cached.
//!
//! Run with: `cargo bench -p order-service-core`

#![allow(missing_docs)]
#![allow(clippy::expect_used)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use order_service_core::{Item, Order, OrderCache, OrderQuery, OrderUid};
use order_service_testing::InMemoryOrderStore;
use std::sync::Arc;

fn order(uid: &str, items: usize) -> Order {
    Order {
        order_uid: OrderUid::new(uid),
        track_number: "WBILMTESTTRACK".to_string(),
        items: (0..items)
            .map(|i| Item {
                chrt_id: i64::try_from(i).unwrap_or_default(),
                name: format!("item-{i}"),
                ..Item::default()
            })
            .collect(),
        ..Order::default()
    }
}

fn filled_cache(size: usize) -> OrderCache {
    let cache = OrderCache::new();
    for i in 0..size {
        cache.set(order(&format!("order-{i}"), 3));
    }
    cache
}

fn bench_cache_get(c: &mut Criterion) {
    let mut group = c.benchmark_group("cache_get");
    group.throughput(Throughput::Elements(1));

    for size in [100, 10_000] {
        let cache = filled_cache(size);
        let hit = OrderUid::new("order-42");
        let miss = OrderUid::new("absent");

        group.bench_with_input(BenchmarkId::new("hit", size), &size, |b, _| {
            b.iter(|| black_box(cache.get(black_box(&hit))));
        });
        group.bench_with_input(BenchmarkId::new("miss", size), &size, |b, _| {
            b.iter(|| black_box(cache.get(black_box(&miss))));
        });
    }

    group.finish();
}

fn bench_cache_set(c: &mut Criterion) {
    let mut group = c.benchmark_group("cache_set");

    for items in [1, 50] {
        let cache = filled_cache(1_000);
        let template = order("order-7", items);

        group.bench_with_input(BenchmarkId::new("overwrite", items), &items, |b, _| {
            b.iter(|| cache.set(black_box(template.clone())));
        });
    }

    group.finish();
}

fn bench_query_cached(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().expect("Failed to create runtime");
    let cache = filled_cache(1_000);
    let query = OrderQuery::new(cache, Arc::new(InMemoryOrderStore::new()));
    let uid = OrderUid::new("order-500");

    c.bench_function("query_lookup_cached", |b| {
        b.to_async(&runtime)
            .iter(|| async { black_box(query.lookup(&uid).await) });
    });
}

criterion_group!(benches, bench_cache_get, bench_cache_set, bench_query_cached);
criterion_main!(benches);
