//! Performance benchmarks for cart mutations and subscription sync.

use async_trait::async_trait;
use checkout_state::{
    BillingProvider, CartStore, NewCartItem, ProviderError, RemoteStatus, StatusPayload,
    SubscriptionSync, SyncConfig, Timestamp, WatchConfig,
};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::sync::Arc;
use std::time::Duration;

fn filled_cart(lines: usize) -> CartStore {
    CartStore::with_items(
        (0..lines).map(|i| NewCartItem::new(format!("sku{i}"), format!("Item {i}"), 999, 1)),
    )
    .unwrap()
}

/// Benchmark merging into an existing line as the cart grows
fn bench_add_merge(c: &mut Criterion) {
    let mut group = c.benchmark_group("add_merge");

    for lines in [10, 100, 1000] {
        group.bench_with_input(BenchmarkId::new("lines", lines), &lines, |b, &lines| {
            let mut cart = filled_cart(lines);
            // Last line is the worst case for the id lookup
            let last = format!("sku{}", lines - 1);

            b.iter(|| {
                let state = cart
                    .add_item(NewCartItem::new(last.clone(), "Item", 999, 1))
                    .unwrap();
                black_box(state.total_cost);
            });
        });
    }

    group.finish();
}

/// Benchmark add/remove cycles of a fresh line
fn bench_add_remove(c: &mut Criterion) {
    let mut group = c.benchmark_group("add_remove");

    for lines in [10, 100, 1000] {
        group.bench_with_input(BenchmarkId::new("lines", lines), &lines, |b, &lines| {
            let mut cart = filled_cart(lines);

            b.iter(|| {
                cart.add_item(NewCartItem::new("new", "New", 100, 2)).unwrap();
                black_box(cart.remove_item("new"));
            });
        });
    }

    group.finish();
}

/// Benchmark notification fan-out to watchers
fn bench_watchers(c: &mut Criterion) {
    let mut group = c.benchmark_group("watchers");

    for watchers in [1, 10, 100] {
        group.bench_with_input(
            BenchmarkId::new("count", watchers),
            &watchers,
            |b, &watchers| {
                let mut cart = filled_cart(10);
                let receivers: Vec<_> = (0..watchers)
                    .map(|_| cart.watch(WatchConfig::default()))
                    .collect();

                b.iter(|| {
                    black_box(cart.set_quantity("sku0", 2).unwrap());
                    for rx in &receivers {
                        while rx.try_recv().is_ok() {}
                    }
                });
            },
        );
    }

    group.finish();
}

struct InstantProvider;

#[async_trait]
impl BillingProvider for InstantProvider {
    async fn fetch_status(&self, _subscription_id: &str) -> Result<StatusPayload, ProviderError> {
        Ok(StatusPayload::new(
            RemoteStatus::Active,
            Timestamp(0),
            Timestamp(1),
        ))
    }
}

/// Benchmark a full fetch cycle and the throttled fast path
fn bench_sync(c: &mut Criterion) {
    let mut group = c.benchmark_group("sync");
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap();

    group.bench_function("fetch", |b| {
        let sync = SubscriptionSync::builder("sub_123", Arc::new(InstantProvider))
            .config(SyncConfig::default().with_min_refetch_interval(Duration::ZERO))
            .build();
        b.iter(|| black_box(runtime.block_on(sync.refresh())));
    });

    group.bench_function("throttled", |b| {
        let sync = SubscriptionSync::builder("sub_123", Arc::new(InstantProvider))
            .config(SyncConfig::default().with_min_refetch_interval(Duration::from_secs(3600)))
            .build();
        runtime.block_on(sync.sync());
        b.iter(|| black_box(runtime.block_on(sync.sync())));
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_add_merge,
    bench_add_remove,
    bench_watchers,
    bench_sync,
);

criterion_main!(benches);
