use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use std::sync::Arc;

use chrono::{Days, Utc};
use uuid::Uuid;

use stockline_core::{BinId, ItemId, TenantId, WarehouseId};
use stockline_infra::store::{InMemoryStore, StockStore};
use stockline_stock::{Movement, MovementBatch, MovementReason};

fn receive(warehouse_id: WarehouseId, bin_id: BinId, item_id: ItemId, qty: i64) -> Movement {
    Movement {
        warehouse_id,
        bin_id,
        item_id,
        batch_no: None,
        reason: MovementReason::Receive,
        qty_change: qty,
        expiry_date: None,
        reference: None,
    }
}

fn bench_movement_latency(c: &mut Criterion) {
    let mut group = c.benchmark_group("movement_latency");
    group.sample_size(1000);

    // Benchmark: first movement into a fresh key (position creation).
    group.bench_function("apply_movement_fresh_key", |b| {
        let store = InMemoryStore::new();
        let tenant_id = TenantId::new();
        let warehouse_id = WarehouseId::new();
        b.iter(|| {
            let batch = MovementBatch::single(
                Uuid::now_v7(),
                tenant_id,
                Utc::now(),
                receive(warehouse_id, BinId::new(), ItemId::new(), black_box(100)),
            );
            store.apply_movements(batch).unwrap();
        });
    });

    // Benchmark: alternating receipt/pick on one hot key with a long ledger
    // tail behind it.
    group.bench_function("apply_movement_hot_key", |b| {
        let store = InMemoryStore::new();
        let tenant_id = TenantId::new();
        let warehouse_id = WarehouseId::new();
        let bin_id = BinId::new();
        let item_id = ItemId::new();

        store
            .apply_movements(MovementBatch::single(
                Uuid::now_v7(),
                tenant_id,
                Utc::now(),
                receive(warehouse_id, bin_id, item_id, 1_000_000),
            ))
            .unwrap();

        b.iter(|| {
            let batch = MovementBatch::single(
                Uuid::now_v7(),
                tenant_id,
                Utc::now(),
                Movement {
                    reason: MovementReason::Pick,
                    qty_change: black_box(-1),
                    ..receive(warehouse_id, bin_id, item_id, 0)
                },
            );
            store.apply_movements(batch).unwrap();
        });
    });

    group.finish();
}

fn bench_batch_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("batch_throughput");

    for batch_size in [1usize, 8, 32] {
        group.throughput(Throughput::Elements(batch_size as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(batch_size),
            &batch_size,
            |b, &batch_size| {
                let store = InMemoryStore::new();
                let tenant_id = TenantId::new();
                let warehouse_id = WarehouseId::new();
                let bins: Vec<BinId> = (0..batch_size).map(|_| BinId::new()).collect();
                let item_id = ItemId::new();

                b.iter(|| {
                    let movements = bins
                        .iter()
                        .map(|&bin_id| receive(warehouse_id, bin_id, item_id, 10))
                        .collect();
                    let batch =
                        MovementBatch::new(Uuid::now_v7(), tenant_id, Utc::now(), movements);
                    store.apply_movements(batch).unwrap();
                });
            },
        );
    }

    group.finish();
}

fn bench_fefo_reservation(c: &mut Criterion) {
    let mut group = c.benchmark_group("fefo_reservation");

    for positions in [10usize, 100] {
        group.bench_with_input(
            BenchmarkId::from_parameter(positions),
            &positions,
            |b, &positions| {
                let store = Arc::new(InMemoryStore::new());
                let tenant_id = TenantId::new();
                let warehouse_id = WarehouseId::new();
                let item_id = ItemId::new();
                let today = Utc::now().date_naive();

                for i in 0..positions {
                    let mut movement =
                        receive(warehouse_id, BinId::new(), item_id, 1_000_000);
                    movement.batch_no =
                        Some(stockline_core::BatchNo::new(format!("LOT-{i}")).unwrap());
                    movement.expiry_date =
                        today.checked_add_days(Days::new(30 + i as u64));
                    store
                        .apply_movements(MovementBatch::single(
                            Uuid::now_v7(),
                            tenant_id,
                            Utc::now(),
                            movement,
                        ))
                        .unwrap();
                }

                b.iter(|| {
                    // Reserve across the earliest batches, then hand it back.
                    let allocations = store
                        .reserve_fefo(tenant_id, item_id, black_box(50), Utc::now())
                        .unwrap();
                    store
                        .release_allocations(tenant_id, &allocations, Utc::now())
                        .unwrap();
                });
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_movement_latency,
    bench_batch_throughput,
    bench_fefo_reservation
);
criterion_main!(benches);
