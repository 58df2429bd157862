//! Integration tests for the full write path: workflow services → dispatcher
//! → store → snapshots/ledger, plus reservations and queries on top.

use std::sync::Arc;

use chrono::{Days, NaiveDate, Utc};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use stockline_batch::ExpiryTier;
use stockline_core::{BatchNo, BinId, ItemId, TenantId, WarehouseId};
use stockline_events::{EventBus, EventEnvelope, InMemoryEventBus};
use stockline_stock::{Movement, MovementBatch, MovementReason, StockKey};
use stockline_transfer::{ReceiveLineQty, ShipLineQty};

use crate::dispatcher::DispatchError;
use crate::queries::StockQueries;
use crate::reservation::ReservationManager;
use crate::services::{
    AdjustmentService, CountingService, ReceivingService, StockService, TransferService,
};
use crate::store::{InMemoryStore, StockStore};

type Bus = Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>;

struct Harness {
    store: Arc<InMemoryStore>,
    bus: Bus,
    tenant_id: TenantId,
}

impl Harness {
    fn new() -> Self {
        Self {
            store: Arc::new(InMemoryStore::new()),
            bus: Arc::new(InMemoryEventBus::new()),
            tenant_id: TenantId::new(),
        }
    }

    fn stock(&self) -> StockService<Arc<InMemoryStore>, Bus> {
        StockService::new(self.store.clone(), self.bus.clone())
    }

    fn receiving(&self) -> ReceivingService<Arc<InMemoryStore>, Bus> {
        ReceivingService::new(self.store.clone(), self.bus.clone())
    }

    fn transfers(&self) -> TransferService<Arc<InMemoryStore>, Bus> {
        TransferService::new(self.store.clone(), self.bus.clone())
    }

    fn counting(&self) -> CountingService<Arc<InMemoryStore>, Bus> {
        CountingService::new(self.store.clone(), self.bus.clone())
    }

    fn adjustments(&self) -> AdjustmentService<Arc<InMemoryStore>, Bus> {
        AdjustmentService::new(self.store.clone(), self.bus.clone())
    }

    fn reservations(&self) -> ReservationManager<Arc<InMemoryStore>> {
        ReservationManager::new(self.store.clone())
    }

    fn queries(&self) -> StockQueries<Arc<InMemoryStore>> {
        StockQueries::new(self.store.clone())
    }

    fn key(&self, bin_id: BinId, item_id: ItemId, batch_no: Option<BatchNo>) -> StockKey {
        StockKey {
            tenant_id: self.tenant_id,
            bin_id,
            item_id,
            batch_no,
        }
    }

    fn on_hand(&self, key: &StockKey) -> i64 {
        self.store.snapshot(key).map(|s| s.qty_on_hand).unwrap_or(0)
    }

    /// Seed stock directly through the movement path.
    fn seed(
        &self,
        warehouse_id: WarehouseId,
        bin_id: BinId,
        item_id: ItemId,
        batch_no: Option<BatchNo>,
        qty: i64,
        expiry_date: Option<NaiveDate>,
    ) {
        self.stock()
            .commit_movement(MovementBatch::single(
                Uuid::now_v7(),
                self.tenant_id,
                Utc::now(),
                Movement {
                    warehouse_id,
                    bin_id,
                    item_id,
                    batch_no,
                    reason: MovementReason::Receive,
                    qty_change: qty,
                    expiry_date,
                    reference: None,
                },
            ))
            .unwrap();
    }
}

fn lot(no: &str) -> BatchNo {
    BatchNo::new(no).unwrap()
}

fn in_days(days: u64) -> NaiveDate {
    Utc::now()
        .date_naive()
        .checked_add_days(Days::new(days))
        .unwrap()
}

#[test]
fn grn_receive_then_putaway_moves_stock_into_storage() {
    let h = Harness::new();
    let receiving = h.receiving();
    let warehouse_id = WarehouseId::new();
    let item_id = ItemId::new();
    let receiving_bin = BinId::new();
    let storage_bin = BinId::new();

    let grn_id = receiving
        .create(h.tenant_id, warehouse_id, Some("PO-88".to_string()))
        .unwrap();
    receiving
        .add_expected_line(h.tenant_id, grn_id, item_id, 40)
        .unwrap();
    receiving.open(h.tenant_id, grn_id).unwrap();

    let outcome = receiving
        .receive_line(
            h.tenant_id,
            grn_id,
            item_id,
            40,
            receiving_bin,
            Some(lot("LOT-A")),
            Some(in_days(90)),
        )
        .unwrap();
    assert_eq!(outcome.ledger_entries.len(), 1);
    assert_eq!(outcome.ledger_entries[0].reason, MovementReason::Receive);
    assert_eq!(outcome.ledger_entries[0].qty_after, 40);

    let recv_key = h.key(receiving_bin, item_id, Some(lot("LOT-A")));
    assert_eq!(h.on_hand(&recv_key), 40);

    let outcome = receiving
        .complete_putaway(h.tenant_id, grn_id, 1, storage_bin)
        .unwrap();
    assert_eq!(outcome.ledger_entries.len(), 2);

    let storage_key = h.key(storage_bin, item_id, Some(lot("LOT-A")));
    assert_eq!(h.on_hand(&recv_key), 0);
    assert_eq!(h.on_hand(&storage_key), 40);

    // The batch expiry followed the stock into the storage bin.
    let snapshot = h.store.snapshot(&storage_key).unwrap();
    assert_eq!(snapshot.expiry_date, Some(in_days(90)));

    // Nothing pending: completion is now legal.
    receiving.complete(h.tenant_id, grn_id).unwrap();

    assert!(h.queries().reconcile(h.tenant_id, None).is_empty());
}

#[test]
fn fefo_reservation_exhausts_earliest_expiry_first() {
    let h = Harness::new();
    let warehouse_id = WarehouseId::new();
    let item_id = ItemId::new();
    let (bin_1, bin_2, bin_3) = (BinId::new(), BinId::new(), BinId::new());

    // E1 < E2 < E3 across different bins.
    h.seed(warehouse_id, bin_2, item_id, Some(lot("E2")), 50, Some(in_days(20)));
    h.seed(warehouse_id, bin_1, item_id, Some(lot("E1")), 30, Some(in_days(5)));
    h.seed(warehouse_id, bin_3, item_id, Some(lot("E3")), 50, Some(in_days(40)));

    let reservations = h.reservations();
    let id = reservations.reserve(h.tenant_id, item_id, 40).unwrap();
    let reservation = reservations.get(h.tenant_id, id).unwrap();

    // E1 is exhausted before E2 is touched; E3 stays clean.
    assert_eq!(reservation.allocations.len(), 2);
    assert_eq!(reservation.allocations[0].key.batch_no, Some(lot("E1")));
    assert_eq!(reservation.allocations[0].qty, 30);
    assert_eq!(reservation.allocations[1].key.batch_no, Some(lot("E2")));
    assert_eq!(reservation.allocations[1].qty, 10);

    let e3 = h.store.snapshot(&h.key(bin_3, item_id, Some(lot("E3")))).unwrap();
    assert_eq!(e3.qty_reserved, 0);

    // Release restores the full availability.
    reservations.release(h.tenant_id, id).unwrap();
    assert_eq!(h.queries().available(h.tenant_id, item_id, None), 130);
}

#[test]
fn reservation_beyond_total_availability_is_rejected() {
    let h = Harness::new();
    let warehouse_id = WarehouseId::new();
    let item_id = ItemId::new();
    h.seed(warehouse_id, BinId::new(), item_id, None, 10, None);

    let reservations = h.reservations();
    let err = reservations.reserve(h.tenant_id, item_id, 11).unwrap_err();
    assert_eq!(
        err,
        stockline_core::DomainError::InsufficientAvailable {
            requested: 11,
            available: 10
        }
    );

    // Nothing was held by the failed attempt.
    assert_eq!(h.queries().available(h.tenant_id, item_id, None), 10);
}

#[test]
fn ibt_partial_ship_and_receive_moves_exactly_the_shipped_quantity() {
    let h = Harness::new();
    let transfers = h.transfers();
    let source = WarehouseId::new();
    let dest = WarehouseId::new();
    let item_id = ItemId::new();
    let source_bin = BinId::new();
    let dest_bin = BinId::new();

    h.seed(source, source_bin, item_id, Some(lot("LOT-T")), 50, None);

    let ibt_id = transfers.create(h.tenant_id, source, dest).unwrap();
    transfers
        .add_line(h.tenant_id, ibt_id, item_id, Some(lot("LOT-T")), source_bin, 50)
        .unwrap();
    transfers.submit(h.tenant_id, ibt_id).unwrap();
    transfers.approve(h.tenant_id, ibt_id).unwrap();
    transfers.start_picking(h.tenant_id, ibt_id).unwrap();

    let outcome = transfers
        .ship(
            h.tenant_id,
            ibt_id,
            vec![ShipLineQty {
                line_no: 1,
                qty_shipped: 30,
            }],
        )
        .unwrap();
    assert_eq!(outcome.ledger_entries.len(), 1);
    assert_eq!(outcome.ledger_entries[0].reason, MovementReason::IbtOut);

    let ibt = transfers.get(h.tenant_id, ibt_id).unwrap();
    assert!(ibt.lines()[0].partially_shipped());

    let source_key = h.key(source_bin, item_id, Some(lot("LOT-T")));
    assert_eq!(h.on_hand(&source_key), 20);

    let outcome = transfers
        .receive(
            h.tenant_id,
            ibt_id,
            vec![ReceiveLineQty {
                line_no: 1,
                qty_received: 30,
                to_bin_id: dest_bin,
            }],
        )
        .unwrap();
    assert_eq!(outcome.ledger_entries.len(), 1);
    assert_eq!(outcome.ledger_entries[0].reason, MovementReason::IbtIn);

    let dest_key = h.key(dest_bin, item_id, Some(lot("LOT-T")));
    assert_eq!(h.on_hand(&dest_key), 30);

    // The transfer itself nets to zero system-wide.
    let transfer_delta: i64 = h
        .store
        .ledger_for_key(&source_key)
        .iter()
        .chain(h.store.ledger_for_key(&dest_key).iter())
        .filter(|e| {
            matches!(
                e.reason,
                MovementReason::IbtOut | MovementReason::IbtIn
            )
        })
        .map(|e| e.qty_change)
        .sum();
    assert_eq!(transfer_delta, 0);

    assert!(h.queries().reconcile(h.tenant_id, None).is_empty());
}

#[test]
fn cycle_count_posts_the_variance_against_the_frozen_baseline() {
    let h = Harness::new();
    let counting = h.counting();
    let warehouse_id = WarehouseId::new();
    let item_id = ItemId::new();
    let bin_id = BinId::new();

    h.seed(warehouse_id, bin_id, item_id, None, 100, None);

    let count_id = counting
        .open(h.tenant_id, warehouse_id, Some(item_id))
        .unwrap();
    counting.record(h.tenant_id, count_id, 1, 92).unwrap();
    counting.submit(h.tenant_id, count_id).unwrap();

    let outcome = counting.close(h.tenant_id, count_id).unwrap();
    assert_eq!(outcome.ledger_entries.len(), 1);
    assert_eq!(outcome.ledger_entries[0].reason, MovementReason::Adjust);
    assert_eq!(outcome.ledger_entries[0].qty_change, -8);

    let key = h.key(bin_id, item_id, None);
    assert_eq!(h.on_hand(&key), 92);
}

#[test]
fn cycle_count_close_fails_whole_when_drift_would_cut_below_zero() {
    let h = Harness::new();
    let counting = h.counting();
    let warehouse_id = WarehouseId::new();
    let item_id = ItemId::new();
    let bin_id = BinId::new();

    h.seed(warehouse_id, bin_id, item_id, None, 10, None);

    let count_id = counting
        .open(h.tenant_id, warehouse_id, Some(item_id))
        .unwrap();
    counting.record(h.tenant_id, count_id, 1, 2).unwrap();
    counting.submit(h.tenant_id, count_id).unwrap();

    // Concurrent picking drains the key below the pending -8 variance.
    h.stock()
        .commit_movement(MovementBatch::single(
            Uuid::now_v7(),
            h.tenant_id,
            Utc::now(),
            Movement {
                warehouse_id,
                bin_id,
                item_id,
                batch_no: None,
                reason: MovementReason::Pick,
                qty_change: -5,
                expiry_date: None,
                reference: None,
            },
        ))
        .unwrap();

    let err = counting.close(h.tenant_id, count_id).unwrap_err();
    assert!(matches!(err, DispatchError::InsufficientStock { .. }));

    // The close posted nothing and the count is still re-closable state-wise.
    let key = h.key(bin_id, item_id, None);
    assert_eq!(h.on_hand(&key), 5);
}

#[test]
fn adjustment_overdraw_rejects_every_line() {
    let h = Harness::new();
    let adjustments = h.adjustments();
    let warehouse_id = WarehouseId::new();
    let item_id = ItemId::new();
    let (bin_a, bin_b) = (BinId::new(), BinId::new());

    h.seed(warehouse_id, bin_a, item_id, None, 5, None);
    h.seed(warehouse_id, bin_b, item_id, None, 20, None);

    let adjustment_id = adjustments.create(h.tenant_id, warehouse_id).unwrap();
    adjustments
        .add_line(
            h.tenant_id,
            adjustment_id,
            bin_b,
            item_id,
            None,
            -3,
            "damaged in handling".to_string(),
        )
        .unwrap();
    adjustments
        .add_line(
            h.tenant_id,
            adjustment_id,
            bin_a,
            item_id,
            None,
            -7,
            "shrinkage".to_string(),
        )
        .unwrap();
    adjustments.submit(h.tenant_id, adjustment_id).unwrap();
    adjustments.approve(h.tenant_id, adjustment_id).unwrap();

    // 5 - 7 would go negative: the whole post is rejected.
    let err = adjustments.post(h.tenant_id, adjustment_id).unwrap_err();
    assert!(matches!(
        err,
        DispatchError::InsufficientStock {
            requested: 7,
            available: 5
        }
    ));

    assert_eq!(h.on_hand(&h.key(bin_a, item_id, None)), 5);
    assert_eq!(h.on_hand(&h.key(bin_b, item_id, None)), 20);
    assert_eq!(h.store.ledger_for_key(&h.key(bin_b, item_id, None)).len(), 1);

    // The adjustment is still approved; a corrected post can follow.
    let adjustment = adjustments.get(h.tenant_id, adjustment_id).unwrap();
    assert_eq!(
        adjustment.status(),
        stockline_adjustment::AdjustmentStatus::Approved
    );
}

#[test]
fn concurrent_overdraws_on_one_key_leave_exactly_one_winner() {
    let h = Harness::new();
    let warehouse_id = WarehouseId::new();
    let item_id = ItemId::new();
    let bin_id = BinId::new();

    h.seed(warehouse_id, bin_id, item_id, None, 10, None);

    let mut handles = Vec::new();
    for _ in 0..2 {
        let store = h.store.clone();
        let tenant_id = h.tenant_id;
        handles.push(std::thread::spawn(move || {
            store.apply_movements(MovementBatch::single(
                Uuid::now_v7(),
                tenant_id,
                Utc::now(),
                Movement {
                    warehouse_id,
                    bin_id,
                    item_id,
                    batch_no: None,
                    reason: MovementReason::Pick,
                    qty_change: -8,
                    expiry_date: None,
                    reference: None,
                },
            ))
        }));
    }

    let results: Vec<_> = handles.into_iter().map(|t| t.join().unwrap()).collect();
    let successes = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1, "exactly one of the competing picks may win");

    assert_eq!(h.on_hand(&h.key(bin_id, item_id, None)), 2);
}

#[test]
fn committed_envelopes_reach_bus_subscribers() {
    let h = Harness::new();
    let subscription = h.bus.subscribe();
    let receiving = h.receiving();
    let warehouse_id = WarehouseId::new();
    let item_id = ItemId::new();

    let grn_id = receiving.create(h.tenant_id, warehouse_id, None).unwrap();
    receiving
        .add_expected_line(h.tenant_id, grn_id, item_id, 10)
        .unwrap();
    receiving.open(h.tenant_id, grn_id).unwrap();
    receiving
        .receive_line(h.tenant_id, grn_id, item_id, 10, BinId::new(), None, None)
        .unwrap();

    let mut types = Vec::new();
    while let Ok(envelope) = subscription.try_recv() {
        types.push(envelope.aggregate_type().to_string());
    }

    assert!(types.iter().any(|t| t == "receiving.grn"));
    assert!(types.iter().any(|t| t == "stock.ledger_entry"));
}

#[test]
fn replayed_commit_movement_returns_original_entries() {
    let h = Harness::new();
    let stock = h.stock();
    let warehouse_id = WarehouseId::new();
    let item_id = ItemId::new();
    let bin_id = BinId::new();

    let batch = MovementBatch::single(
        Uuid::now_v7(),
        h.tenant_id,
        Utc::now(),
        Movement {
            warehouse_id,
            bin_id,
            item_id,
            batch_no: None,
            reason: MovementReason::Receive,
            qty_change: 25,
            expiry_date: None,
            reference: None,
        },
    );

    let first = stock.commit_movement(batch.clone()).unwrap();
    let replay = stock.commit_movement(batch).unwrap();

    assert_eq!(first, replay);
    assert_eq!(h.on_hand(&h.key(bin_id, item_id, None)), 25);
}

#[test]
fn expiry_alerts_count_positions_per_tier() {
    let h = Harness::new();
    let warehouse_id = WarehouseId::new();
    let item_id = ItemId::new();
    let today = Utc::now().date_naive();

    h.seed(warehouse_id, BinId::new(), item_id, Some(lot("OLD")), 5,
        Some(today.checked_sub_days(Days::new(3)).unwrap()));
    h.seed(warehouse_id, BinId::new(), item_id, Some(lot("SOON")), 5, Some(in_days(3)));
    h.seed(warehouse_id, BinId::new(), item_id, Some(lot("NEXT")), 5, Some(in_days(20)));
    h.seed(warehouse_id, BinId::new(), item_id, Some(lot("LATER")), 5, Some(in_days(200)));

    let alerts = h
        .queries()
        .expiry_alerts(h.tenant_id, Some(warehouse_id), 30, today);

    assert_eq!(
        alerts,
        vec![
            crate::queries::TierCount {
                tier: ExpiryTier::Expired,
                count: 1
            },
            crate::queries::TierCount {
                tier: ExpiryTier::Critical,
                count: 1
            },
            crate::queries::TierCount {
                tier: ExpiryTier::Warning,
                count: 1
            },
        ]
    );
}

#[test]
fn shrinkage_below_reserved_starves_the_reservation_but_keeps_invariants() {
    let h = Harness::new();
    let warehouse_id = WarehouseId::new();
    let item_id = ItemId::new();
    let bin_id = BinId::new();

    h.seed(warehouse_id, bin_id, item_id, None, 10, None);

    let reservations = h.reservations();
    let id = reservations.reserve(h.tenant_id, item_id, 8).unwrap();

    h.stock()
        .commit_movement(MovementBatch::single(
            Uuid::now_v7(),
            h.tenant_id,
            Utc::now(),
            Movement {
                warehouse_id,
                bin_id,
                item_id,
                batch_no: None,
                reason: MovementReason::Scrap,
                qty_change: -7,
                expiry_date: None,
                reference: None,
            },
        ))
        .unwrap();

    let key = h.key(bin_id, item_id, None);
    let snapshot = h.store.snapshot(&key).unwrap();
    assert_eq!(snapshot.qty_on_hand, 3);
    assert_eq!(snapshot.qty_reserved, 3);

    // Releasing the starved reservation saturates at zero.
    reservations.release(h.tenant_id, id).unwrap();
    let snapshot = h.store.snapshot(&key).unwrap();
    assert_eq!(snapshot.qty_reserved, 0);
    assert_eq!(snapshot.qty_on_hand, 3);
}
