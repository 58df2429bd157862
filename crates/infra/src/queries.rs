//! Read-side queries over snapshots and the ledger.
//!
//! Everything here is read-only: availability sums, expiry alert summaries,
//! operator stock overviews, ledger read-back and snapshot reconciliation.

use chrono::NaiveDate;

use stockline_batch::{ExpiryTier, classify, days_until};
use stockline_core::{ItemId, TenantId, WarehouseId};
use stockline_stock::{LedgerEntry, StockKey, StockSnapshot};

use crate::store::StockStore;

/// One tier of the expiry alert summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierCount {
    pub tier: ExpiryTier,
    pub count: u64,
}

/// One row of the operator stock overview.
#[derive(Debug, Clone)]
pub struct StockOverviewRow {
    pub key: StockKey,
    pub snapshot: StockSnapshot,
    pub tier: ExpiryTier,
}

/// A snapshot that disagrees with its own ledger.
#[derive(Debug, Clone)]
pub struct ReconciliationMismatch {
    pub key: StockKey,
    pub snapshot_qty: i64,
    pub ledger_sum: i64,
    pub last_qty_after: Option<i64>,
}

/// Read-side query service over a stock store.
#[derive(Debug)]
pub struct StockQueries<S> {
    store: S,
}

impl<S> StockQueries<S>
where
    S: StockStore,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Summed available quantity of an item, optionally per warehouse.
    pub fn available(
        &self,
        tenant_id: TenantId,
        item_id: ItemId,
        warehouse_id: Option<WarehouseId>,
    ) -> i64 {
        self.store
            .snapshots_for_item(tenant_id, item_id)
            .iter()
            .filter(|(_, s)| warehouse_id.is_none_or(|w| s.warehouse_id == w))
            .map(|(_, s)| s.qty_available())
            .sum()
    }

    /// Count stocked positions per expiry tier inside the alert horizon.
    ///
    /// Expired positions are always reported; positions whose expiry lies
    /// beyond `as_of + days_ahead` and positions without an expiry date are
    /// not alertable and are skipped. Tiers come back most severe first.
    pub fn expiry_alerts(
        &self,
        tenant_id: TenantId,
        warehouse_id: Option<WarehouseId>,
        days_ahead: i64,
        as_of: NaiveDate,
    ) -> Vec<TierCount> {
        let mut counts: [u64; 4] = [0; 4];

        for (_, snapshot) in self.store.snapshots_for_warehouse(tenant_id, warehouse_id) {
            if snapshot.qty_on_hand <= 0 {
                continue;
            }
            let Some(expiry) = snapshot.expiry_date else {
                continue;
            };
            let days = days_until(expiry, as_of);
            if days > days_ahead {
                continue;
            }

            let tier = classify(Some(expiry), as_of);
            counts[tier as usize] += 1;
        }

        [
            ExpiryTier::Expired,
            ExpiryTier::Critical,
            ExpiryTier::Warning,
            ExpiryTier::Ok,
        ]
        .into_iter()
        .filter_map(|tier| {
            let count = counts[tier as usize];
            (count > 0).then_some(TierCount { tier, count })
        })
        .collect()
    }

    /// Stocked positions with their classification, for dashboards.
    pub fn overview(
        &self,
        tenant_id: TenantId,
        warehouse_id: Option<WarehouseId>,
        as_of: NaiveDate,
    ) -> Vec<StockOverviewRow> {
        self.store
            .snapshots_for_warehouse(tenant_id, warehouse_id)
            .into_iter()
            .filter(|(_, snapshot)| snapshot.qty_on_hand > 0)
            .map(|(key, snapshot)| {
                let tier = classify(snapshot.expiry_date, as_of);
                StockOverviewRow {
                    key,
                    snapshot,
                    tier,
                }
            })
            .collect()
    }

    /// Audit-trail read-back for one key, in write order.
    pub fn ledger(&self, key: &StockKey) -> Vec<LedgerEntry> {
        self.store.ledger_for_key(key)
    }

    /// Verify every snapshot equals the sum of its ledger deltas and the
    /// last entry's `qty_after`. An empty result means the ledger and the
    /// cache agree.
    pub fn reconcile(
        &self,
        tenant_id: TenantId,
        warehouse_id: Option<WarehouseId>,
    ) -> Vec<ReconciliationMismatch> {
        let mut mismatches = Vec::new();

        for (key, snapshot) in self.store.snapshots_for_warehouse(tenant_id, warehouse_id) {
            let entries = self.store.ledger_for_key(&key);
            let ledger_sum: i64 = entries.iter().map(|e| e.qty_change).sum();
            let last_qty_after = entries.last().map(|e| e.qty_after);

            if snapshot.qty_on_hand != ledger_sum
                || last_qty_after.is_some_and(|qty| qty != snapshot.qty_on_hand)
            {
                mismatches.push(ReconciliationMismatch {
                    key,
                    snapshot_qty: snapshot.qty_on_hand,
                    ledger_sum,
                    last_qty_after,
                });
            }
        }

        mismatches
    }
}
