use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use stockline_batch::{Batch, fefo_key};
use stockline_core::{
    AggregateId, BatchNo, DomainError, ExpectedVersion, ItemId, TenantId, WarehouseId,
};
use stockline_stock::{LedgerEntry, MovementBatch, StockKey, StockSnapshot};

use super::r#trait::{
    CommitOutcome, ReservationAllocation, StockStore, StoreError, StoredEvent, UncommittedEvent,
    WorkflowStore,
};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
struct StreamKey {
    tenant_id: TenantId,
    aggregate_id: AggregateId,
}

/// One stock position: the live snapshot plus its ledger tail.
#[derive(Debug, Clone)]
struct Position {
    snapshot: StockSnapshot,
    entries: Vec<LedgerEntry>,
}

#[derive(Debug, Default)]
struct Inner {
    streams: HashMap<StreamKey, Vec<StoredEvent>>,
    positions: HashMap<StockKey, Position>,
    batches: HashMap<(TenantId, ItemId, BatchNo), Batch>,
    /// operation_id -> the entries it produced, for idempotent replay.
    operations: HashMap<Uuid, Vec<LedgerEntry>>,
}

/// Movements validated against current state but not yet written.
#[derive(Debug, Default)]
struct StagedMovements {
    snapshots: HashMap<StockKey, StockSnapshot>,
    entries: Vec<LedgerEntry>,
    batches: Vec<Batch>,
}

/// In-memory store for workflow streams and the stock ledger.
///
/// A single writer lock stands in for the serializable transaction of a
/// relational backend: every commit (header transition + movement batch)
/// validates and applies under one lock acquisition, so concurrent writers
/// on the same stock key serialize and all-or-nothing batch semantics hold.
/// Intended for tests/dev. Not optimized for performance.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    inner: RwLock<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn current_version(stream: &[StoredEvent]) -> u64 {
        stream.last().map(|e| e.sequence_number).unwrap_or(0)
    }
}

fn quantity_error(err: DomainError) -> StoreError {
    match err {
        DomainError::InsufficientStock {
            requested,
            available,
        } => StoreError::InsufficientStock {
            requested,
            available,
        },
        DomainError::InsufficientAvailable {
            requested,
            available,
        } => StoreError::InsufficientAvailable {
            requested,
            available,
        },
        other => StoreError::InvalidMovement(other.to_string()),
    }
}

/// Validate a whole batch against current state, producing the post-apply
/// snapshots and ledger rows. Nothing is written here.
fn stage_movements(inner: &Inner, batch: &MovementBatch) -> Result<StagedMovements, StoreError> {
    batch.validate().map_err(quantity_error)?;

    let created_at = Utc::now();
    let mut staged = StagedMovements::default();
    // Effective expiry per batch as seen so far in this staging pass.
    let mut staged_batches: HashMap<(ItemId, BatchNo), Option<NaiveDate>> = HashMap::new();

    for movement in &batch.movements {
        let mut effective_expiry = movement.expiry_date;

        if let Some(batch_no) = &movement.batch_no {
            let staged_key = (movement.item_id, batch_no.clone());
            let known = staged_batches.get(&staged_key).copied().or_else(|| {
                inner
                    .batches
                    .get(&(batch.tenant_id, movement.item_id, batch_no.clone()))
                    .map(|b| b.expiry_date)
            });

            match known {
                Some(registered) => {
                    if let (Some(incoming), Some(registered)) =
                        (movement.expiry_date, registered)
                        && incoming != registered
                    {
                        return Err(StoreError::InvalidMovement(format!(
                            "batch {batch_no} is registered with expiry {registered}, movement says {incoming}"
                        )));
                    }
                    effective_expiry = movement.expiry_date.or(registered);
                    // First concrete expiry fills in a batch registered without one.
                    if registered.is_none() && movement.expiry_date.is_some() {
                        staged.batches.push(Batch::new(
                            batch.tenant_id,
                            movement.item_id,
                            batch_no.clone(),
                            movement.expiry_date,
                            created_at,
                        ));
                    }
                }
                None => {
                    staged.batches.push(Batch::new(
                        batch.tenant_id,
                        movement.item_id,
                        batch_no.clone(),
                        movement.expiry_date,
                        created_at,
                    ));
                }
            }
            staged_batches.insert(staged_key, effective_expiry);
        }

        let key = movement.key(batch.tenant_id);
        let mut snapshot = staged
            .snapshots
            .get(&key)
            .cloned()
            .or_else(|| inner.positions.get(&key).map(|p| p.snapshot.clone()))
            .unwrap_or_else(|| {
                StockSnapshot::empty(movement.warehouse_id, effective_expiry, created_at)
            });

        if snapshot.warehouse_id != movement.warehouse_id {
            return Err(StoreError::InvalidMovement(format!(
                "bin {} belongs to a different warehouse",
                movement.bin_id
            )));
        }

        let qty_after = snapshot
            .post(movement.reason, movement.qty_change, created_at)
            .map_err(quantity_error)?;

        staged.snapshots.insert(key, snapshot);
        staged.entries.push(LedgerEntry {
            id: Uuid::now_v7(),
            operation_id: batch.operation_id,
            tenant_id: batch.tenant_id,
            warehouse_id: movement.warehouse_id,
            bin_id: movement.bin_id,
            item_id: movement.item_id,
            batch_no: movement.batch_no.clone(),
            reason: movement.reason,
            qty_change: movement.qty_change,
            qty_after,
            expiry_date: effective_expiry,
            reference: movement.reference,
            occurred_at: batch.occurred_at,
            created_at,
        });
    }

    Ok(staged)
}

fn commit_staged(inner: &mut Inner, staged: StagedMovements, operation_id: Uuid) {
    for batch in staged.batches {
        inner.batches.insert(
            (batch.tenant_id, batch.item_id, batch.batch_no.clone()),
            batch,
        );
    }

    for (key, snapshot) in staged.snapshots {
        match inner.positions.get_mut(&key) {
            Some(pos) => pos.snapshot = snapshot,
            None => {
                inner.positions.insert(
                    key,
                    Position {
                        snapshot,
                        entries: Vec::new(),
                    },
                );
            }
        }
    }

    for entry in &staged.entries {
        let key = StockKey {
            tenant_id: entry.tenant_id,
            bin_id: entry.bin_id,
            item_id: entry.item_id,
            batch_no: entry.batch_no.clone(),
        };
        if let Some(pos) = inner.positions.get_mut(&key) {
            pos.entries.push(entry.clone());
        }
    }

    inner.operations.insert(operation_id, staged.entries);
}

impl WorkflowStore for InMemoryStore {
    fn load_stream(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
    ) -> Result<Vec<StoredEvent>, StoreError> {
        let key = StreamKey {
            tenant_id,
            aggregate_id,
        };

        let inner = self
            .inner
            .read()
            .map_err(|_| StoreError::Storage("lock poisoned".to_string()))?;

        Ok(inner.streams.get(&key).cloned().unwrap_or_default())
    }

    fn append_with_movements(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
        movements: Option<MovementBatch>,
    ) -> Result<CommitOutcome, StoreError> {
        if events.is_empty() && movements.is_none() {
            return Ok(CommitOutcome::default());
        }

        let mut inner = self
            .inner
            .write()
            .map_err(|_| StoreError::Storage("lock poisoned".to_string()))?;

        // Movements-only commit (no header transition).
        let Some(first) = events.first() else {
            let Some(batch) = movements else {
                return Ok(CommitOutcome::default());
            };
            if let Some(entries) = inner.operations.get(&batch.operation_id) {
                return Ok(CommitOutcome {
                    events: vec![],
                    ledger_entries: entries.clone(),
                });
            }
            let staged = stage_movements(&inner, &batch)?;
            let entries = staged.entries.clone();
            commit_staged(&mut inner, staged, batch.operation_id);
            return Ok(CommitOutcome {
                events: vec![],
                ledger_entries: entries,
            });
        };

        // All events must target the same tenant + aggregate stream.
        let tenant_id = first.tenant_id;
        let aggregate_id = first.aggregate_id;
        let aggregate_type = first.aggregate_type.clone();

        for (idx, e) in events.iter().enumerate() {
            if e.tenant_id != tenant_id {
                return Err(StoreError::TenantIsolation(format!(
                    "batch contains multiple tenant_ids (index {idx})"
                )));
            }
            if e.aggregate_id != aggregate_id {
                return Err(StoreError::InvalidAppend(format!(
                    "batch contains multiple aggregate_ids (index {idx})"
                )));
            }
            if e.aggregate_type != aggregate_type {
                return Err(StoreError::InvalidAppend(format!(
                    "batch contains multiple aggregate_types (index {idx})"
                )));
            }
        }

        if let Some(batch) = &movements
            && batch.tenant_id != tenant_id
        {
            return Err(StoreError::TenantIsolation(
                "movement batch tenant does not match event tenant".to_string(),
            ));
        }

        let stream_key = StreamKey {
            tenant_id,
            aggregate_id,
        };
        let current = Self::current_version(
            inner
                .streams
                .get(&stream_key)
                .map_or(&[][..], |s| s.as_slice()),
        );

        if !expected_version.matches(current) {
            return Err(StoreError::Concurrency(format!(
                "expected {expected_version:?}, found {current}"
            )));
        }

        // Enforce aggregate type stability across the stream.
        if let Some(existing) = inner.streams.get(&stream_key).and_then(|s| s.first())
            && existing.aggregate_type != aggregate_type
        {
            return Err(StoreError::InvalidAppend(format!(
                "stream aggregate_type is '{}', attempted append with '{}'",
                existing.aggregate_type, aggregate_type
            )));
        }

        // Validate the ledger side before touching anything; the whole
        // commit fails here if any movement would overdraw.
        let staged = match &movements {
            Some(batch) => Some(stage_movements(&inner, batch)?),
            None => None,
        };

        // Assign sequence numbers and append (append-only).
        let mut next = current + 1;
        let mut committed = Vec::with_capacity(events.len());
        let stream = inner.streams.entry(stream_key).or_default();
        for e in events {
            let stored = StoredEvent {
                event_id: e.event_id,
                tenant_id: e.tenant_id,
                aggregate_id: e.aggregate_id,
                aggregate_type: e.aggregate_type,
                sequence_number: next,
                event_type: e.event_type,
                event_version: e.event_version,
                occurred_at: e.occurred_at,
                payload: e.payload,
            };
            next += 1;
            stream.push(stored.clone());
            committed.push(stored);
        }

        let mut ledger_entries = Vec::new();
        if let (Some(staged), Some(batch)) = (staged, movements) {
            ledger_entries = staged.entries.clone();
            commit_staged(&mut inner, staged, batch.operation_id);
        }

        Ok(CommitOutcome {
            events: committed,
            ledger_entries,
        })
    }
}

impl StockStore for InMemoryStore {
    fn apply_movements(&self, batch: MovementBatch) -> Result<Vec<LedgerEntry>, StoreError> {
        let mut inner = self
            .inner
            .write()
            .map_err(|_| StoreError::Storage("lock poisoned".to_string()))?;

        // Duplicate replay of a retried operation: return the original
        // entries, apply nothing.
        if let Some(entries) = inner.operations.get(&batch.operation_id) {
            return Ok(entries.clone());
        }

        let staged = stage_movements(&inner, &batch)?;
        let entries = staged.entries.clone();
        commit_staged(&mut inner, staged, batch.operation_id);
        Ok(entries)
    }

    fn snapshot(&self, key: &StockKey) -> Option<StockSnapshot> {
        let inner = self.inner.read().ok()?;
        inner.positions.get(key).map(|p| p.snapshot.clone())
    }

    fn snapshots_for_item(
        &self,
        tenant_id: TenantId,
        item_id: ItemId,
    ) -> Vec<(StockKey, StockSnapshot)> {
        let Ok(inner) = self.inner.read() else {
            return Vec::new();
        };
        let mut rows: Vec<_> = inner
            .positions
            .iter()
            .filter(|(key, _)| key.tenant_id == tenant_id && key.item_id == item_id)
            .map(|(key, pos)| (key.clone(), pos.snapshot.clone()))
            .collect();
        rows.sort_by_key(|(key, snapshot)| fefo_key(snapshot.expiry_date, key.bin_id));
        rows
    }

    fn snapshots_for_warehouse(
        &self,
        tenant_id: TenantId,
        warehouse_id: Option<WarehouseId>,
    ) -> Vec<(StockKey, StockSnapshot)> {
        let Ok(inner) = self.inner.read() else {
            return Vec::new();
        };
        let mut rows: Vec<_> = inner
            .positions
            .iter()
            .filter(|(key, pos)| {
                key.tenant_id == tenant_id
                    && warehouse_id.is_none_or(|w| pos.snapshot.warehouse_id == w)
            })
            .map(|(key, pos)| (key.clone(), pos.snapshot.clone()))
            .collect();
        // Deterministic scope order for baseline capture.
        rows.sort_by_key(|(key, _)| {
            (
                *key.item_id.as_uuid().as_bytes(),
                *key.bin_id.as_uuid().as_bytes(),
                key.batch_no.clone(),
            )
        });
        rows
    }

    fn ledger_for_key(&self, key: &StockKey) -> Vec<LedgerEntry> {
        let Ok(inner) = self.inner.read() else {
            return Vec::new();
        };
        inner
            .positions
            .get(key)
            .map(|p| p.entries.clone())
            .unwrap_or_default()
    }

    fn batch(&self, tenant_id: TenantId, item_id: ItemId, batch_no: &BatchNo) -> Option<Batch> {
        let inner = self.inner.read().ok()?;
        inner
            .batches
            .get(&(tenant_id, item_id, batch_no.clone()))
            .cloned()
    }

    fn reserve_fefo(
        &self,
        tenant_id: TenantId,
        item_id: ItemId,
        qty: i64,
        now: DateTime<Utc>,
    ) -> Result<Vec<ReservationAllocation>, StoreError> {
        if qty <= 0 {
            return Err(StoreError::InvalidMovement(
                "reservation quantity must be positive".to_string(),
            ));
        }

        let mut inner = self
            .inner
            .write()
            .map_err(|_| StoreError::Storage("lock poisoned".to_string()))?;

        let today = now.date_naive();
        let mut candidates: Vec<(StockKey, Option<NaiveDate>, i64)> = inner
            .positions
            .iter()
            .filter(|(key, pos)| {
                key.tenant_id == tenant_id
                    && key.item_id == item_id
                    && pos.snapshot.qty_available() > 0
                    // Expired batches are not eligible for new commitments.
                    && pos.snapshot.expiry_date.is_none_or(|d| d >= today)
            })
            .map(|(key, pos)| {
                (
                    key.clone(),
                    pos.snapshot.expiry_date,
                    pos.snapshot.qty_available(),
                )
            })
            .collect();

        let total: i64 = candidates.iter().map(|(_, _, available)| available).sum();
        if total < qty {
            return Err(StoreError::InsufficientAvailable {
                requested: qty,
                available: total,
            });
        }

        candidates.sort_by_key(|(key, expiry, _)| fefo_key(*expiry, key.bin_id));

        let mut remaining = qty;
        let mut allocations = Vec::new();
        for (key, _, available) in candidates {
            if remaining == 0 {
                break;
            }
            let take = remaining.min(available);
            if let Some(pos) = inner.positions.get_mut(&key) {
                pos.snapshot.reserve(take, now).map_err(quantity_error)?;
            }
            allocations.push(ReservationAllocation { key, qty: take });
            remaining -= take;
        }

        Ok(allocations)
    }

    fn release_allocations(
        &self,
        tenant_id: TenantId,
        allocations: &[ReservationAllocation],
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut inner = self
            .inner
            .write()
            .map_err(|_| StoreError::Storage("lock poisoned".to_string()))?;

        for allocation in allocations {
            if allocation.key.tenant_id != tenant_id {
                return Err(StoreError::TenantIsolation(
                    "allocation belongs to a different tenant".to_string(),
                ));
            }
            if let Some(pos) = inner.positions.get_mut(&allocation.key) {
                pos.snapshot.release(allocation.qty, now);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockline_stock::{Movement, MovementReason};

    fn receive_movement(
        warehouse_id: WarehouseId,
        bin_id: BinId,
        item_id: ItemId,
        qty: i64,
    ) -> Movement {
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

    use stockline_core::BinId;

    #[test]
    fn replayed_operation_is_not_double_applied() {
        let store = InMemoryStore::new();
        let tenant_id = TenantId::new();
        let (warehouse_id, bin_id, item_id) = (WarehouseId::new(), BinId::new(), ItemId::new());

        let batch = MovementBatch::single(
            Uuid::now_v7(),
            tenant_id,
            Utc::now(),
            receive_movement(warehouse_id, bin_id, item_id, 10),
        );

        let first = store.apply_movements(batch.clone()).unwrap();
        let replay = store.apply_movements(batch).unwrap();

        assert_eq!(first, replay);
        let key = StockKey {
            tenant_id,
            bin_id,
            item_id,
            batch_no: None,
        };
        assert_eq!(store.snapshot(&key).unwrap().qty_on_hand, 10);
    }

    #[test]
    fn failing_movement_fails_the_whole_batch() {
        let store = InMemoryStore::new();
        let tenant_id = TenantId::new();
        let (warehouse_id, bin_id, item_id) = (WarehouseId::new(), BinId::new(), ItemId::new());

        store
            .apply_movements(MovementBatch::single(
                Uuid::now_v7(),
                tenant_id,
                Utc::now(),
                receive_movement(warehouse_id, bin_id, item_id, 5),
            ))
            .unwrap();

        // First movement alone would succeed; the second overdraws.
        let batch = MovementBatch::new(
            Uuid::now_v7(),
            tenant_id,
            Utc::now(),
            vec![
                Movement {
                    reason: MovementReason::Adjust,
                    qty_change: -2,
                    ..receive_movement(warehouse_id, bin_id, item_id, 0)
                },
                Movement {
                    reason: MovementReason::Adjust,
                    qty_change: -7,
                    ..receive_movement(warehouse_id, bin_id, item_id, 0)
                },
            ],
        );

        let err = store.apply_movements(batch).unwrap_err();
        assert!(matches!(err, StoreError::InsufficientStock { .. }));

        let key = StockKey {
            tenant_id,
            bin_id,
            item_id,
            batch_no: None,
        };
        assert_eq!(store.snapshot(&key).unwrap().qty_on_hand, 5);
        assert_eq!(store.ledger_for_key(&key).len(), 1);
    }

    #[test]
    fn conflicting_batch_expiry_is_rejected() {
        let store = InMemoryStore::new();
        let tenant_id = TenantId::new();
        let (warehouse_id, bin_id, item_id) = (WarehouseId::new(), BinId::new(), ItemId::new());
        let lot = BatchNo::new("LOT-9").unwrap();

        let mut movement = receive_movement(warehouse_id, bin_id, item_id, 5);
        movement.batch_no = Some(lot.clone());
        movement.expiry_date = NaiveDate::from_ymd_opt(2026, 3, 1);
        store
            .apply_movements(MovementBatch::single(
                Uuid::now_v7(),
                tenant_id,
                Utc::now(),
                movement.clone(),
            ))
            .unwrap();

        movement.expiry_date = NaiveDate::from_ymd_opt(2026, 4, 1);
        let err = store
            .apply_movements(MovementBatch::single(
                Uuid::now_v7(),
                tenant_id,
                Utc::now(),
                movement,
            ))
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidMovement(_)));

        let registered = store.batch(tenant_id, item_id, &lot).unwrap();
        assert_eq!(registered.expiry_date, NaiveDate::from_ymd_opt(2026, 3, 1));
    }

    #[test]
    fn stale_version_append_is_rejected_without_ledger_writes() {
        let store = InMemoryStore::new();
        let tenant_id = TenantId::new();
        let aggregate_id = AggregateId::new();
        let (warehouse_id, bin_id, item_id) = (WarehouseId::new(), BinId::new(), ItemId::new());

        let event = |n: u32| UncommittedEvent {
            event_id: Uuid::now_v7(),
            tenant_id,
            aggregate_id,
            aggregate_type: "test.doc".to_string(),
            event_type: "test.doc.step".to_string(),
            event_version: n,
            occurred_at: Utc::now(),
            payload: serde_json::json!({}),
        };

        store
            .append_with_movements(vec![event(1)], ExpectedVersion::Exact(0), None)
            .unwrap();

        let batch = MovementBatch::single(
            Uuid::now_v7(),
            tenant_id,
            Utc::now(),
            receive_movement(warehouse_id, bin_id, item_id, 10),
        );

        let err = store
            .append_with_movements(vec![event(2)], ExpectedVersion::Exact(0), Some(batch))
            .unwrap_err();
        assert!(matches!(err, StoreError::Concurrency(_)));

        let key = StockKey {
            tenant_id,
            bin_id,
            item_id,
            batch_no: None,
        };
        assert!(store.snapshot(&key).is_none());
    }
}
