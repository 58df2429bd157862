use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;
use uuid::Uuid;

use std::sync::Arc;

use stockline_batch::Batch;
use stockline_core::{
    AggregateId, BatchNo, DomainError, ExpectedVersion, ItemId, TenantId, WarehouseId,
};
use stockline_stock::{LedgerEntry, MovementBatch, StockKey, StockSnapshot};

/// A workflow event ready to be appended to a stream (not yet assigned a
/// sequence number).
///
/// Built from a typed domain event via [`UncommittedEvent::from_typed`]:
/// the payload is the serde_json serialization, the metadata comes from the
/// `Event` trait. The store assigns sequence numbers during append.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UncommittedEvent {
    pub event_id: Uuid,
    pub tenant_id: TenantId,
    pub aggregate_id: AggregateId,
    pub aggregate_type: String,

    pub event_type: String,
    pub event_version: u32,
    pub occurred_at: DateTime<Utc>,

    pub payload: JsonValue,
}

impl UncommittedEvent {
    /// Convenience constructor from a typed workflow event.
    pub fn from_typed<E>(
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        aggregate_type: impl Into<String>,
        event_id: Uuid,
        event: &E,
    ) -> Result<Self, StoreError>
    where
        E: stockline_events::Event + Serialize,
    {
        let payload = serde_json::to_value(event).map_err(|e| {
            StoreError::InvalidAppend(format!("payload serialization failed: {e}"))
        })?;

        Ok(Self {
            event_id,
            tenant_id,
            aggregate_id,
            aggregate_type: aggregate_type.into(),
            event_type: event.event_type().to_string(),
            event_version: event.version(),
            occurred_at: event.occurred_at(),
            payload,
        })
    }
}

/// A stored workflow event in an append-only stream.
///
/// Sequence numbers are assigned by the store, are stream-scoped
/// (per tenant + aggregate), strictly increasing, and immutable once
/// assigned. The last sequence number of a stream is the version the
/// optimistic concurrency check compares against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredEvent {
    pub event_id: Uuid,
    pub tenant_id: TenantId,
    pub aggregate_id: AggregateId,
    pub aggregate_type: String,

    /// Monotonically increasing position in the aggregate stream.
    pub sequence_number: u64,

    pub event_type: String,
    pub event_version: u32,
    pub occurred_at: DateTime<Utc>,

    pub payload: JsonValue,
}

impl StoredEvent {
    pub fn stream_version(&self) -> u64 {
        self.sequence_number
    }

    /// Convert a stored event into a tenant-scoped envelope for publication.
    pub fn to_envelope(&self) -> stockline_events::EventEnvelope<JsonValue> {
        stockline_events::EventEnvelope::new(
            self.event_id,
            self.tenant_id,
            self.aggregate_id,
            self.aggregate_type.clone(),
            self.sequence_number,
            self.payload.clone(),
        )
    }
}

/// Result of one atomic commit: the appended workflow events and the ledger
/// entries posted in the same unit of work.
#[derive(Debug, Clone, Default)]
pub struct CommitOutcome {
    pub events: Vec<StoredEvent>,
    pub ledger_entries: Vec<LedgerEntry>,
}

/// One reserved quantity against one stock key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationAllocation {
    pub key: StockKey,
    pub qty: i64,
}

/// Store operation error.
///
/// Infrastructure-side taxonomy; the quantity and concurrency variants map
/// 1:1 onto their domain counterparts so callers see one consistent surface.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("concurrent modification: {0}")]
    Concurrency(String),

    #[error("tenant isolation violation: {0}")]
    TenantIsolation(String),

    #[error("insufficient stock: requested {requested}, available {available}")]
    InsufficientStock { requested: i64, available: i64 },

    #[error("insufficient available quantity: requested {requested}, available {available}")]
    InsufficientAvailable { requested: i64, available: i64 },

    #[error("invalid movement: {0}")]
    InvalidMovement(String),

    #[error("invalid append: {0}")]
    InvalidAppend(String),

    #[error("storage failure: {0}")]
    Storage(String),
}

impl From<StoreError> for DomainError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Concurrency(msg) => DomainError::ConcurrentModification(msg),
            StoreError::InsufficientStock {
                requested,
                available,
            } => DomainError::InsufficientStock {
                requested,
                available,
            },
            StoreError::InsufficientAvailable {
                requested,
                available,
            } => DomainError::InsufficientAvailable {
                requested,
                available,
            },
            StoreError::TenantIsolation(msg)
            | StoreError::InvalidMovement(msg)
            | StoreError::InvalidAppend(msg)
            | StoreError::Storage(msg) => DomainError::Validation(msg),
        }
    }
}

/// Append-only, tenant-scoped store of workflow event streams.
///
/// `append_with_movements` is the transaction boundary of the system: the
/// optimistic version check on the stream, the validation of every movement
/// in the batch, the ledger append and the snapshot updates all succeed or
/// all fail together. Implementations must make that atomic — a single
/// writer lock in memory, a single serializable transaction in SQL.
pub trait WorkflowStore: Send + Sync {
    /// Load the full stream for a tenant + aggregate, in sequence order.
    /// Returns an empty vector if the stream does not exist yet.
    fn load_stream(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
    ) -> Result<Vec<StoredEvent>, StoreError>;

    /// Append events to one aggregate stream and post the accompanying
    /// movement batch (if any) atomically.
    ///
    /// Implementations must:
    /// - enforce tenant isolation across the event batch and the movements
    /// - enforce optimistic concurrency against the current stream version
    /// - assign monotonically increasing `sequence_number`s
    /// - post all ledger entries of the batch or none
    fn append_with_movements(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
        movements: Option<MovementBatch>,
    ) -> Result<CommitOutcome, StoreError>;

    /// Append without any ledger writes.
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, StoreError> {
        self.append_with_movements(events, expected_version, None)
            .map(|outcome| outcome.events)
    }
}

/// The stock side of the store: movement batches, snapshot and ledger reads,
/// and the reservation increments.
///
/// Operations on the same (tenant, bin, item, batch) key serialize;
/// operations on disjoint keys are free to proceed concurrently.
pub trait StockStore: Send + Sync {
    /// Validate and post a movement batch, all-or-nothing.
    ///
    /// Replaying a batch whose `operation_id` was already applied returns
    /// the originally produced entries without applying anything.
    fn apply_movements(&self, batch: MovementBatch) -> Result<Vec<LedgerEntry>, StoreError>;

    /// Current snapshot of one key, if the position exists.
    fn snapshot(&self, key: &StockKey) -> Option<StockSnapshot>;

    /// All positions of one item across bins (FEFO planning input).
    fn snapshots_for_item(
        &self,
        tenant_id: TenantId,
        item_id: ItemId,
    ) -> Vec<(StockKey, StockSnapshot)>;

    /// All positions of a tenant, optionally restricted to one warehouse.
    fn snapshots_for_warehouse(
        &self,
        tenant_id: TenantId,
        warehouse_id: Option<WarehouseId>,
    ) -> Vec<(StockKey, StockSnapshot)>;

    /// Ledger read-back for one key, in write order.
    fn ledger_for_key(&self, key: &StockKey) -> Vec<LedgerEntry>;

    /// Batch master data, registered by the first movement that named it.
    fn batch(&self, tenant_id: TenantId, item_id: ItemId, batch_no: &BatchNo) -> Option<Batch>;

    /// Place a soft hold of `qty` for one item, consuming positions in FEFO
    /// order (expiry ascending, no-expiry last, bin id tiebreak). Expired
    /// batches are not eligible. Fails with `InsufficientAvailable` when the
    /// summed availability is short; on success every chosen snapshot's
    /// reserved quantity was incremented atomically.
    fn reserve_fefo(
        &self,
        tenant_id: TenantId,
        item_id: ItemId,
        qty: i64,
        now: DateTime<Utc>,
    ) -> Result<Vec<ReservationAllocation>, StoreError>;

    /// Release previously granted holds. Saturating per key: a reservation
    /// starved by a shrinkage adjustment releases what is still held.
    fn release_allocations(
        &self,
        tenant_id: TenantId,
        allocations: &[ReservationAllocation],
        now: DateTime<Utc>,
    ) -> Result<(), StoreError>;
}

impl<S> WorkflowStore for Arc<S>
where
    S: WorkflowStore + ?Sized,
{
    fn load_stream(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
    ) -> Result<Vec<StoredEvent>, StoreError> {
        (**self).load_stream(tenant_id, aggregate_id)
    }

    fn append_with_movements(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
        movements: Option<MovementBatch>,
    ) -> Result<CommitOutcome, StoreError> {
        (**self).append_with_movements(events, expected_version, movements)
    }
}

impl<S> StockStore for Arc<S>
where
    S: StockStore + ?Sized,
{
    fn apply_movements(&self, batch: MovementBatch) -> Result<Vec<LedgerEntry>, StoreError> {
        (**self).apply_movements(batch)
    }

    fn snapshot(&self, key: &StockKey) -> Option<StockSnapshot> {
        (**self).snapshot(key)
    }

    fn snapshots_for_item(
        &self,
        tenant_id: TenantId,
        item_id: ItemId,
    ) -> Vec<(StockKey, StockSnapshot)> {
        (**self).snapshots_for_item(tenant_id, item_id)
    }

    fn snapshots_for_warehouse(
        &self,
        tenant_id: TenantId,
        warehouse_id: Option<WarehouseId>,
    ) -> Vec<(StockKey, StockSnapshot)> {
        (**self).snapshots_for_warehouse(tenant_id, warehouse_id)
    }

    fn ledger_for_key(&self, key: &StockKey) -> Vec<LedgerEntry> {
        (**self).ledger_for_key(key)
    }

    fn batch(&self, tenant_id: TenantId, item_id: ItemId, batch_no: &BatchNo) -> Option<Batch> {
        (**self).batch(tenant_id, item_id, batch_no)
    }

    fn reserve_fefo(
        &self,
        tenant_id: TenantId,
        item_id: ItemId,
        qty: i64,
        now: DateTime<Utc>,
    ) -> Result<Vec<ReservationAllocation>, StoreError> {
        (**self).reserve_fefo(tenant_id, item_id, qty, now)
    }

    fn release_allocations(
        &self,
        tenant_id: TenantId,
        allocations: &[ReservationAllocation],
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        (**self).release_allocations(tenant_id, allocations, now)
    }
}
