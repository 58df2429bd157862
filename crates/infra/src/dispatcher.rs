//! Workflow action execution pipeline.
//!
//! Every workflow action runs the same way: load the header's event stream,
//! rehydrate the aggregate, let it decide (pure), derive the ledger movements
//! its events imply, then commit events + movements through one store call
//! under the optimistic version check. Committed envelopes are published
//! afterwards; the store remains the source of truth if publication fails.
//!
//! Concurrency errors are returned to the caller, never retried here: a
//! blind internal retry could mask a logic bug as transient contention.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use stockline_core::{Aggregate, AggregateId, DomainError, ExpectedVersion, TenantId};
use stockline_events::{EventBus, EventEnvelope};
use stockline_stock::MovementBatch;

use crate::store::{CommitOutcome, StoreError, StoredEvent, UncommittedEvent, WorkflowStore};

#[derive(Debug)]
pub enum DispatchError {
    /// Optimistic concurrency failure (stale header version); retry is the
    /// caller's decision.
    Concurrency(String),
    /// Tenant isolation violation (cross-tenant stream or batch mixing).
    TenantIsolation(String),
    /// A movement would overdraw a stock key.
    InsufficientStock { requested: i64, available: i64 },
    /// A reservation exceeds the item's summed availability.
    InsufficientAvailable { requested: i64, available: i64 },
    /// State change not legal from the current status.
    InvalidTransition(String),
    /// Deterministic input validation failure.
    Validation(String),
    /// Unknown header/line/key.
    NotFound,
    /// Failed to deserialize historical event payloads.
    Deserialize(String),
    /// Persisting to the store failed.
    Store(StoreError),
    /// Publication failed after a successful commit (at-least-once; the
    /// events are durable, republish is safe).
    Publish(String),
}

impl From<StoreError> for DispatchError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Concurrency(msg) => DispatchError::Concurrency(msg),
            StoreError::TenantIsolation(msg) => DispatchError::TenantIsolation(msg),
            StoreError::InsufficientStock {
                requested,
                available,
            } => DispatchError::InsufficientStock {
                requested,
                available,
            },
            StoreError::InsufficientAvailable {
                requested,
                available,
            } => DispatchError::InsufficientAvailable {
                requested,
                available,
            },
            other => DispatchError::Store(other),
        }
    }
}

impl From<DomainError> for DispatchError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::InsufficientStock {
                requested,
                available,
            } => DispatchError::InsufficientStock {
                requested,
                available,
            },
            DomainError::InsufficientAvailable {
                requested,
                available,
            } => DispatchError::InsufficientAvailable {
                requested,
                available,
            },
            DomainError::InvalidTransition(msg) => DispatchError::InvalidTransition(msg),
            DomainError::ConcurrentModification(msg) => DispatchError::Concurrency(msg),
            DomainError::NotFound => DispatchError::NotFound,
            DomainError::Validation(msg) => DispatchError::Validation(msg),
        }
    }
}

/// Reusable workflow action engine.
///
/// Generic over the store and the bus so tests run against the in-memory
/// pair and deployments can swap backends without touching domain code.
#[derive(Debug)]
pub struct WorkflowDispatcher<S, B> {
    store: S,
    bus: B,
}

impl<S, B> WorkflowDispatcher<S, B> {
    pub fn new(store: S, bus: B) -> Self {
        Self { store, bus }
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

impl<S, B> WorkflowDispatcher<S, B>
where
    S: WorkflowStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    /// Rehydrate an aggregate from its stream (read path).
    ///
    /// Fails with `NotFound` if the stream does not exist.
    pub fn load_aggregate<A>(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        make_aggregate: impl FnOnce(TenantId, AggregateId) -> A,
    ) -> Result<A, DispatchError>
    where
        A: Aggregate<Error = DomainError>,
        A::Event: DeserializeOwned,
    {
        let history = self.store.load_stream(tenant_id, aggregate_id)?;
        if history.is_empty() {
            return Err(DispatchError::NotFound);
        }
        validate_loaded_stream(tenant_id, aggregate_id, &history)?;

        let mut aggregate = make_aggregate(tenant_id, aggregate_id);
        apply_history::<A>(&mut aggregate, &history)?;
        Ok(aggregate)
    }

    /// Dispatch a command that moves no stock.
    pub fn dispatch<A>(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        aggregate_type: impl Into<String>,
        command: A::Command,
        make_aggregate: impl FnOnce(TenantId, AggregateId) -> A,
    ) -> Result<Vec<StoredEvent>, DispatchError>
    where
        A: Aggregate<Error = DomainError>,
        A::Event: stockline_events::Event + Serialize + DeserializeOwned,
    {
        self.dispatch_with_movements(
            tenant_id,
            aggregate_id,
            aggregate_type,
            command,
            make_aggregate,
            |_, _| Ok(None),
        )
        .map(|outcome| outcome.events)
    }

    /// Dispatch a command and commit the ledger movements its events imply
    /// in the same unit of work.
    ///
    /// `derive_movements` sees the aggregate state *before* the new events
    /// are applied, plus the decided events, and returns the batch to post
    /// (or `None` for transitions without stock side effects).
    pub fn dispatch_with_movements<A, F>(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        aggregate_type: impl Into<String>,
        command: A::Command,
        make_aggregate: impl FnOnce(TenantId, AggregateId) -> A,
        derive_movements: F,
    ) -> Result<CommitOutcome, DispatchError>
    where
        A: Aggregate<Error = DomainError>,
        A::Event: stockline_events::Event + Serialize + DeserializeOwned,
        F: FnOnce(&A, &[A::Event]) -> Result<Option<MovementBatch>, DomainError>,
    {
        // 1) Load history (tenant-scoped)
        let history = self.store.load_stream(tenant_id, aggregate_id)?;
        validate_loaded_stream(tenant_id, aggregate_id, &history)?;
        let expected = ExpectedVersion::Exact(stream_version(&history));

        // 2) Rehydrate aggregate
        let mut aggregate = make_aggregate(tenant_id, aggregate_id);
        apply_history::<A>(&mut aggregate, &history)?;

        // 3) Decide events (no mutation)
        let decided = aggregate.handle(&command).map_err(DispatchError::from)?;
        if decided.is_empty() {
            return Ok(CommitOutcome::default());
        }

        // 4) Derive the ledger side of the action
        let movements = derive_movements(&aggregate, &decided).map_err(DispatchError::from)?;

        // 5) Commit events + movements atomically (optimistic version check)
        let aggregate_type = aggregate_type.into();
        let uncommitted = decided
            .iter()
            .map(|ev| {
                UncommittedEvent::from_typed(
                    tenant_id,
                    aggregate_id,
                    aggregate_type.clone(),
                    Uuid::now_v7(),
                    ev,
                )
            })
            .collect::<Result<Vec<_>, _>>()?;

        let outcome = self
            .store
            .append_with_movements(uncommitted, expected, movements)?;

        // 6) Publish committed envelopes (after the commit)
        for stored in &outcome.events {
            self.bus
                .publish(stored.to_envelope())
                .map_err(|e| DispatchError::Publish(format!("{e:?}")))?;
        }
        for (idx, entry) in outcome.ledger_entries.iter().enumerate() {
            let payload = serde_json::to_value(entry)
                .map_err(|e| DispatchError::Publish(e.to_string()))?;
            let envelope = EventEnvelope::new(
                entry.id,
                entry.tenant_id,
                AggregateId::from_uuid(entry.operation_id),
                "stock.ledger_entry",
                (idx as u64) + 1,
                payload,
            );
            self.bus
                .publish(envelope)
                .map_err(|e| DispatchError::Publish(format!("{e:?}")))?;
        }

        Ok(outcome)
    }
}

fn stream_version(stream: &[StoredEvent]) -> u64 {
    stream.last().map(|e| e.sequence_number).unwrap_or(0)
}

fn validate_loaded_stream(
    tenant_id: TenantId,
    aggregate_id: AggregateId,
    stream: &[StoredEvent],
) -> Result<(), DispatchError> {
    // Enforce tenant isolation even if a buggy backend returns cross-tenant
    // data, and require strictly increasing sequence numbers.
    let mut last = 0u64;
    for (idx, e) in stream.iter().enumerate() {
        if e.tenant_id != tenant_id {
            return Err(DispatchError::TenantIsolation(format!(
                "loaded stream contains wrong tenant_id at index {idx}"
            )));
        }
        if e.aggregate_id != aggregate_id {
            return Err(DispatchError::TenantIsolation(format!(
                "loaded stream contains wrong aggregate_id at index {idx}"
            )));
        }
        if e.sequence_number == 0 {
            return Err(DispatchError::Store(StoreError::InvalidAppend(
                "stored event has sequence_number=0".to_string(),
            )));
        }
        if e.sequence_number <= last {
            return Err(DispatchError::Store(StoreError::InvalidAppend(format!(
                "non-monotonic sequence_number in loaded stream (last={last}, found={})",
                e.sequence_number
            ))));
        }
        last = e.sequence_number;
    }
    Ok(())
}

fn apply_history<A>(aggregate: &mut A, history: &[StoredEvent]) -> Result<(), DispatchError>
where
    A: Aggregate,
    A::Event: DeserializeOwned,
{
    // Ensure deterministic ordering.
    let mut sorted = history.to_vec();
    sorted.sort_by_key(|e| e.sequence_number);

    for stored in sorted {
        let ev: A::Event = serde_json::from_value(stored.payload)
            .map_err(|e| DispatchError::Deserialize(e.to_string()))?;
        aggregate.apply(&ev);
    }

    Ok(())
}
