//! Direct ledger movements (the commit-movement operation).
//!
//! External collaborators (order fulfillment, returns) move stock through
//! here with their own reason codes. The caller supplies the operation id:
//! retrying after a timeout with the same id replays safely.

use serde_json::Value as JsonValue;

use stockline_core::AggregateId;
use stockline_events::{EventBus, EventEnvelope};
use stockline_stock::{LedgerEntry, MovementBatch};

use crate::dispatcher::DispatchError;
use crate::store::StockStore;

#[derive(Debug)]
pub struct StockService<S, B> {
    store: S,
    bus: B,
}

impl<S, B> StockService<S, B>
where
    S: StockStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    pub fn new(store: S, bus: B) -> Self {
        Self { store, bus }
    }

    /// Post a movement batch, all-or-nothing, and publish the entries.
    #[tracing::instrument(skip(self, batch), fields(operation_id = %batch.operation_id, movements = batch.movements.len()))]
    pub fn commit_movement(&self, batch: MovementBatch) -> Result<Vec<LedgerEntry>, DispatchError> {
        let entries = self.store.apply_movements(batch)?;

        for (idx, entry) in entries.iter().enumerate() {
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

        Ok(entries)
    }
}
