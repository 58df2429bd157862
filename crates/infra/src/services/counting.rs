//! Cycle-count application service.

use serde_json::Value as JsonValue;
use uuid::Uuid;

use chrono::Utc;

use stockline_core::{AggregateId, ItemId, TenantId, WarehouseId};
use stockline_counting::{
    BaselineLine, CancelCount, CloseCount, CycleCount, CycleCountCommand, CycleCountEvent,
    CycleCountId, OpenCount, RecordCount, SubmitCount,
};
use stockline_events::{EventBus, EventEnvelope};
use stockline_stock::{Movement, MovementBatch, MovementReason, MovementRef};

use crate::dispatcher::{DispatchError, WorkflowDispatcher};
use crate::store::{CommitOutcome, StockStore, WorkflowStore};

const AGGREGATE_TYPE: &str = "counting.cycle_count";

#[derive(Debug)]
pub struct CountingService<S, B> {
    dispatcher: WorkflowDispatcher<S, B>,
}

impl<S, B> CountingService<S, B>
where
    S: WorkflowStore + StockStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    pub fn new(store: S, bus: B) -> Self {
        Self {
            dispatcher: WorkflowDispatcher::new(store, bus),
        }
    }

    pub fn get(
        &self,
        tenant_id: TenantId,
        count_id: CycleCountId,
    ) -> Result<CycleCount, DispatchError> {
        self.dispatcher.load_aggregate(tenant_id, count_id.0, |_, id| {
            CycleCount::empty(CycleCountId::new(id))
        })
    }

    /// Open a count over the warehouse's current positions (optionally one
    /// item only). The captured on-hand quantities are the frozen baseline:
    /// concurrent movements during the count window do not refresh it, the
    /// variance is explicitly against this point in time.
    pub fn open(
        &self,
        tenant_id: TenantId,
        warehouse_id: WarehouseId,
        item_filter: Option<ItemId>,
    ) -> Result<CycleCountId, DispatchError> {
        let lines: Vec<BaselineLine> = self
            .dispatcher
            .store()
            .snapshots_for_warehouse(tenant_id, Some(warehouse_id))
            .into_iter()
            .filter(|(key, _)| item_filter.is_none_or(|item| key.item_id == item))
            .map(|(key, snapshot)| BaselineLine {
                bin_id: key.bin_id,
                item_id: key.item_id,
                batch_no: key.batch_no,
                qty_expected: snapshot.qty_on_hand,
            })
            .collect();

        let aggregate_id = AggregateId::new();
        let count_id = CycleCountId::new(aggregate_id);

        self.dispatch(
            tenant_id,
            count_id,
            CycleCountCommand::OpenCount(OpenCount {
                tenant_id,
                count_id,
                warehouse_id,
                lines,
                occurred_at: Utc::now(),
            }),
        )?;
        Ok(count_id)
    }

    pub fn record(
        &self,
        tenant_id: TenantId,
        count_id: CycleCountId,
        line_no: u32,
        qty_counted: i64,
    ) -> Result<(), DispatchError> {
        self.dispatch(
            tenant_id,
            count_id,
            CycleCountCommand::RecordCount(RecordCount {
                tenant_id,
                count_id,
                line_no,
                qty_counted,
                occurred_at: Utc::now(),
            }),
        )
    }

    pub fn submit(
        &self,
        tenant_id: TenantId,
        count_id: CycleCountId,
    ) -> Result<(), DispatchError> {
        self.dispatch(
            tenant_id,
            count_id,
            CycleCountCommand::SubmitCount(SubmitCount {
                tenant_id,
                count_id,
                occurred_at: Utc::now(),
            }),
        )
    }

    /// Close the count: one ADJUST entry per nonzero variance, all in one
    /// unit of work. If live stock has drifted so far that a negative
    /// variance would cut below zero, the whole close fails and the count
    /// must be re-done.
    pub fn close(
        &self,
        tenant_id: TenantId,
        count_id: CycleCountId,
    ) -> Result<CommitOutcome, DispatchError> {
        self.dispatcher.dispatch_with_movements(
            tenant_id,
            count_id.0,
            AGGREGATE_TYPE,
            CycleCountCommand::CloseCount(CloseCount {
                tenant_id,
                count_id,
                occurred_at: Utc::now(),
            }),
            |_, id| CycleCount::empty(CycleCountId::new(id)),
            |_, events| {
                let mut movements = Vec::new();
                for event in events {
                    if let CycleCountEvent::CountClosed(e) = event {
                        for adjustment in &e.adjustments {
                            movements.push(Movement {
                                warehouse_id: e.warehouse_id,
                                bin_id: adjustment.bin_id,
                                item_id: adjustment.item_id,
                                batch_no: adjustment.batch_no.clone(),
                                reason: MovementReason::Adjust,
                                qty_change: adjustment.variance,
                                expiry_date: None,
                                reference: Some(MovementRef::CycleCount(e.count_id.0)),
                            });
                        }
                    }
                }
                Ok(batch_or_none(tenant_id, movements))
            },
        )
    }

    pub fn cancel(
        &self,
        tenant_id: TenantId,
        count_id: CycleCountId,
    ) -> Result<(), DispatchError> {
        self.dispatch(
            tenant_id,
            count_id,
            CycleCountCommand::CancelCount(CancelCount {
                tenant_id,
                count_id,
                occurred_at: Utc::now(),
            }),
        )
    }

    fn dispatch(
        &self,
        tenant_id: TenantId,
        count_id: CycleCountId,
        command: CycleCountCommand,
    ) -> Result<(), DispatchError> {
        self.dispatcher
            .dispatch(tenant_id, count_id.0, AGGREGATE_TYPE, command, |_, id| {
                CycleCount::empty(CycleCountId::new(id))
            })
            .map(|_| ())
    }
}

fn batch_or_none(tenant_id: TenantId, movements: Vec<Movement>) -> Option<MovementBatch> {
    if movements.is_empty() {
        None
    } else {
        Some(MovementBatch::new(
            Uuid::now_v7(),
            tenant_id,
            Utc::now(),
            movements,
        ))
    }
}
