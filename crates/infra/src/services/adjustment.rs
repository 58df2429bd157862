//! Manual adjustment application service.

use serde_json::Value as JsonValue;
use uuid::Uuid;

use chrono::Utc;

use stockline_adjustment::{
    AddAdjustmentLine, Adjustment, AdjustmentCommand, AdjustmentEvent, AdjustmentId,
    ApproveAdjustment, CreateAdjustment, PostAdjustment, RejectAdjustment, SubmitAdjustment,
};
use stockline_core::{AggregateId, BatchNo, BinId, ItemId, TenantId, WarehouseId};
use stockline_events::{EventBus, EventEnvelope};
use stockline_stock::{Movement, MovementBatch, MovementReason, MovementRef};

use crate::dispatcher::{DispatchError, WorkflowDispatcher};
use crate::store::{CommitOutcome, WorkflowStore};

const AGGREGATE_TYPE: &str = "adjustment";

#[derive(Debug)]
pub struct AdjustmentService<S, B> {
    dispatcher: WorkflowDispatcher<S, B>,
}

impl<S, B> AdjustmentService<S, B>
where
    S: WorkflowStore,
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
        adjustment_id: AdjustmentId,
    ) -> Result<Adjustment, DispatchError> {
        self.dispatcher
            .load_aggregate(tenant_id, adjustment_id.0, |_, id| {
                Adjustment::empty(AdjustmentId::new(id))
            })
    }

    pub fn create(
        &self,
        tenant_id: TenantId,
        warehouse_id: WarehouseId,
    ) -> Result<AdjustmentId, DispatchError> {
        let aggregate_id = AggregateId::new();
        let adjustment_id = AdjustmentId::new(aggregate_id);

        self.dispatch(
            tenant_id,
            adjustment_id,
            AdjustmentCommand::CreateAdjustment(CreateAdjustment {
                tenant_id,
                adjustment_id,
                warehouse_id,
                occurred_at: Utc::now(),
            }),
        )?;
        Ok(adjustment_id)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn add_line(
        &self,
        tenant_id: TenantId,
        adjustment_id: AdjustmentId,
        bin_id: BinId,
        item_id: ItemId,
        batch_no: Option<BatchNo>,
        qty_change: i64,
        reason: String,
    ) -> Result<(), DispatchError> {
        self.dispatch(
            tenant_id,
            adjustment_id,
            AdjustmentCommand::AddAdjustmentLine(AddAdjustmentLine {
                tenant_id,
                adjustment_id,
                bin_id,
                item_id,
                batch_no,
                qty_change,
                reason,
                occurred_at: Utc::now(),
            }),
        )
    }

    pub fn submit(
        &self,
        tenant_id: TenantId,
        adjustment_id: AdjustmentId,
    ) -> Result<(), DispatchError> {
        self.dispatch(
            tenant_id,
            adjustment_id,
            AdjustmentCommand::SubmitAdjustment(SubmitAdjustment {
                tenant_id,
                adjustment_id,
                occurred_at: Utc::now(),
            }),
        )
    }

    pub fn approve(
        &self,
        tenant_id: TenantId,
        adjustment_id: AdjustmentId,
    ) -> Result<(), DispatchError> {
        self.dispatch(
            tenant_id,
            adjustment_id,
            AdjustmentCommand::ApproveAdjustment(ApproveAdjustment {
                tenant_id,
                adjustment_id,
                occurred_at: Utc::now(),
            }),
        )
    }

    pub fn reject(
        &self,
        tenant_id: TenantId,
        adjustment_id: AdjustmentId,
    ) -> Result<(), DispatchError> {
        self.dispatch(
            tenant_id,
            adjustment_id,
            AdjustmentCommand::RejectAdjustment(RejectAdjustment {
                tenant_id,
                adjustment_id,
                occurred_at: Utc::now(),
            }),
        )
    }

    /// Apply every line as an ADJUST ledger entry, all-or-nothing: one line
    /// overdrawing its key rejects the whole post and no entry is written.
    pub fn post(
        &self,
        tenant_id: TenantId,
        adjustment_id: AdjustmentId,
    ) -> Result<CommitOutcome, DispatchError> {
        self.dispatcher.dispatch_with_movements(
            tenant_id,
            adjustment_id.0,
            AGGREGATE_TYPE,
            AdjustmentCommand::PostAdjustment(PostAdjustment {
                tenant_id,
                adjustment_id,
                occurred_at: Utc::now(),
            }),
            |_, id| Adjustment::empty(AdjustmentId::new(id)),
            |_, events| {
                let mut movements = Vec::new();
                for event in events {
                    if let AdjustmentEvent::AdjustmentPosted(e) = event {
                        for line in &e.lines {
                            movements.push(Movement {
                                warehouse_id: e.warehouse_id,
                                bin_id: line.bin_id,
                                item_id: line.item_id,
                                batch_no: line.batch_no.clone(),
                                reason: MovementReason::Adjust,
                                qty_change: line.qty_change,
                                expiry_date: None,
                                reference: Some(MovementRef::Adjustment(e.adjustment_id.0)),
                            });
                        }
                    }
                }
                Ok(batch_or_none(tenant_id, movements))
            },
        )
    }

    fn dispatch(
        &self,
        tenant_id: TenantId,
        adjustment_id: AdjustmentId,
        command: AdjustmentCommand,
    ) -> Result<(), DispatchError> {
        self.dispatcher
            .dispatch(
                tenant_id,
                adjustment_id.0,
                AGGREGATE_TYPE,
                command,
                |_, id| Adjustment::empty(AdjustmentId::new(id)),
            )
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
