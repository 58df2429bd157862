//! Goods-receipt application service.

use serde_json::Value as JsonValue;
use uuid::Uuid;

use chrono::{NaiveDate, Utc};

use stockline_core::{AggregateId, BatchNo, BinId, DomainError, ItemId, TenantId, UserId, WarehouseId};
use stockline_events::{EventBus, EventEnvelope};
use stockline_receiving::{
    AddExpectedLine, AssignPutaway, CancelGrn, CancelPutaway, CompleteGrn, CompletePutaway,
    CreateGrn, Grn, GrnCommand, GrnEvent, GrnId, OpenGrn, ReceiveLine,
};
use stockline_stock::{Movement, MovementBatch, MovementReason, MovementRef};

use crate::dispatcher::{DispatchError, WorkflowDispatcher};
use crate::store::{CommitOutcome, WorkflowStore};

const AGGREGATE_TYPE: &str = "receiving.grn";

#[derive(Debug)]
pub struct ReceivingService<S, B> {
    dispatcher: WorkflowDispatcher<S, B>,
}

impl<S, B> ReceivingService<S, B>
where
    S: WorkflowStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    pub fn new(store: S, bus: B) -> Self {
        Self {
            dispatcher: WorkflowDispatcher::new(store, bus),
        }
    }

    pub fn get(&self, tenant_id: TenantId, grn_id: GrnId) -> Result<Grn, DispatchError> {
        self.dispatcher
            .load_aggregate(tenant_id, grn_id.0, |_, id| Grn::empty(GrnId::new(id)))
    }

    pub fn create(
        &self,
        tenant_id: TenantId,
        warehouse_id: WarehouseId,
        supplier_ref: Option<String>,
    ) -> Result<GrnId, DispatchError> {
        let aggregate_id = AggregateId::new();
        let grn_id = GrnId::new(aggregate_id);

        self.dispatch(
            tenant_id,
            grn_id,
            GrnCommand::CreateGrn(CreateGrn {
                tenant_id,
                grn_id,
                warehouse_id,
                supplier_ref,
                occurred_at: Utc::now(),
            }),
        )?;
        Ok(grn_id)
    }

    pub fn add_expected_line(
        &self,
        tenant_id: TenantId,
        grn_id: GrnId,
        item_id: ItemId,
        qty_expected: i64,
    ) -> Result<(), DispatchError> {
        self.dispatch(
            tenant_id,
            grn_id,
            GrnCommand::AddExpectedLine(AddExpectedLine {
                tenant_id,
                grn_id,
                item_id,
                qty_expected,
                occurred_at: Utc::now(),
            }),
        )
    }

    pub fn open(&self, tenant_id: TenantId, grn_id: GrnId) -> Result<(), DispatchError> {
        self.dispatch(
            tenant_id,
            grn_id,
            GrnCommand::OpenGrn(OpenGrn {
                tenant_id,
                grn_id,
                occurred_at: Utc::now(),
            }),
        )
    }

    /// Receive a quantity into the receiving bin: posts the RECEIVE ledger
    /// entry and spawns a putaway task, in one unit of work.
    #[allow(clippy::too_many_arguments)]
    pub fn receive_line(
        &self,
        tenant_id: TenantId,
        grn_id: GrnId,
        item_id: ItemId,
        qty_received: i64,
        receiving_bin_id: BinId,
        batch_no: Option<BatchNo>,
        expiry_date: Option<NaiveDate>,
    ) -> Result<CommitOutcome, DispatchError> {
        self.dispatcher.dispatch_with_movements(
            tenant_id,
            grn_id.0,
            AGGREGATE_TYPE,
            GrnCommand::ReceiveLine(ReceiveLine {
                tenant_id,
                grn_id,
                item_id,
                qty_received,
                receiving_bin_id,
                batch_no,
                expiry_date,
                occurred_at: Utc::now(),
            }),
            |_, id| Grn::empty(GrnId::new(id)),
            |grn, events| {
                let warehouse_id = require_warehouse(grn)?;
                let movements = events
                    .iter()
                    .filter_map(|event| match event {
                        GrnEvent::GrnLineReceived(e) => Some(Movement {
                            warehouse_id,
                            bin_id: e.receiving_bin_id,
                            item_id: e.item_id,
                            batch_no: e.batch_no.clone(),
                            reason: MovementReason::Receive,
                            qty_change: e.qty_received,
                            expiry_date: e.expiry_date,
                            reference: Some(MovementRef::Grn(e.grn_id.0)),
                        }),
                        _ => None,
                    })
                    .collect::<Vec<_>>();
                Ok(batch_or_none(tenant_id, movements))
            },
        )
    }

    pub fn assign_putaway(
        &self,
        tenant_id: TenantId,
        grn_id: GrnId,
        task_no: u32,
        assignee: UserId,
    ) -> Result<(), DispatchError> {
        self.dispatch(
            tenant_id,
            grn_id,
            GrnCommand::AssignPutaway(AssignPutaway {
                tenant_id,
                grn_id,
                task_no,
                assignee,
                occurred_at: Utc::now(),
            }),
        )
    }

    /// Move the task's stock from the receiving bin to `to_bin_id`: a
    /// TRANSFER pair (decrement source, increment target) in one batch.
    pub fn complete_putaway(
        &self,
        tenant_id: TenantId,
        grn_id: GrnId,
        task_no: u32,
        to_bin_id: BinId,
    ) -> Result<CommitOutcome, DispatchError> {
        self.dispatcher.dispatch_with_movements(
            tenant_id,
            grn_id.0,
            AGGREGATE_TYPE,
            GrnCommand::CompletePutaway(CompletePutaway {
                tenant_id,
                grn_id,
                task_no,
                to_bin_id,
                occurred_at: Utc::now(),
            }),
            |_, id| Grn::empty(GrnId::new(id)),
            |grn, events| {
                let warehouse_id = require_warehouse(grn)?;
                let mut movements = Vec::new();
                for event in events {
                    if let GrnEvent::PutawayCompleted(e) = event {
                        movements.push(Movement {
                            warehouse_id,
                            bin_id: e.from_bin_id,
                            item_id: e.item_id,
                            batch_no: e.batch_no.clone(),
                            reason: MovementReason::Transfer,
                            qty_change: -e.qty,
                            expiry_date: None,
                            reference: Some(MovementRef::Grn(e.grn_id.0)),
                        });
                        movements.push(Movement {
                            warehouse_id,
                            bin_id: e.to_bin_id,
                            item_id: e.item_id,
                            batch_no: e.batch_no.clone(),
                            reason: MovementReason::Transfer,
                            qty_change: e.qty,
                            expiry_date: e.expiry_date,
                            reference: Some(MovementRef::Grn(e.grn_id.0)),
                        });
                    }
                }
                Ok(batch_or_none(tenant_id, movements))
            },
        )
    }

    /// Mark the task cancelled; the stock stays in the receiving bin.
    pub fn cancel_putaway(
        &self,
        tenant_id: TenantId,
        grn_id: GrnId,
        task_no: u32,
    ) -> Result<(), DispatchError> {
        self.dispatch(
            tenant_id,
            grn_id,
            GrnCommand::CancelPutaway(CancelPutaway {
                tenant_id,
                grn_id,
                task_no,
                occurred_at: Utc::now(),
            }),
        )
    }

    pub fn complete(&self, tenant_id: TenantId, grn_id: GrnId) -> Result<(), DispatchError> {
        self.dispatch(
            tenant_id,
            grn_id,
            GrnCommand::CompleteGrn(CompleteGrn {
                tenant_id,
                grn_id,
                occurred_at: Utc::now(),
            }),
        )
    }

    pub fn cancel(&self, tenant_id: TenantId, grn_id: GrnId) -> Result<(), DispatchError> {
        self.dispatch(
            tenant_id,
            grn_id,
            GrnCommand::CancelGrn(CancelGrn {
                tenant_id,
                grn_id,
                occurred_at: Utc::now(),
            }),
        )
    }

    fn dispatch(
        &self,
        tenant_id: TenantId,
        grn_id: GrnId,
        command: GrnCommand,
    ) -> Result<(), DispatchError> {
        self.dispatcher
            .dispatch(tenant_id, grn_id.0, AGGREGATE_TYPE, command, |_, id| {
                Grn::empty(GrnId::new(id))
            })
            .map(|_| ())
    }
}

fn require_warehouse(grn: &Grn) -> Result<WarehouseId, DomainError> {
    grn.warehouse_id()
        .ok_or_else(|| DomainError::validation("grn has no warehouse"))
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
