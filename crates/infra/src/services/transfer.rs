//! Inter-branch transfer application service.

use serde_json::Value as JsonValue;
use uuid::Uuid;

use chrono::Utc;

use stockline_core::{AggregateId, BatchNo, BinId, ItemId, TenantId, WarehouseId};
use stockline_events::{EventBus, EventEnvelope};
use stockline_stock::{Movement, MovementBatch, MovementReason, MovementRef};
use stockline_transfer::{
    AddIbtLine, ApproveIbt, CancelIbt, CreateIbt, Ibt, IbtCommand, IbtEvent, IbtId,
    ReceiveIbt, ReceiveLineQty, ShipIbt, ShipLineQty, StartPicking, SubmitIbt,
};

use crate::dispatcher::{DispatchError, WorkflowDispatcher};
use crate::store::{CommitOutcome, WorkflowStore};

const AGGREGATE_TYPE: &str = "transfer.ibt";

#[derive(Debug)]
pub struct TransferService<S, B> {
    dispatcher: WorkflowDispatcher<S, B>,
}

impl<S, B> TransferService<S, B>
where
    S: WorkflowStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    pub fn new(store: S, bus: B) -> Self {
        Self {
            dispatcher: WorkflowDispatcher::new(store, bus),
        }
    }

    pub fn get(&self, tenant_id: TenantId, ibt_id: IbtId) -> Result<Ibt, DispatchError> {
        self.dispatcher
            .load_aggregate(tenant_id, ibt_id.0, |_, id| Ibt::empty(IbtId::new(id)))
    }

    pub fn create(
        &self,
        tenant_id: TenantId,
        source_warehouse_id: WarehouseId,
        dest_warehouse_id: WarehouseId,
    ) -> Result<IbtId, DispatchError> {
        let aggregate_id = AggregateId::new();
        let ibt_id = IbtId::new(aggregate_id);

        self.dispatch(
            tenant_id,
            ibt_id,
            IbtCommand::CreateIbt(CreateIbt {
                tenant_id,
                ibt_id,
                source_warehouse_id,
                dest_warehouse_id,
                occurred_at: Utc::now(),
            }),
        )?;
        Ok(ibt_id)
    }

    pub fn add_line(
        &self,
        tenant_id: TenantId,
        ibt_id: IbtId,
        item_id: ItemId,
        batch_no: Option<BatchNo>,
        from_bin_id: BinId,
        qty_requested: i64,
    ) -> Result<(), DispatchError> {
        self.dispatch(
            tenant_id,
            ibt_id,
            IbtCommand::AddIbtLine(AddIbtLine {
                tenant_id,
                ibt_id,
                item_id,
                batch_no,
                from_bin_id,
                qty_requested,
                occurred_at: Utc::now(),
            }),
        )
    }

    pub fn submit(&self, tenant_id: TenantId, ibt_id: IbtId) -> Result<(), DispatchError> {
        self.dispatch(
            tenant_id,
            ibt_id,
            IbtCommand::SubmitIbt(SubmitIbt {
                tenant_id,
                ibt_id,
                occurred_at: Utc::now(),
            }),
        )
    }

    pub fn approve(&self, tenant_id: TenantId, ibt_id: IbtId) -> Result<(), DispatchError> {
        self.dispatch(
            tenant_id,
            ibt_id,
            IbtCommand::ApproveIbt(ApproveIbt {
                tenant_id,
                ibt_id,
                occurred_at: Utc::now(),
            }),
        )
    }

    pub fn start_picking(&self, tenant_id: TenantId, ibt_id: IbtId) -> Result<(), DispatchError> {
        self.dispatch(
            tenant_id,
            ibt_id,
            IbtCommand::StartPicking(StartPicking {
                tenant_id,
                ibt_id,
                occurred_at: Utc::now(),
            }),
        )
    }

    /// Ship the listed quantities: IBT_OUT entries at the source bins, the
    /// only point where source stock decrements.
    pub fn ship(
        &self,
        tenant_id: TenantId,
        ibt_id: IbtId,
        lines: Vec<ShipLineQty>,
    ) -> Result<CommitOutcome, DispatchError> {
        self.dispatcher.dispatch_with_movements(
            tenant_id,
            ibt_id.0,
            AGGREGATE_TYPE,
            IbtCommand::ShipIbt(ShipIbt {
                tenant_id,
                ibt_id,
                lines,
                occurred_at: Utc::now(),
            }),
            |_, id| Ibt::empty(IbtId::new(id)),
            |_, events| {
                let mut movements = Vec::new();
                for event in events {
                    if let IbtEvent::IbtShipped(e) = event {
                        for line in &e.lines {
                            movements.push(Movement {
                                warehouse_id: e.source_warehouse_id,
                                bin_id: line.from_bin_id,
                                item_id: line.item_id,
                                batch_no: line.batch_no.clone(),
                                reason: MovementReason::IbtOut,
                                qty_change: -line.qty_shipped,
                                expiry_date: None,
                                reference: Some(MovementRef::Ibt(e.ibt_id.0)),
                            });
                        }
                    }
                }
                Ok(batch_or_none(tenant_id, movements))
            },
        )
    }

    /// Receive at the destination: IBT_IN entries at the chosen bins. A
    /// received quantity differing from the shipped one stays visible as a
    /// ledger diff; nothing reconciles it silently.
    pub fn receive(
        &self,
        tenant_id: TenantId,
        ibt_id: IbtId,
        lines: Vec<ReceiveLineQty>,
    ) -> Result<CommitOutcome, DispatchError> {
        self.dispatcher.dispatch_with_movements(
            tenant_id,
            ibt_id.0,
            AGGREGATE_TYPE,
            IbtCommand::ReceiveIbt(ReceiveIbt {
                tenant_id,
                ibt_id,
                lines,
                occurred_at: Utc::now(),
            }),
            |_, id| Ibt::empty(IbtId::new(id)),
            |_, events| {
                let mut movements = Vec::new();
                for event in events {
                    if let IbtEvent::IbtReceived(e) = event {
                        for line in &e.lines {
                            movements.push(Movement {
                                warehouse_id: e.dest_warehouse_id,
                                bin_id: line.to_bin_id,
                                item_id: line.item_id,
                                batch_no: line.batch_no.clone(),
                                reason: MovementReason::IbtIn,
                                qty_change: line.qty_received,
                                expiry_date: None,
                                reference: Some(MovementRef::Ibt(e.ibt_id.0)),
                            });
                        }
                    }
                }
                Ok(batch_or_none(tenant_id, movements))
            },
        )
    }

    pub fn cancel(&self, tenant_id: TenantId, ibt_id: IbtId) -> Result<(), DispatchError> {
        self.dispatch(
            tenant_id,
            ibt_id,
            IbtCommand::CancelIbt(CancelIbt {
                tenant_id,
                ibt_id,
                occurred_at: Utc::now(),
            }),
        )
    }

    fn dispatch(
        &self,
        tenant_id: TenantId,
        ibt_id: IbtId,
        command: IbtCommand,
    ) -> Result<(), DispatchError> {
        self.dispatcher
            .dispatch(tenant_id, ibt_id.0, AGGREGATE_TYPE, command, |_, id| {
                Ibt::empty(IbtId::new(id))
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
