use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockline_core::{
    Aggregate, AggregateId, AggregateRoot, BatchNo, BinId, DomainError, ItemId, TenantId,
    WarehouseId,
};
use stockline_events::Event;

/// Inter-branch transfer identifier (tenant-scoped via `tenant_id` fields in events/commands).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IbtId(pub AggregateId);

impl IbtId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for IbtId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// IBT header lifecycle.
///
/// Cancellation is legal from any state before InTransit; once a line has
/// shipped, the document can only run forward to Received.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IbtStatus {
    Draft,
    PendingApproval,
    Approved,
    Picking,
    InTransit,
    Received,
    Cancelled,
}

/// One transferred item.
///
/// The source bin is fixed when the line is added; the destination bin is
/// chosen at receive time. Shipped and received quantities may legitimately
/// differ from requested and from each other (partial ship, loss in
/// transit) — the shortfall is visible in the ledger, never auto-corrected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IbtLine {
    pub line_no: u32,
    pub item_id: ItemId,
    pub batch_no: Option<BatchNo>,
    pub from_bin_id: BinId,
    pub qty_requested: i64,
    pub qty_shipped: i64,
    pub qty_received: i64,
    pub to_bin_id: Option<BinId>,
}

impl IbtLine {
    pub fn partially_shipped(&self) -> bool {
        self.qty_shipped > 0 && self.qty_shipped < self.qty_requested
    }
}

/// Aggregate root: Ibt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ibt {
    id: IbtId,
    tenant_id: Option<TenantId>,
    source_warehouse_id: Option<WarehouseId>,
    dest_warehouse_id: Option<WarehouseId>,
    status: IbtStatus,
    lines: Vec<IbtLine>,
    version: u64,
    created: bool,
}

impl Ibt {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: IbtId) -> Self {
        Self {
            id,
            tenant_id: None,
            source_warehouse_id: None,
            dest_warehouse_id: None,
            status: IbtStatus::Draft,
            lines: Vec::new(),
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> IbtId {
        self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn source_warehouse_id(&self) -> Option<WarehouseId> {
        self.source_warehouse_id
    }

    pub fn dest_warehouse_id(&self) -> Option<WarehouseId> {
        self.dest_warehouse_id
    }

    pub fn status(&self) -> IbtStatus {
        self.status
    }

    pub fn lines(&self) -> &[IbtLine] {
        &self.lines
    }

    fn line(&self, line_no: u32) -> Option<&IbtLine> {
        self.lines.iter().find(|l| l.line_no == line_no)
    }
}

impl AggregateRoot for Ibt {
    type Id = IbtId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateIbt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateIbt {
    pub tenant_id: TenantId,
    pub ibt_id: IbtId,
    pub source_warehouse_id: WarehouseId,
    pub dest_warehouse_id: WarehouseId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AddIbtLine (only allowed in Draft).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddIbtLine {
    pub tenant_id: TenantId,
    pub ibt_id: IbtId,
    pub item_id: ItemId,
    pub batch_no: Option<BatchNo>,
    pub from_bin_id: BinId,
    pub qty_requested: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: SubmitIbt (Draft -> PendingApproval; requires at least one line).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitIbt {
    pub tenant_id: TenantId,
    pub ibt_id: IbtId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ApproveIbt (authorization gate, no stock side effects).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApproveIbt {
    pub tenant_id: TenantId,
    pub ibt_id: IbtId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: StartPicking (advisory only).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartPicking {
    pub tenant_id: TenantId,
    pub ibt_id: IbtId,
    pub occurred_at: DateTime<Utc>,
}

/// Per-line shipped quantity (may be less than requested).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipLineQty {
    pub line_no: u32,
    pub qty_shipped: i64,
}

/// Command: ShipIbt (-> InTransit; the only point source stock decrements).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipIbt {
    pub tenant_id: TenantId,
    pub ibt_id: IbtId,
    pub lines: Vec<ShipLineQty>,
    pub occurred_at: DateTime<Utc>,
}

/// Per-line received quantity and destination bin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiveLineQty {
    pub line_no: u32,
    pub qty_received: i64,
    pub to_bin_id: BinId,
}

/// Command: ReceiveIbt (-> Received; destination stock increments).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiveIbt {
    pub tenant_id: TenantId,
    pub ibt_id: IbtId,
    pub lines: Vec<ReceiveLineQty>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CancelIbt (legal only before anything shipped).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelIbt {
    pub tenant_id: TenantId,
    pub ibt_id: IbtId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum IbtCommand {
    CreateIbt(CreateIbt),
    AddIbtLine(AddIbtLine),
    SubmitIbt(SubmitIbt),
    ApproveIbt(ApproveIbt),
    StartPicking(StartPicking),
    ShipIbt(ShipIbt),
    ReceiveIbt(ReceiveIbt),
    CancelIbt(CancelIbt),
}

/// Event: IbtCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IbtCreated {
    pub tenant_id: TenantId,
    pub ibt_id: IbtId,
    pub source_warehouse_id: WarehouseId,
    pub dest_warehouse_id: WarehouseId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: IbtLineAdded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IbtLineAdded {
    pub tenant_id: TenantId,
    pub ibt_id: IbtId,
    pub line_no: u32,
    pub item_id: ItemId,
    pub batch_no: Option<BatchNo>,
    pub from_bin_id: BinId,
    pub qty_requested: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: IbtSubmitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IbtSubmitted {
    pub tenant_id: TenantId,
    pub ibt_id: IbtId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: IbtApproved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IbtApproved {
    pub tenant_id: TenantId,
    pub ibt_id: IbtId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: IbtPickingStarted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IbtPickingStarted {
    pub tenant_id: TenantId,
    pub ibt_id: IbtId,
    pub occurred_at: DateTime<Utc>,
}

/// One shipped line with full movement detail for the source-side ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippedLine {
    pub line_no: u32,
    pub item_id: ItemId,
    pub batch_no: Option<BatchNo>,
    pub from_bin_id: BinId,
    pub qty_shipped: i64,
}

/// Event: IbtShipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IbtShipped {
    pub tenant_id: TenantId,
    pub ibt_id: IbtId,
    pub source_warehouse_id: WarehouseId,
    pub lines: Vec<ShippedLine>,
    pub occurred_at: DateTime<Utc>,
}

/// One received line with full movement detail for the destination ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceivedLine {
    pub line_no: u32,
    pub item_id: ItemId,
    pub batch_no: Option<BatchNo>,
    pub to_bin_id: BinId,
    pub qty_received: i64,
}

/// Event: IbtReceived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IbtReceived {
    pub tenant_id: TenantId,
    pub ibt_id: IbtId,
    pub dest_warehouse_id: WarehouseId,
    pub lines: Vec<ReceivedLine>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: IbtCancelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IbtCancelled {
    pub tenant_id: TenantId,
    pub ibt_id: IbtId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum IbtEvent {
    IbtCreated(IbtCreated),
    IbtLineAdded(IbtLineAdded),
    IbtSubmitted(IbtSubmitted),
    IbtApproved(IbtApproved),
    IbtPickingStarted(IbtPickingStarted),
    IbtShipped(IbtShipped),
    IbtReceived(IbtReceived),
    IbtCancelled(IbtCancelled),
}

impl Event for IbtEvent {
    fn event_type(&self) -> &'static str {
        match self {
            IbtEvent::IbtCreated(_) => "transfer.ibt.created",
            IbtEvent::IbtLineAdded(_) => "transfer.ibt.line_added",
            IbtEvent::IbtSubmitted(_) => "transfer.ibt.submitted",
            IbtEvent::IbtApproved(_) => "transfer.ibt.approved",
            IbtEvent::IbtPickingStarted(_) => "transfer.ibt.picking_started",
            IbtEvent::IbtShipped(_) => "transfer.ibt.shipped",
            IbtEvent::IbtReceived(_) => "transfer.ibt.received",
            IbtEvent::IbtCancelled(_) => "transfer.ibt.cancelled",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            IbtEvent::IbtCreated(e) => e.occurred_at,
            IbtEvent::IbtLineAdded(e) => e.occurred_at,
            IbtEvent::IbtSubmitted(e) => e.occurred_at,
            IbtEvent::IbtApproved(e) => e.occurred_at,
            IbtEvent::IbtPickingStarted(e) => e.occurred_at,
            IbtEvent::IbtShipped(e) => e.occurred_at,
            IbtEvent::IbtReceived(e) => e.occurred_at,
            IbtEvent::IbtCancelled(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Ibt {
    type Command = IbtCommand;
    type Event = IbtEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            IbtEvent::IbtCreated(e) => {
                self.id = e.ibt_id;
                self.tenant_id = Some(e.tenant_id);
                self.source_warehouse_id = Some(e.source_warehouse_id);
                self.dest_warehouse_id = Some(e.dest_warehouse_id);
                self.status = IbtStatus::Draft;
                self.lines.clear();
                self.created = true;
            }
            IbtEvent::IbtLineAdded(e) => {
                self.lines.push(IbtLine {
                    line_no: e.line_no,
                    item_id: e.item_id,
                    batch_no: e.batch_no.clone(),
                    from_bin_id: e.from_bin_id,
                    qty_requested: e.qty_requested,
                    qty_shipped: 0,
                    qty_received: 0,
                    to_bin_id: None,
                });
            }
            IbtEvent::IbtSubmitted(_) => {
                self.status = IbtStatus::PendingApproval;
            }
            IbtEvent::IbtApproved(_) => {
                self.status = IbtStatus::Approved;
            }
            IbtEvent::IbtPickingStarted(_) => {
                self.status = IbtStatus::Picking;
            }
            IbtEvent::IbtShipped(e) => {
                for shipped in &e.lines {
                    if let Some(line) =
                        self.lines.iter_mut().find(|l| l.line_no == shipped.line_no)
                    {
                        line.qty_shipped += shipped.qty_shipped;
                    }
                }
                self.status = IbtStatus::InTransit;
            }
            IbtEvent::IbtReceived(e) => {
                for received in &e.lines {
                    if let Some(line) =
                        self.lines.iter_mut().find(|l| l.line_no == received.line_no)
                    {
                        line.qty_received += received.qty_received;
                        line.to_bin_id = Some(received.to_bin_id);
                    }
                }
                self.status = IbtStatus::Received;
            }
            IbtEvent::IbtCancelled(_) => {
                self.status = IbtStatus::Cancelled;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            IbtCommand::CreateIbt(cmd) => self.handle_create(cmd),
            IbtCommand::AddIbtLine(cmd) => self.handle_add_line(cmd),
            IbtCommand::SubmitIbt(cmd) => self.handle_submit(cmd),
            IbtCommand::ApproveIbt(cmd) => self.handle_approve(cmd),
            IbtCommand::StartPicking(cmd) => self.handle_start_picking(cmd),
            IbtCommand::ShipIbt(cmd) => self.handle_ship(cmd),
            IbtCommand::ReceiveIbt(cmd) => self.handle_receive(cmd),
            IbtCommand::CancelIbt(cmd) => self.handle_cancel(cmd),
        }
    }
}

impl Ibt {
    fn ensure_tenant(&self, tenant_id: TenantId) -> Result<(), DomainError> {
        if !self.created {
            return Ok(());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::validation("tenant mismatch"));
        }
        Ok(())
    }

    fn ensure_exists(&self, tenant_id: TenantId, ibt_id: IbtId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_tenant(tenant_id)?;
        if self.id != ibt_id {
            return Err(DomainError::validation("ibt_id mismatch"));
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateIbt) -> Result<Vec<IbtEvent>, DomainError> {
        if self.created {
            return Err(DomainError::concurrent("ibt already exists"));
        }
        if cmd.source_warehouse_id == cmd.dest_warehouse_id {
            return Err(DomainError::validation(
                "source and destination warehouses must differ",
            ));
        }
        Ok(vec![IbtEvent::IbtCreated(IbtCreated {
            tenant_id: cmd.tenant_id,
            ibt_id: cmd.ibt_id,
            source_warehouse_id: cmd.source_warehouse_id,
            dest_warehouse_id: cmd.dest_warehouse_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_add_line(&self, cmd: &AddIbtLine) -> Result<Vec<IbtEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id, cmd.ibt_id)?;

        if self.status != IbtStatus::Draft {
            return Err(DomainError::invalid_transition(
                "lines can only be added to a draft transfer",
            ));
        }
        if cmd.qty_requested <= 0 {
            return Err(DomainError::validation(
                "requested quantity must be positive",
            ));
        }

        let next_line_no = (self.lines.len() as u32) + 1;
        Ok(vec![IbtEvent::IbtLineAdded(IbtLineAdded {
            tenant_id: cmd.tenant_id,
            ibt_id: cmd.ibt_id,
            line_no: next_line_no,
            item_id: cmd.item_id,
            batch_no: cmd.batch_no.clone(),
            from_bin_id: cmd.from_bin_id,
            qty_requested: cmd.qty_requested,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_submit(&self, cmd: &SubmitIbt) -> Result<Vec<IbtEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id, cmd.ibt_id)?;

        if self.status != IbtStatus::Draft {
            return Err(DomainError::invalid_transition(
                "only a draft transfer can be submitted",
            ));
        }
        if self.lines.is_empty() {
            return Err(DomainError::validation(
                "cannot submit a transfer without lines",
            ));
        }

        Ok(vec![IbtEvent::IbtSubmitted(IbtSubmitted {
            tenant_id: cmd.tenant_id,
            ibt_id: cmd.ibt_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_approve(&self, cmd: &ApproveIbt) -> Result<Vec<IbtEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id, cmd.ibt_id)?;

        if self.status != IbtStatus::PendingApproval {
            return Err(DomainError::invalid_transition(
                "only a submitted transfer can be approved",
            ));
        }

        Ok(vec![IbtEvent::IbtApproved(IbtApproved {
            tenant_id: cmd.tenant_id,
            ibt_id: cmd.ibt_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_start_picking(&self, cmd: &StartPicking) -> Result<Vec<IbtEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id, cmd.ibt_id)?;

        if self.status != IbtStatus::Approved {
            return Err(DomainError::invalid_transition(
                "picking can only start on an approved transfer",
            ));
        }

        Ok(vec![IbtEvent::IbtPickingStarted(IbtPickingStarted {
            tenant_id: cmd.tenant_id,
            ibt_id: cmd.ibt_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_ship(&self, cmd: &ShipIbt) -> Result<Vec<IbtEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id, cmd.ibt_id)?;

        // Picking is advisory, so shipping straight from Approved is legal.
        if !matches!(self.status, IbtStatus::Approved | IbtStatus::Picking) {
            return Err(DomainError::invalid_transition(format!(
                "cannot ship a transfer in status {:?}",
                self.status
            )));
        }
        if cmd.lines.is_empty() {
            return Err(DomainError::validation("nothing to ship"));
        }

        let mut shipped = Vec::with_capacity(cmd.lines.len());
        let mut seen = Vec::new();
        for ship in &cmd.lines {
            if seen.contains(&ship.line_no) {
                return Err(DomainError::validation(format!(
                    "line {} listed twice in ship request",
                    ship.line_no
                )));
            }
            seen.push(ship.line_no);

            let line = self.line(ship.line_no).ok_or_else(DomainError::not_found)?;
            if ship.qty_shipped <= 0 {
                return Err(DomainError::validation(
                    "shipped quantity must be positive",
                ));
            }
            // Partial ship is legal; over-ship of the request is not.
            if ship.qty_shipped > line.qty_requested {
                return Err(DomainError::validation(format!(
                    "line {} ships {} but only {} was requested",
                    ship.line_no, ship.qty_shipped, line.qty_requested
                )));
            }

            shipped.push(ShippedLine {
                line_no: line.line_no,
                item_id: line.item_id,
                batch_no: line.batch_no.clone(),
                from_bin_id: line.from_bin_id,
                qty_shipped: ship.qty_shipped,
            });
        }

        let source_warehouse_id = self
            .source_warehouse_id
            .ok_or_else(|| DomainError::validation("source warehouse must be set"))?;

        Ok(vec![IbtEvent::IbtShipped(IbtShipped {
            tenant_id: cmd.tenant_id,
            ibt_id: cmd.ibt_id,
            source_warehouse_id,
            lines: shipped,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_receive(&self, cmd: &ReceiveIbt) -> Result<Vec<IbtEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id, cmd.ibt_id)?;

        if self.status != IbtStatus::InTransit {
            return Err(DomainError::invalid_transition(
                "only an in-transit transfer can be received",
            ));
        }
        if cmd.lines.is_empty() {
            return Err(DomainError::validation("nothing to receive"));
        }

        let mut received = Vec::with_capacity(cmd.lines.len());
        let mut seen = Vec::new();
        for recv in &cmd.lines {
            if seen.contains(&recv.line_no) {
                return Err(DomainError::validation(format!(
                    "line {} listed twice in receive request",
                    recv.line_no
                )));
            }
            seen.push(recv.line_no);

            let line = self.line(recv.line_no).ok_or_else(DomainError::not_found)?;
            if line.qty_shipped == 0 {
                return Err(DomainError::validation(format!(
                    "line {} was never shipped",
                    recv.line_no
                )));
            }
            if recv.qty_received <= 0 {
                return Err(DomainError::validation(
                    "received quantity must be positive",
                ));
            }

            received.push(ReceivedLine {
                line_no: line.line_no,
                item_id: line.item_id,
                batch_no: line.batch_no.clone(),
                to_bin_id: recv.to_bin_id,
                qty_received: recv.qty_received,
            });
        }

        let dest_warehouse_id = self
            .dest_warehouse_id
            .ok_or_else(|| DomainError::validation("destination warehouse must be set"))?;

        Ok(vec![IbtEvent::IbtReceived(IbtReceived {
            tenant_id: cmd.tenant_id,
            ibt_id: cmd.ibt_id,
            dest_warehouse_id,
            lines: received,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_cancel(&self, cmd: &CancelIbt) -> Result<Vec<IbtEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id, cmd.ibt_id)?;

        // Nothing has moved before InTransit, so cancellation writes no ledger.
        if !matches!(
            self.status,
            IbtStatus::Draft
                | IbtStatus::PendingApproval
                | IbtStatus::Approved
                | IbtStatus::Picking
        ) {
            return Err(DomainError::invalid_transition(format!(
                "cannot cancel a transfer in status {:?}",
                self.status
            )));
        }

        Ok(vec![IbtEvent::IbtCancelled(IbtCancelled {
            tenant_id: cmd.tenant_id,
            ibt_id: cmd.ibt_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockline_core::AggregateId;

    fn test_tenant_id() -> TenantId {
        TenantId::new()
    }

    fn test_ibt_id() -> IbtId {
        IbtId::new(AggregateId::new())
    }

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn run(ibt: &mut Ibt, cmd: IbtCommand) -> Vec<IbtEvent> {
        let events = ibt.handle(&cmd).unwrap();
        for e in &events {
            ibt.apply(e);
        }
        events
    }

    struct Fixture {
        ibt: Ibt,
        tenant_id: TenantId,
        ibt_id: IbtId,
    }

    fn approved_transfer_with_line(qty_requested: i64) -> Fixture {
        let tenant_id = test_tenant_id();
        let ibt_id = test_ibt_id();
        let mut ibt = Ibt::empty(ibt_id);

        run(
            &mut ibt,
            IbtCommand::CreateIbt(CreateIbt {
                tenant_id,
                ibt_id,
                source_warehouse_id: WarehouseId::new(),
                dest_warehouse_id: WarehouseId::new(),
                occurred_at: test_time(),
            }),
        );
        run(
            &mut ibt,
            IbtCommand::AddIbtLine(AddIbtLine {
                tenant_id,
                ibt_id,
                item_id: ItemId::new(),
                batch_no: Some(BatchNo::new("LOT-7").unwrap()),
                from_bin_id: BinId::new(),
                qty_requested,
                occurred_at: test_time(),
            }),
        );
        run(
            &mut ibt,
            IbtCommand::SubmitIbt(SubmitIbt {
                tenant_id,
                ibt_id,
                occurred_at: test_time(),
            }),
        );
        run(
            &mut ibt,
            IbtCommand::ApproveIbt(ApproveIbt {
                tenant_id,
                ibt_id,
                occurred_at: test_time(),
            }),
        );

        Fixture {
            ibt,
            tenant_id,
            ibt_id,
        }
    }

    #[test]
    fn create_rejects_same_source_and_destination() {
        let ibt = Ibt::empty(test_ibt_id());
        let warehouse = WarehouseId::new();

        let err = ibt
            .handle(&IbtCommand::CreateIbt(CreateIbt {
                tenant_id: test_tenant_id(),
                ibt_id: test_ibt_id(),
                source_warehouse_id: warehouse,
                dest_warehouse_id: warehouse,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn submit_requires_lines() {
        let tenant_id = test_tenant_id();
        let ibt_id = test_ibt_id();
        let mut ibt = Ibt::empty(ibt_id);
        run(
            &mut ibt,
            IbtCommand::CreateIbt(CreateIbt {
                tenant_id,
                ibt_id,
                source_warehouse_id: WarehouseId::new(),
                dest_warehouse_id: WarehouseId::new(),
                occurred_at: test_time(),
            }),
        );

        let err = ibt
            .handle(&IbtCommand::SubmitIbt(SubmitIbt {
                tenant_id,
                ibt_id,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn partial_ship_leaves_line_partially_shipped() {
        let mut fx = approved_transfer_with_line(50);

        run(
            &mut fx.ibt,
            IbtCommand::ShipIbt(ShipIbt {
                tenant_id: fx.tenant_id,
                ibt_id: fx.ibt_id,
                lines: vec![ShipLineQty {
                    line_no: 1,
                    qty_shipped: 30,
                }],
                occurred_at: test_time(),
            }),
        );

        assert_eq!(fx.ibt.status(), IbtStatus::InTransit);
        assert!(fx.ibt.lines()[0].partially_shipped());
        assert_eq!(fx.ibt.lines()[0].qty_shipped, 30);
    }

    #[test]
    fn over_ship_of_request_is_rejected() {
        let fx = approved_transfer_with_line(50);

        let err = fx
            .ibt
            .handle(&IbtCommand::ShipIbt(ShipIbt {
                tenant_id: fx.tenant_id,
                ibt_id: fx.ibt_id,
                lines: vec![ShipLineQty {
                    line_no: 1,
                    qty_shipped: 60,
                }],
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn receive_before_ship_is_rejected() {
        let fx = approved_transfer_with_line(50);

        let err = fx
            .ibt
            .handle(&IbtCommand::ReceiveIbt(ReceiveIbt {
                tenant_id: fx.tenant_id,
                ibt_id: fx.ibt_id,
                lines: vec![ReceiveLineQty {
                    line_no: 1,
                    qty_received: 30,
                    to_bin_id: BinId::new(),
                }],
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition(_)));
    }

    #[test]
    fn receive_records_loss_in_transit_without_correction() {
        let mut fx = approved_transfer_with_line(50);
        run(
            &mut fx.ibt,
            IbtCommand::ShipIbt(ShipIbt {
                tenant_id: fx.tenant_id,
                ibt_id: fx.ibt_id,
                lines: vec![ShipLineQty {
                    line_no: 1,
                    qty_shipped: 30,
                }],
                occurred_at: test_time(),
            }),
        );

        run(
            &mut fx.ibt,
            IbtCommand::ReceiveIbt(ReceiveIbt {
                tenant_id: fx.tenant_id,
                ibt_id: fx.ibt_id,
                lines: vec![ReceiveLineQty {
                    line_no: 1,
                    qty_received: 28,
                    to_bin_id: BinId::new(),
                }],
                occurred_at: test_time(),
            }),
        );

        assert_eq!(fx.ibt.status(), IbtStatus::Received);
        assert_eq!(fx.ibt.lines()[0].qty_shipped, 30);
        assert_eq!(fx.ibt.lines()[0].qty_received, 28);
    }

    #[test]
    fn cancel_is_rejected_once_in_transit() {
        let mut fx = approved_transfer_with_line(50);
        run(
            &mut fx.ibt,
            IbtCommand::ShipIbt(ShipIbt {
                tenant_id: fx.tenant_id,
                ibt_id: fx.ibt_id,
                lines: vec![ShipLineQty {
                    line_no: 1,
                    qty_shipped: 10,
                }],
                occurred_at: test_time(),
            }),
        );

        let err = fx
            .ibt
            .handle(&IbtCommand::CancelIbt(CancelIbt {
                tenant_id: fx.tenant_id,
                ibt_id: fx.ibt_id,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition(_)));
    }

    #[test]
    fn cancel_before_shipping_is_legal_from_picking() {
        let mut fx = approved_transfer_with_line(50);
        run(
            &mut fx.ibt,
            IbtCommand::StartPicking(StartPicking {
                tenant_id: fx.tenant_id,
                ibt_id: fx.ibt_id,
                occurred_at: test_time(),
            }),
        );

        run(
            &mut fx.ibt,
            IbtCommand::CancelIbt(CancelIbt {
                tenant_id: fx.tenant_id,
                ibt_id: fx.ibt_id,
                occurred_at: test_time(),
            }),
        );
        assert_eq!(fx.ibt.status(), IbtStatus::Cancelled);
    }
}
