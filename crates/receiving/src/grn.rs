use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use stockline_core::{
    Aggregate, AggregateId, AggregateRoot, BatchNo, BinId, DomainError, ItemId, TenantId, UserId,
    WarehouseId,
};
use stockline_events::Event;

/// Goods receipt note identifier (tenant-scoped via `tenant_id` fields in events/commands).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GrnId(pub AggregateId);

impl GrnId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for GrnId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// GRN header lifecycle.
///
/// `Received` is entered automatically once every expected line is fully
/// received; `Complete` is only ever explicit, because partial completion is
/// legal (unexpected items may arrive, expected ones may never).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrnStatus {
    Draft,
    Open,
    Partial,
    Received,
    Complete,
    Cancelled,
}

/// One expected/received item on a GRN.
///
/// `qty_expected = 0` marks an ad-hoc line created by an unexpected receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrnLine {
    pub line_no: u32,
    pub item_id: ItemId,
    pub qty_expected: i64,
    pub qty_received: i64,
}

/// Putaway task lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PutawayStatus {
    Pending,
    Assigned,
    Complete,
    Cancelled,
}

/// Movement order from the receiving bin into a storage bin.
///
/// Spawned automatically by each receipt; owned by the GRN until completed,
/// after which it is an independent historical record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PutawayTask {
    pub task_no: u32,
    pub line_no: u32,
    pub from_bin_id: BinId,
    pub item_id: ItemId,
    pub batch_no: Option<BatchNo>,
    pub expiry_date: Option<NaiveDate>,
    pub qty: i64,
    pub status: PutawayStatus,
    pub assigned_to: Option<UserId>,
}

/// Aggregate root: Grn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grn {
    id: GrnId,
    tenant_id: Option<TenantId>,
    warehouse_id: Option<WarehouseId>,
    supplier_ref: Option<String>,
    status: GrnStatus,
    lines: Vec<GrnLine>,
    putaway_tasks: Vec<PutawayTask>,
    version: u64,
    created: bool,
}

impl Grn {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: GrnId) -> Self {
        Self {
            id,
            tenant_id: None,
            warehouse_id: None,
            supplier_ref: None,
            status: GrnStatus::Draft,
            lines: Vec::new(),
            putaway_tasks: Vec::new(),
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> GrnId {
        self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn warehouse_id(&self) -> Option<WarehouseId> {
        self.warehouse_id
    }

    pub fn supplier_ref(&self) -> Option<&str> {
        self.supplier_ref.as_deref()
    }

    pub fn status(&self) -> GrnStatus {
        self.status
    }

    pub fn lines(&self) -> &[GrnLine] {
        &self.lines
    }

    pub fn putaway_tasks(&self) -> &[PutawayTask] {
        &self.putaway_tasks
    }

    /// True once any line has posted a receipt (and thus ledger entries).
    pub fn has_receipts(&self) -> bool {
        self.lines.iter().any(|l| l.qty_received > 0)
    }

    fn line_for_item(&self, item_id: ItemId) -> Option<&GrnLine> {
        self.lines.iter().find(|l| l.item_id == item_id)
    }

    fn task(&self, task_no: u32) -> Option<&PutawayTask> {
        self.putaway_tasks.iter().find(|t| t.task_no == task_no)
    }

    fn receiving_allowed(&self) -> bool {
        matches!(
            self.status,
            GrnStatus::Open | GrnStatus::Partial | GrnStatus::Received
        )
    }

    /// Header status implied by current line progress.
    fn derived_receipt_status(&self) -> GrnStatus {
        if !self.has_receipts() {
            return GrnStatus::Open;
        }
        let fully_received = self
            .lines
            .iter()
            .all(|l| l.qty_received >= l.qty_expected);
        if fully_received {
            GrnStatus::Received
        } else {
            GrnStatus::Partial
        }
    }
}

impl AggregateRoot for Grn {
    type Id = GrnId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateGrn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateGrn {
    pub tenant_id: TenantId,
    pub grn_id: GrnId,
    pub warehouse_id: WarehouseId,
    pub supplier_ref: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AddExpectedLine (only allowed in Draft).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddExpectedLine {
    pub tenant_id: TenantId,
    pub grn_id: GrnId,
    pub item_id: ItemId,
    pub qty_expected: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: OpenGrn (Draft -> Open, receiving may begin).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenGrn {
    pub tenant_id: TenantId,
    pub grn_id: GrnId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReceiveLine.
///
/// Lands `qty_received` of the item in the receiving bin and spawns one
/// putaway task. An item not on the expected lines creates an ad-hoc line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiveLine {
    pub tenant_id: TenantId,
    pub grn_id: GrnId,
    pub item_id: ItemId,
    pub qty_received: i64,
    pub receiving_bin_id: BinId,
    pub batch_no: Option<BatchNo>,
    pub expiry_date: Option<NaiveDate>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AssignPutaway (Pending -> Assigned).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignPutaway {
    pub tenant_id: TenantId,
    pub grn_id: GrnId,
    pub task_no: u32,
    pub assignee: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CompletePutaway (moves the stock to `to_bin_id`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletePutaway {
    pub tenant_id: TenantId,
    pub grn_id: GrnId,
    pub task_no: u32,
    pub to_bin_id: BinId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CancelPutaway (stock stays in the receiving bin).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelPutaway {
    pub tenant_id: TenantId,
    pub grn_id: GrnId,
    pub task_no: u32,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CompleteGrn (explicit completion; partial receipt is legal).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompleteGrn {
    pub tenant_id: TenantId,
    pub grn_id: GrnId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CancelGrn (only before anything has been received).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelGrn {
    pub tenant_id: TenantId,
    pub grn_id: GrnId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GrnCommand {
    CreateGrn(CreateGrn),
    AddExpectedLine(AddExpectedLine),
    OpenGrn(OpenGrn),
    ReceiveLine(ReceiveLine),
    AssignPutaway(AssignPutaway),
    CompletePutaway(CompletePutaway),
    CancelPutaway(CancelPutaway),
    CompleteGrn(CompleteGrn),
    CancelGrn(CancelGrn),
}

/// Event: GrnCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrnCreated {
    pub tenant_id: TenantId,
    pub grn_id: GrnId,
    pub warehouse_id: WarehouseId,
    pub supplier_ref: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: GrnExpectedLineAdded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrnExpectedLineAdded {
    pub tenant_id: TenantId,
    pub grn_id: GrnId,
    pub line_no: u32,
    pub item_id: ItemId,
    pub qty_expected: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: GrnOpened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrnOpened {
    pub tenant_id: TenantId,
    pub grn_id: GrnId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: GrnLineReceived.
///
/// Carries everything the write path needs to post the RECEIVE ledger entry
/// at the receiving bin and to materialize the spawned putaway task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrnLineReceived {
    pub tenant_id: TenantId,
    pub grn_id: GrnId,
    pub line_no: u32,
    pub task_no: u32,
    pub item_id: ItemId,
    pub qty_received: i64,
    pub receiving_bin_id: BinId,
    pub batch_no: Option<BatchNo>,
    pub expiry_date: Option<NaiveDate>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PutawayAssigned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PutawayAssigned {
    pub tenant_id: TenantId,
    pub grn_id: GrnId,
    pub task_no: u32,
    pub assignee: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PutawayCompleted.
///
/// Carries the full movement detail (the transfer pair out of the receiving
/// bin and into the target bin is derived from this event).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PutawayCompleted {
    pub tenant_id: TenantId,
    pub grn_id: GrnId,
    pub task_no: u32,
    pub from_bin_id: BinId,
    pub to_bin_id: BinId,
    pub item_id: ItemId,
    pub batch_no: Option<BatchNo>,
    pub expiry_date: Option<NaiveDate>,
    pub qty: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PutawayCancelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PutawayCancelled {
    pub tenant_id: TenantId,
    pub grn_id: GrnId,
    pub task_no: u32,
    pub occurred_at: DateTime<Utc>,
}

/// Event: GrnCompleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrnCompleted {
    pub tenant_id: TenantId,
    pub grn_id: GrnId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: GrnCancelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrnCancelled {
    pub tenant_id: TenantId,
    pub grn_id: GrnId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GrnEvent {
    GrnCreated(GrnCreated),
    GrnExpectedLineAdded(GrnExpectedLineAdded),
    GrnOpened(GrnOpened),
    GrnLineReceived(GrnLineReceived),
    PutawayAssigned(PutawayAssigned),
    PutawayCompleted(PutawayCompleted),
    PutawayCancelled(PutawayCancelled),
    GrnCompleted(GrnCompleted),
    GrnCancelled(GrnCancelled),
}

impl Event for GrnEvent {
    fn event_type(&self) -> &'static str {
        match self {
            GrnEvent::GrnCreated(_) => "receiving.grn.created",
            GrnEvent::GrnExpectedLineAdded(_) => "receiving.grn.expected_line_added",
            GrnEvent::GrnOpened(_) => "receiving.grn.opened",
            GrnEvent::GrnLineReceived(_) => "receiving.grn.line_received",
            GrnEvent::PutawayAssigned(_) => "receiving.putaway.assigned",
            GrnEvent::PutawayCompleted(_) => "receiving.putaway.completed",
            GrnEvent::PutawayCancelled(_) => "receiving.putaway.cancelled",
            GrnEvent::GrnCompleted(_) => "receiving.grn.completed",
            GrnEvent::GrnCancelled(_) => "receiving.grn.cancelled",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            GrnEvent::GrnCreated(e) => e.occurred_at,
            GrnEvent::GrnExpectedLineAdded(e) => e.occurred_at,
            GrnEvent::GrnOpened(e) => e.occurred_at,
            GrnEvent::GrnLineReceived(e) => e.occurred_at,
            GrnEvent::PutawayAssigned(e) => e.occurred_at,
            GrnEvent::PutawayCompleted(e) => e.occurred_at,
            GrnEvent::PutawayCancelled(e) => e.occurred_at,
            GrnEvent::GrnCompleted(e) => e.occurred_at,
            GrnEvent::GrnCancelled(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Grn {
    type Command = GrnCommand;
    type Event = GrnEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            GrnEvent::GrnCreated(e) => {
                self.id = e.grn_id;
                self.tenant_id = Some(e.tenant_id);
                self.warehouse_id = Some(e.warehouse_id);
                self.supplier_ref = e.supplier_ref.clone();
                self.status = GrnStatus::Draft;
                self.lines.clear();
                self.putaway_tasks.clear();
                self.created = true;
            }
            GrnEvent::GrnExpectedLineAdded(e) => {
                self.lines.push(GrnLine {
                    line_no: e.line_no,
                    item_id: e.item_id,
                    qty_expected: e.qty_expected,
                    qty_received: 0,
                });
            }
            GrnEvent::GrnOpened(_) => {
                self.status = GrnStatus::Open;
            }
            GrnEvent::GrnLineReceived(e) => {
                match self.lines.iter_mut().find(|l| l.line_no == e.line_no) {
                    Some(line) => line.qty_received += e.qty_received,
                    None => self.lines.push(GrnLine {
                        line_no: e.line_no,
                        item_id: e.item_id,
                        qty_expected: 0,
                        qty_received: e.qty_received,
                    }),
                }
                self.putaway_tasks.push(PutawayTask {
                    task_no: e.task_no,
                    line_no: e.line_no,
                    from_bin_id: e.receiving_bin_id,
                    item_id: e.item_id,
                    batch_no: e.batch_no.clone(),
                    expiry_date: e.expiry_date,
                    qty: e.qty_received,
                    status: PutawayStatus::Pending,
                    assigned_to: None,
                });
                self.status = self.derived_receipt_status();
            }
            GrnEvent::PutawayAssigned(e) => {
                if let Some(task) = self.putaway_tasks.iter_mut().find(|t| t.task_no == e.task_no)
                {
                    task.status = PutawayStatus::Assigned;
                    task.assigned_to = Some(e.assignee);
                }
            }
            GrnEvent::PutawayCompleted(e) => {
                if let Some(task) = self.putaway_tasks.iter_mut().find(|t| t.task_no == e.task_no)
                {
                    task.status = PutawayStatus::Complete;
                }
            }
            GrnEvent::PutawayCancelled(e) => {
                if let Some(task) = self.putaway_tasks.iter_mut().find(|t| t.task_no == e.task_no)
                {
                    task.status = PutawayStatus::Cancelled;
                }
            }
            GrnEvent::GrnCompleted(_) => {
                self.status = GrnStatus::Complete;
            }
            GrnEvent::GrnCancelled(_) => {
                self.status = GrnStatus::Cancelled;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            GrnCommand::CreateGrn(cmd) => self.handle_create(cmd),
            GrnCommand::AddExpectedLine(cmd) => self.handle_add_expected_line(cmd),
            GrnCommand::OpenGrn(cmd) => self.handle_open(cmd),
            GrnCommand::ReceiveLine(cmd) => self.handle_receive_line(cmd),
            GrnCommand::AssignPutaway(cmd) => self.handle_assign_putaway(cmd),
            GrnCommand::CompletePutaway(cmd) => self.handle_complete_putaway(cmd),
            GrnCommand::CancelPutaway(cmd) => self.handle_cancel_putaway(cmd),
            GrnCommand::CompleteGrn(cmd) => self.handle_complete(cmd),
            GrnCommand::CancelGrn(cmd) => self.handle_cancel(cmd),
        }
    }
}

impl Grn {
    fn ensure_tenant(&self, tenant_id: TenantId) -> Result<(), DomainError> {
        if !self.created {
            return Ok(());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::validation("tenant mismatch"));
        }
        Ok(())
    }

    fn ensure_grn_id(&self, grn_id: GrnId) -> Result<(), DomainError> {
        if self.id != grn_id {
            return Err(DomainError::validation("grn_id mismatch"));
        }
        Ok(())
    }

    fn ensure_exists(&self, tenant_id: TenantId, grn_id: GrnId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_tenant(tenant_id)?;
        self.ensure_grn_id(grn_id)
    }

    fn handle_create(&self, cmd: &CreateGrn) -> Result<Vec<GrnEvent>, DomainError> {
        if self.created {
            return Err(DomainError::concurrent("grn already exists"));
        }
        Ok(vec![GrnEvent::GrnCreated(GrnCreated {
            tenant_id: cmd.tenant_id,
            grn_id: cmd.grn_id,
            warehouse_id: cmd.warehouse_id,
            supplier_ref: cmd.supplier_ref.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_add_expected_line(
        &self,
        cmd: &AddExpectedLine,
    ) -> Result<Vec<GrnEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id, cmd.grn_id)?;

        if self.status != GrnStatus::Draft {
            return Err(DomainError::invalid_transition(
                "expected lines can only be added to a draft grn",
            ));
        }
        if cmd.qty_expected <= 0 {
            return Err(DomainError::validation("expected quantity must be positive"));
        }
        if self.line_for_item(cmd.item_id).is_some() {
            return Err(DomainError::validation("item already has an expected line"));
        }

        let next_line_no = (self.lines.len() as u32) + 1;
        Ok(vec![GrnEvent::GrnExpectedLineAdded(GrnExpectedLineAdded {
            tenant_id: cmd.tenant_id,
            grn_id: cmd.grn_id,
            line_no: next_line_no,
            item_id: cmd.item_id,
            qty_expected: cmd.qty_expected,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_open(&self, cmd: &OpenGrn) -> Result<Vec<GrnEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id, cmd.grn_id)?;

        if self.status != GrnStatus::Draft {
            return Err(DomainError::invalid_transition(
                "only a draft grn can be opened",
            ));
        }

        Ok(vec![GrnEvent::GrnOpened(GrnOpened {
            tenant_id: cmd.tenant_id,
            grn_id: cmd.grn_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_receive_line(&self, cmd: &ReceiveLine) -> Result<Vec<GrnEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id, cmd.grn_id)?;

        if !self.receiving_allowed() {
            return Err(DomainError::invalid_transition(format!(
                "cannot receive against a grn in status {:?}",
                self.status
            )));
        }
        if cmd.qty_received <= 0 {
            return Err(DomainError::validation("received quantity must be positive"));
        }
        if cmd.expiry_date.is_some() && cmd.batch_no.is_none() {
            return Err(DomainError::validation(
                "expiry date requires a batch number",
            ));
        }

        // Unexpected item: spawn an ad-hoc line.
        let line_no = match self.line_for_item(cmd.item_id) {
            Some(line) => line.line_no,
            None => (self.lines.len() as u32) + 1,
        };
        let task_no = (self.putaway_tasks.len() as u32) + 1;

        Ok(vec![GrnEvent::GrnLineReceived(GrnLineReceived {
            tenant_id: cmd.tenant_id,
            grn_id: cmd.grn_id,
            line_no,
            task_no,
            item_id: cmd.item_id,
            qty_received: cmd.qty_received,
            receiving_bin_id: cmd.receiving_bin_id,
            batch_no: cmd.batch_no.clone(),
            expiry_date: cmd.expiry_date,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_assign_putaway(&self, cmd: &AssignPutaway) -> Result<Vec<GrnEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id, cmd.grn_id)?;

        let task = self.task(cmd.task_no).ok_or_else(DomainError::not_found)?;
        if task.status != PutawayStatus::Pending {
            return Err(DomainError::invalid_transition(
                "only a pending putaway task can be assigned",
            ));
        }

        Ok(vec![GrnEvent::PutawayAssigned(PutawayAssigned {
            tenant_id: cmd.tenant_id,
            grn_id: cmd.grn_id,
            task_no: cmd.task_no,
            assignee: cmd.assignee,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_complete_putaway(
        &self,
        cmd: &CompletePutaway,
    ) -> Result<Vec<GrnEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id, cmd.grn_id)?;

        let task = self.task(cmd.task_no).ok_or_else(DomainError::not_found)?;
        if !matches!(task.status, PutawayStatus::Pending | PutawayStatus::Assigned) {
            return Err(DomainError::invalid_transition(
                "putaway task is already complete or cancelled",
            ));
        }
        if cmd.to_bin_id == task.from_bin_id {
            return Err(DomainError::validation(
                "putaway target bin must differ from the receiving bin",
            ));
        }

        Ok(vec![GrnEvent::PutawayCompleted(PutawayCompleted {
            tenant_id: cmd.tenant_id,
            grn_id: cmd.grn_id,
            task_no: cmd.task_no,
            from_bin_id: task.from_bin_id,
            to_bin_id: cmd.to_bin_id,
            item_id: task.item_id,
            batch_no: task.batch_no.clone(),
            expiry_date: task.expiry_date,
            qty: task.qty,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_cancel_putaway(&self, cmd: &CancelPutaway) -> Result<Vec<GrnEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id, cmd.grn_id)?;

        let task = self.task(cmd.task_no).ok_or_else(DomainError::not_found)?;
        if !matches!(task.status, PutawayStatus::Pending | PutawayStatus::Assigned) {
            return Err(DomainError::invalid_transition(
                "putaway task is already complete or cancelled",
            ));
        }

        Ok(vec![GrnEvent::PutawayCancelled(PutawayCancelled {
            tenant_id: cmd.tenant_id,
            grn_id: cmd.grn_id,
            task_no: cmd.task_no,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_complete(&self, cmd: &CompleteGrn) -> Result<Vec<GrnEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id, cmd.grn_id)?;

        if !matches!(
            self.status,
            GrnStatus::Open | GrnStatus::Partial | GrnStatus::Received
        ) {
            return Err(DomainError::invalid_transition(format!(
                "cannot complete a grn in status {:?}",
                self.status
            )));
        }

        let open_tasks = self
            .putaway_tasks
            .iter()
            .any(|t| matches!(t.status, PutawayStatus::Pending | PutawayStatus::Assigned));
        if open_tasks {
            return Err(DomainError::invalid_transition(
                "cannot complete a grn with open putaway tasks",
            ));
        }

        Ok(vec![GrnEvent::GrnCompleted(GrnCompleted {
            tenant_id: cmd.tenant_id,
            grn_id: cmd.grn_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_cancel(&self, cmd: &CancelGrn) -> Result<Vec<GrnEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id, cmd.grn_id)?;

        if !matches!(self.status, GrnStatus::Draft | GrnStatus::Open) {
            return Err(DomainError::invalid_transition(format!(
                "cannot cancel a grn in status {:?}",
                self.status
            )));
        }

        // Posted receipts would be orphaned by cancellation.
        if self.has_receipts() {
            return Err(DomainError::invalid_transition(
                "cannot cancel a grn with received lines",
            ));
        }

        Ok(vec![GrnEvent::GrnCancelled(GrnCancelled {
            tenant_id: cmd.tenant_id,
            grn_id: cmd.grn_id,
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

    fn test_grn_id() -> GrnId {
        GrnId::new(AggregateId::new())
    }

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn batch(no: &str) -> BatchNo {
        BatchNo::new(no).unwrap()
    }

    struct Fixture {
        grn: Grn,
        tenant_id: TenantId,
        grn_id: GrnId,
        item_id: ItemId,
        receiving_bin: BinId,
    }

    fn open_grn_with_expected_line(qty_expected: i64) -> Fixture {
        let tenant_id = test_tenant_id();
        let grn_id = test_grn_id();
        let item_id = ItemId::new();
        let mut grn = Grn::empty(grn_id);

        let mut run = |cmd: GrnCommand, grn: &mut Grn| {
            let events = grn.handle(&cmd).unwrap();
            for e in &events {
                grn.apply(e);
            }
        };

        run(
            GrnCommand::CreateGrn(CreateGrn {
                tenant_id,
                grn_id,
                warehouse_id: WarehouseId::new(),
                supplier_ref: Some("PO-1001".to_string()),
                occurred_at: test_time(),
            }),
            &mut grn,
        );
        run(
            GrnCommand::AddExpectedLine(AddExpectedLine {
                tenant_id,
                grn_id,
                item_id,
                qty_expected,
                occurred_at: test_time(),
            }),
            &mut grn,
        );
        run(
            GrnCommand::OpenGrn(OpenGrn {
                tenant_id,
                grn_id,
                occurred_at: test_time(),
            }),
            &mut grn,
        );

        Fixture {
            grn,
            tenant_id,
            grn_id,
            item_id,
            receiving_bin: BinId::new(),
        }
    }

    fn receive(fx: &mut Fixture, qty: i64) {
        let events = fx
            .grn
            .handle(&GrnCommand::ReceiveLine(ReceiveLine {
                tenant_id: fx.tenant_id,
                grn_id: fx.grn_id,
                item_id: fx.item_id,
                qty_received: qty,
                receiving_bin_id: fx.receiving_bin,
                batch_no: Some(batch("LOT-A")),
                expiry_date: None,
                occurred_at: test_time(),
            }))
            .unwrap();
        for e in &events {
            fx.grn.apply(e);
        }
    }

    #[test]
    fn under_receipt_moves_header_to_partial() {
        let mut fx = open_grn_with_expected_line(50);
        receive(&mut fx, 20);

        assert_eq!(fx.grn.status(), GrnStatus::Partial);
        assert_eq!(fx.grn.lines()[0].qty_received, 20);
        assert_eq!(fx.grn.putaway_tasks().len(), 1);
        assert_eq!(fx.grn.putaway_tasks()[0].status, PutawayStatus::Pending);
    }

    #[test]
    fn full_receipt_moves_header_to_received_but_not_complete() {
        let mut fx = open_grn_with_expected_line(50);
        receive(&mut fx, 30);
        receive(&mut fx, 20);

        // Completion stays explicit even when everything arrived.
        assert_eq!(fx.grn.status(), GrnStatus::Received);
    }

    #[test]
    fn unexpected_item_creates_ad_hoc_line() {
        let mut fx = open_grn_with_expected_line(10);
        let surprise_item = ItemId::new();

        let events = fx
            .grn
            .handle(&GrnCommand::ReceiveLine(ReceiveLine {
                tenant_id: fx.tenant_id,
                grn_id: fx.grn_id,
                item_id: surprise_item,
                qty_received: 4,
                receiving_bin_id: fx.receiving_bin,
                batch_no: None,
                expiry_date: None,
                occurred_at: test_time(),
            }))
            .unwrap();
        for e in &events {
            fx.grn.apply(e);
        }

        let line = fx
            .grn
            .lines()
            .iter()
            .find(|l| l.item_id == surprise_item)
            .unwrap();
        assert_eq!(line.qty_expected, 0);
        assert_eq!(line.qty_received, 4);
    }

    #[test]
    fn receiving_against_draft_is_rejected() {
        let tenant_id = test_tenant_id();
        let grn_id = test_grn_id();
        let mut grn = Grn::empty(grn_id);
        let events = grn
            .handle(&GrnCommand::CreateGrn(CreateGrn {
                tenant_id,
                grn_id,
                warehouse_id: WarehouseId::new(),
                supplier_ref: None,
                occurred_at: test_time(),
            }))
            .unwrap();
        for e in &events {
            grn.apply(e);
        }

        let err = grn
            .handle(&GrnCommand::ReceiveLine(ReceiveLine {
                tenant_id,
                grn_id,
                item_id: ItemId::new(),
                qty_received: 5,
                receiving_bin_id: BinId::new(),
                batch_no: None,
                expiry_date: None,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition(_)));
    }

    #[test]
    fn putaway_completion_requires_a_different_bin() {
        let mut fx = open_grn_with_expected_line(10);
        receive(&mut fx, 10);

        let err = fx
            .grn
            .handle(&GrnCommand::CompletePutaway(CompletePutaway {
                tenant_id: fx.tenant_id,
                grn_id: fx.grn_id,
                task_no: 1,
                to_bin_id: fx.receiving_bin,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn putaway_assign_then_complete() {
        let mut fx = open_grn_with_expected_line(10);
        receive(&mut fx, 10);

        let events = fx
            .grn
            .handle(&GrnCommand::AssignPutaway(AssignPutaway {
                tenant_id: fx.tenant_id,
                grn_id: fx.grn_id,
                task_no: 1,
                assignee: UserId::new(),
                occurred_at: test_time(),
            }))
            .unwrap();
        for e in &events {
            fx.grn.apply(e);
        }
        assert_eq!(fx.grn.putaway_tasks()[0].status, PutawayStatus::Assigned);

        let target = BinId::new();
        let events = fx
            .grn
            .handle(&GrnCommand::CompletePutaway(CompletePutaway {
                tenant_id: fx.tenant_id,
                grn_id: fx.grn_id,
                task_no: 1,
                to_bin_id: target,
                occurred_at: test_time(),
            }))
            .unwrap();

        match &events[0] {
            GrnEvent::PutawayCompleted(e) => {
                assert_eq!(e.from_bin_id, fx.receiving_bin);
                assert_eq!(e.to_bin_id, target);
                assert_eq!(e.qty, 10);
            }
            other => panic!("expected PutawayCompleted, got {other:?}"),
        }
        for e in &events {
            fx.grn.apply(e);
        }

        let err = fx
            .grn
            .handle(&GrnCommand::CompletePutaway(CompletePutaway {
                tenant_id: fx.tenant_id,
                grn_id: fx.grn_id,
                task_no: 1,
                to_bin_id: BinId::new(),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition(_)));
    }

    #[test]
    fn complete_is_blocked_by_open_putaway_tasks() {
        let mut fx = open_grn_with_expected_line(10);
        receive(&mut fx, 10);

        let err = fx
            .grn
            .handle(&GrnCommand::CompleteGrn(CompleteGrn {
                tenant_id: fx.tenant_id,
                grn_id: fx.grn_id,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition(_)));
    }

    #[test]
    fn cancel_is_rejected_once_anything_was_received() {
        let mut fx = open_grn_with_expected_line(10);
        receive(&mut fx, 3);

        let err = fx
            .grn
            .handle(&GrnCommand::CancelGrn(CancelGrn {
                tenant_id: fx.tenant_id,
                grn_id: fx.grn_id,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition(_)));
    }

    #[test]
    fn unreceived_grn_can_be_cancelled() {
        let mut fx = open_grn_with_expected_line(10);

        let events = fx
            .grn
            .handle(&GrnCommand::CancelGrn(CancelGrn {
                tenant_id: fx.tenant_id,
                grn_id: fx.grn_id,
                occurred_at: test_time(),
            }))
            .unwrap();
        for e in &events {
            fx.grn.apply(e);
        }
        assert_eq!(fx.grn.status(), GrnStatus::Cancelled);
    }
}
