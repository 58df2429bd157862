use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockline_core::{
    Aggregate, AggregateId, AggregateRoot, BatchNo, BinId, DomainError, ItemId, TenantId,
    WarehouseId,
};
use stockline_events::Event;

/// Adjustment identifier (tenant-scoped via `tenant_id` fields in events/commands).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AdjustmentId(pub AggregateId);

impl AdjustmentId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for AdjustmentId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Adjustment lifecycle. Posted is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentStatus {
    Draft,
    Submitted,
    Approved,
    Posted,
    Rejected,
}

/// One correction: target key, signed delta, mandatory reason text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustmentLine {
    pub line_no: u32,
    pub bin_id: BinId,
    pub item_id: ItemId,
    pub batch_no: Option<BatchNo>,
    pub qty_change: i64,
    pub reason: String,
}

/// Aggregate root: Adjustment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Adjustment {
    id: AdjustmentId,
    tenant_id: Option<TenantId>,
    warehouse_id: Option<WarehouseId>,
    status: AdjustmentStatus,
    lines: Vec<AdjustmentLine>,
    version: u64,
    created: bool,
}

impl Adjustment {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: AdjustmentId) -> Self {
        Self {
            id,
            tenant_id: None,
            warehouse_id: None,
            status: AdjustmentStatus::Draft,
            lines: Vec::new(),
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> AdjustmentId {
        self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn warehouse_id(&self) -> Option<WarehouseId> {
        self.warehouse_id
    }

    pub fn status(&self) -> AdjustmentStatus {
        self.status
    }

    pub fn lines(&self) -> &[AdjustmentLine] {
        &self.lines
    }
}

impl AggregateRoot for Adjustment {
    type Id = AdjustmentId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateAdjustment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateAdjustment {
    pub tenant_id: TenantId,
    pub adjustment_id: AdjustmentId,
    pub warehouse_id: WarehouseId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AddAdjustmentLine (only allowed in Draft).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddAdjustmentLine {
    pub tenant_id: TenantId,
    pub adjustment_id: AdjustmentId,
    pub bin_id: BinId,
    pub item_id: ItemId,
    pub batch_no: Option<BatchNo>,
    pub qty_change: i64,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: SubmitAdjustment (Draft -> Submitted).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitAdjustment {
    pub tenant_id: TenantId,
    pub adjustment_id: AdjustmentId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ApproveAdjustment (authorization gate, no stock movement).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApproveAdjustment {
    pub tenant_id: TenantId,
    pub adjustment_id: AdjustmentId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RejectAdjustment (Submitted -> Rejected).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectAdjustment {
    pub tenant_id: TenantId,
    pub adjustment_id: AdjustmentId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: PostAdjustment (Approved -> Posted, terminal).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostAdjustment {
    pub tenant_id: TenantId,
    pub adjustment_id: AdjustmentId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdjustmentCommand {
    CreateAdjustment(CreateAdjustment),
    AddAdjustmentLine(AddAdjustmentLine),
    SubmitAdjustment(SubmitAdjustment),
    ApproveAdjustment(ApproveAdjustment),
    RejectAdjustment(RejectAdjustment),
    PostAdjustment(PostAdjustment),
}

/// Event: AdjustmentCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustmentCreated {
    pub tenant_id: TenantId,
    pub adjustment_id: AdjustmentId,
    pub warehouse_id: WarehouseId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: AdjustmentLineAdded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustmentLineAdded {
    pub tenant_id: TenantId,
    pub adjustment_id: AdjustmentId,
    pub line_no: u32,
    pub bin_id: BinId,
    pub item_id: ItemId,
    pub batch_no: Option<BatchNo>,
    pub qty_change: i64,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event: AdjustmentSubmitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustmentSubmitted {
    pub tenant_id: TenantId,
    pub adjustment_id: AdjustmentId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: AdjustmentApproved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustmentApproved {
    pub tenant_id: TenantId,
    pub adjustment_id: AdjustmentId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: AdjustmentRejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustmentRejected {
    pub tenant_id: TenantId,
    pub adjustment_id: AdjustmentId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: AdjustmentPosted.
///
/// Carries the full line set; every line posts an ADJUST ledger entry in the
/// same unit of work, or the whole post fails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustmentPosted {
    pub tenant_id: TenantId,
    pub adjustment_id: AdjustmentId,
    pub warehouse_id: WarehouseId,
    pub lines: Vec<AdjustmentLine>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdjustmentEvent {
    AdjustmentCreated(AdjustmentCreated),
    AdjustmentLineAdded(AdjustmentLineAdded),
    AdjustmentSubmitted(AdjustmentSubmitted),
    AdjustmentApproved(AdjustmentApproved),
    AdjustmentRejected(AdjustmentRejected),
    AdjustmentPosted(AdjustmentPosted),
}

impl Event for AdjustmentEvent {
    fn event_type(&self) -> &'static str {
        match self {
            AdjustmentEvent::AdjustmentCreated(_) => "adjustment.created",
            AdjustmentEvent::AdjustmentLineAdded(_) => "adjustment.line_added",
            AdjustmentEvent::AdjustmentSubmitted(_) => "adjustment.submitted",
            AdjustmentEvent::AdjustmentApproved(_) => "adjustment.approved",
            AdjustmentEvent::AdjustmentRejected(_) => "adjustment.rejected",
            AdjustmentEvent::AdjustmentPosted(_) => "adjustment.posted",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            AdjustmentEvent::AdjustmentCreated(e) => e.occurred_at,
            AdjustmentEvent::AdjustmentLineAdded(e) => e.occurred_at,
            AdjustmentEvent::AdjustmentSubmitted(e) => e.occurred_at,
            AdjustmentEvent::AdjustmentApproved(e) => e.occurred_at,
            AdjustmentEvent::AdjustmentRejected(e) => e.occurred_at,
            AdjustmentEvent::AdjustmentPosted(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Adjustment {
    type Command = AdjustmentCommand;
    type Event = AdjustmentEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            AdjustmentEvent::AdjustmentCreated(e) => {
                self.id = e.adjustment_id;
                self.tenant_id = Some(e.tenant_id);
                self.warehouse_id = Some(e.warehouse_id);
                self.status = AdjustmentStatus::Draft;
                self.lines.clear();
                self.created = true;
            }
            AdjustmentEvent::AdjustmentLineAdded(e) => {
                self.lines.push(AdjustmentLine {
                    line_no: e.line_no,
                    bin_id: e.bin_id,
                    item_id: e.item_id,
                    batch_no: e.batch_no.clone(),
                    qty_change: e.qty_change,
                    reason: e.reason.clone(),
                });
            }
            AdjustmentEvent::AdjustmentSubmitted(_) => {
                self.status = AdjustmentStatus::Submitted;
            }
            AdjustmentEvent::AdjustmentApproved(_) => {
                self.status = AdjustmentStatus::Approved;
            }
            AdjustmentEvent::AdjustmentRejected(_) => {
                self.status = AdjustmentStatus::Rejected;
            }
            AdjustmentEvent::AdjustmentPosted(_) => {
                self.status = AdjustmentStatus::Posted;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            AdjustmentCommand::CreateAdjustment(cmd) => self.handle_create(cmd),
            AdjustmentCommand::AddAdjustmentLine(cmd) => self.handle_add_line(cmd),
            AdjustmentCommand::SubmitAdjustment(cmd) => self.handle_submit(cmd),
            AdjustmentCommand::ApproveAdjustment(cmd) => self.handle_approve(cmd),
            AdjustmentCommand::RejectAdjustment(cmd) => self.handle_reject(cmd),
            AdjustmentCommand::PostAdjustment(cmd) => self.handle_post(cmd),
        }
    }
}

impl Adjustment {
    fn ensure_exists(
        &self,
        tenant_id: TenantId,
        adjustment_id: AdjustmentId,
    ) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::validation("tenant mismatch"));
        }
        if self.id != adjustment_id {
            return Err(DomainError::validation("adjustment_id mismatch"));
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateAdjustment) -> Result<Vec<AdjustmentEvent>, DomainError> {
        if self.created {
            return Err(DomainError::concurrent("adjustment already exists"));
        }
        Ok(vec![AdjustmentEvent::AdjustmentCreated(AdjustmentCreated {
            tenant_id: cmd.tenant_id,
            adjustment_id: cmd.adjustment_id,
            warehouse_id: cmd.warehouse_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_add_line(
        &self,
        cmd: &AddAdjustmentLine,
    ) -> Result<Vec<AdjustmentEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id, cmd.adjustment_id)?;

        if self.status != AdjustmentStatus::Draft {
            return Err(DomainError::invalid_transition(
                "lines can only be added to a draft adjustment",
            ));
        }
        if cmd.qty_change == 0 {
            return Err(DomainError::validation("adjustment delta cannot be zero"));
        }
        if cmd.reason.trim().is_empty() {
            return Err(DomainError::validation("adjustment reason is mandatory"));
        }

        let next_line_no = (self.lines.len() as u32) + 1;
        Ok(vec![AdjustmentEvent::AdjustmentLineAdded(
            AdjustmentLineAdded {
                tenant_id: cmd.tenant_id,
                adjustment_id: cmd.adjustment_id,
                line_no: next_line_no,
                bin_id: cmd.bin_id,
                item_id: cmd.item_id,
                batch_no: cmd.batch_no.clone(),
                qty_change: cmd.qty_change,
                reason: cmd.reason.clone(),
                occurred_at: cmd.occurred_at,
            },
        )])
    }

    fn handle_submit(&self, cmd: &SubmitAdjustment) -> Result<Vec<AdjustmentEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id, cmd.adjustment_id)?;

        if self.status != AdjustmentStatus::Draft {
            return Err(DomainError::invalid_transition(
                "only a draft adjustment can be submitted",
            ));
        }
        if self.lines.is_empty() {
            return Err(DomainError::validation(
                "cannot submit an adjustment without lines",
            ));
        }

        Ok(vec![AdjustmentEvent::AdjustmentSubmitted(
            AdjustmentSubmitted {
                tenant_id: cmd.tenant_id,
                adjustment_id: cmd.adjustment_id,
                occurred_at: cmd.occurred_at,
            },
        )])
    }

    fn handle_approve(
        &self,
        cmd: &ApproveAdjustment,
    ) -> Result<Vec<AdjustmentEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id, cmd.adjustment_id)?;

        if self.status != AdjustmentStatus::Submitted {
            return Err(DomainError::invalid_transition(
                "only a submitted adjustment can be approved",
            ));
        }

        Ok(vec![AdjustmentEvent::AdjustmentApproved(
            AdjustmentApproved {
                tenant_id: cmd.tenant_id,
                adjustment_id: cmd.adjustment_id,
                occurred_at: cmd.occurred_at,
            },
        )])
    }

    fn handle_reject(&self, cmd: &RejectAdjustment) -> Result<Vec<AdjustmentEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id, cmd.adjustment_id)?;

        if self.status != AdjustmentStatus::Submitted {
            return Err(DomainError::invalid_transition(
                "only a submitted adjustment can be rejected",
            ));
        }

        Ok(vec![AdjustmentEvent::AdjustmentRejected(
            AdjustmentRejected {
                tenant_id: cmd.tenant_id,
                adjustment_id: cmd.adjustment_id,
                occurred_at: cmd.occurred_at,
            },
        )])
    }

    fn handle_post(&self, cmd: &PostAdjustment) -> Result<Vec<AdjustmentEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id, cmd.adjustment_id)?;

        if self.status != AdjustmentStatus::Approved {
            return Err(DomainError::invalid_transition(
                "only an approved adjustment can be posted",
            ));
        }

        let warehouse_id = self
            .warehouse_id
            .ok_or_else(|| DomainError::validation("warehouse must be set"))?;

        Ok(vec![AdjustmentEvent::AdjustmentPosted(AdjustmentPosted {
            tenant_id: cmd.tenant_id,
            adjustment_id: cmd.adjustment_id,
            warehouse_id,
            lines: self.lines.clone(),
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

    fn test_adjustment_id() -> AdjustmentId {
        AdjustmentId::new(AggregateId::new())
    }

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn run(adj: &mut Adjustment, cmd: AdjustmentCommand) -> Vec<AdjustmentEvent> {
        let events = adj.handle(&cmd).unwrap();
        for e in &events {
            adj.apply(e);
        }
        events
    }

    struct Fixture {
        adj: Adjustment,
        tenant_id: TenantId,
        adjustment_id: AdjustmentId,
    }

    fn draft_with_line(qty_change: i64) -> Fixture {
        let tenant_id = test_tenant_id();
        let adjustment_id = test_adjustment_id();
        let mut adj = Adjustment::empty(adjustment_id);

        run(
            &mut adj,
            AdjustmentCommand::CreateAdjustment(CreateAdjustment {
                tenant_id,
                adjustment_id,
                warehouse_id: WarehouseId::new(),
                occurred_at: test_time(),
            }),
        );
        run(
            &mut adj,
            AdjustmentCommand::AddAdjustmentLine(AddAdjustmentLine {
                tenant_id,
                adjustment_id,
                bin_id: BinId::new(),
                item_id: ItemId::new(),
                batch_no: None,
                qty_change,
                reason: "damaged in handling".to_string(),
                occurred_at: test_time(),
            }),
        );

        Fixture {
            adj,
            tenant_id,
            adjustment_id,
        }
    }

    #[test]
    fn line_without_reason_is_rejected() {
        let fx = draft_with_line(-2);

        let err = fx
            .adj
            .handle(&AdjustmentCommand::AddAdjustmentLine(AddAdjustmentLine {
                tenant_id: fx.tenant_id,
                adjustment_id: fx.adjustment_id,
                bin_id: BinId::new(),
                item_id: ItemId::new(),
                batch_no: None,
                qty_change: 3,
                reason: "  ".to_string(),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn approve_performs_no_stock_movement_and_post_is_gated_on_it() {
        let mut fx = draft_with_line(-2);

        // Post straight from Draft is illegal.
        let err = fx
            .adj
            .handle(&AdjustmentCommand::PostAdjustment(PostAdjustment {
                tenant_id: fx.tenant_id,
                adjustment_id: fx.adjustment_id,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition(_)));

        run(
            &mut fx.adj,
            AdjustmentCommand::SubmitAdjustment(SubmitAdjustment {
                tenant_id: fx.tenant_id,
                adjustment_id: fx.adjustment_id,
                occurred_at: test_time(),
            }),
        );
        run(
            &mut fx.adj,
            AdjustmentCommand::ApproveAdjustment(ApproveAdjustment {
                tenant_id: fx.tenant_id,
                adjustment_id: fx.adjustment_id,
                occurred_at: test_time(),
            }),
        );
        assert_eq!(fx.adj.status(), AdjustmentStatus::Approved);

        let events = run(
            &mut fx.adj,
            AdjustmentCommand::PostAdjustment(PostAdjustment {
                tenant_id: fx.tenant_id,
                adjustment_id: fx.adjustment_id,
                occurred_at: test_time(),
            }),
        );
        match &events[0] {
            AdjustmentEvent::AdjustmentPosted(e) => {
                assert_eq!(e.lines.len(), 1);
                assert_eq!(e.lines[0].qty_change, -2);
            }
            other => panic!("expected AdjustmentPosted, got {other:?}"),
        }
        assert_eq!(fx.adj.status(), AdjustmentStatus::Posted);
    }

    #[test]
    fn rejected_adjustment_cannot_be_posted() {
        let mut fx = draft_with_line(5);
        run(
            &mut fx.adj,
            AdjustmentCommand::SubmitAdjustment(SubmitAdjustment {
                tenant_id: fx.tenant_id,
                adjustment_id: fx.adjustment_id,
                occurred_at: test_time(),
            }),
        );
        run(
            &mut fx.adj,
            AdjustmentCommand::RejectAdjustment(RejectAdjustment {
                tenant_id: fx.tenant_id,
                adjustment_id: fx.adjustment_id,
                occurred_at: test_time(),
            }),
        );
        assert_eq!(fx.adj.status(), AdjustmentStatus::Rejected);

        let err = fx
            .adj
            .handle(&AdjustmentCommand::PostAdjustment(PostAdjustment {
                tenant_id: fx.tenant_id,
                adjustment_id: fx.adjustment_id,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition(_)));
    }

    #[test]
    fn posted_adjustment_is_terminal() {
        let mut fx = draft_with_line(5);
        run(
            &mut fx.adj,
            AdjustmentCommand::SubmitAdjustment(SubmitAdjustment {
                tenant_id: fx.tenant_id,
                adjustment_id: fx.adjustment_id,
                occurred_at: test_time(),
            }),
        );
        run(
            &mut fx.adj,
            AdjustmentCommand::ApproveAdjustment(ApproveAdjustment {
                tenant_id: fx.tenant_id,
                adjustment_id: fx.adjustment_id,
                occurred_at: test_time(),
            }),
        );
        run(
            &mut fx.adj,
            AdjustmentCommand::PostAdjustment(PostAdjustment {
                tenant_id: fx.tenant_id,
                adjustment_id: fx.adjustment_id,
                occurred_at: test_time(),
            }),
        );

        let err = fx
            .adj
            .handle(&AdjustmentCommand::PostAdjustment(PostAdjustment {
                tenant_id: fx.tenant_id,
                adjustment_id: fx.adjustment_id,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition(_)));
    }
}
