use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockline_core::{
    Aggregate, AggregateId, AggregateRoot, BatchNo, BinId, DomainError, ItemId, TenantId,
    WarehouseId,
};
use stockline_events::Event;

/// Cycle count identifier (tenant-scoped via `tenant_id` fields in events/commands).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CycleCountId(pub AggregateId);

impl CycleCountId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for CycleCountId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Cycle count lifecycle. Closed is terminal and immutable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleCountStatus {
    Open,
    InProgress,
    PendingApproval,
    Closed,
    Cancelled,
}

/// One stock key in the count scope, with its frozen baseline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaselineLine {
    pub bin_id: BinId,
    pub item_id: ItemId,
    pub batch_no: Option<BatchNo>,
    pub qty_expected: i64,
}

/// Count line state: frozen expectation, captured count, computed variance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleCountLine {
    pub line_no: u32,
    pub bin_id: BinId,
    pub item_id: ItemId,
    pub batch_no: Option<BatchNo>,
    /// On-hand at open time. Never refreshed during the count window.
    pub qty_expected: i64,
    pub qty_counted: Option<i64>,
    /// counted - expected, computed at submit.
    pub variance: Option<i64>,
}

/// Aggregate root: CycleCount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleCount {
    id: CycleCountId,
    tenant_id: Option<TenantId>,
    warehouse_id: Option<WarehouseId>,
    status: CycleCountStatus,
    lines: Vec<CycleCountLine>,
    version: u64,
    created: bool,
}

impl CycleCount {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: CycleCountId) -> Self {
        Self {
            id,
            tenant_id: None,
            warehouse_id: None,
            status: CycleCountStatus::Open,
            lines: Vec::new(),
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> CycleCountId {
        self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn warehouse_id(&self) -> Option<WarehouseId> {
        self.warehouse_id
    }

    pub fn status(&self) -> CycleCountStatus {
        self.status
    }

    pub fn lines(&self) -> &[CycleCountLine] {
        &self.lines
    }

    fn line(&self, line_no: u32) -> Option<&CycleCountLine> {
        self.lines.iter().find(|l| l.line_no == line_no)
    }
}

impl AggregateRoot for CycleCount {
    type Id = CycleCountId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: OpenCount.
///
/// The baseline lines are captured by the caller from live snapshots in the
/// same unit of work that opens the count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenCount {
    pub tenant_id: TenantId,
    pub count_id: CycleCountId,
    pub warehouse_id: WarehouseId,
    pub lines: Vec<BaselineLine>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RecordCount (re-recording a line overwrites the earlier count).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordCount {
    pub tenant_id: TenantId,
    pub count_id: CycleCountId,
    pub line_no: u32,
    pub qty_counted: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: SubmitCount (computes variance per line).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitCount {
    pub tenant_id: TenantId,
    pub count_id: CycleCountId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CloseCount (posts adjustments, terminal).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseCount {
    pub tenant_id: TenantId,
    pub count_id: CycleCountId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CancelCount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelCount {
    pub tenant_id: TenantId,
    pub count_id: CycleCountId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CycleCountCommand {
    OpenCount(OpenCount),
    RecordCount(RecordCount),
    SubmitCount(SubmitCount),
    CloseCount(CloseCount),
    CancelCount(CancelCount),
}

/// Event: CountOpened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountOpened {
    pub tenant_id: TenantId,
    pub count_id: CycleCountId,
    pub warehouse_id: WarehouseId,
    pub lines: Vec<BaselineLine>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: CountRecorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountRecorded {
    pub tenant_id: TenantId,
    pub count_id: CycleCountId,
    pub line_no: u32,
    pub qty_counted: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: CountSubmitted. Carries the computed variance per line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountSubmitted {
    pub tenant_id: TenantId,
    pub count_id: CycleCountId,
    pub variances: Vec<VarianceLine>,
    pub occurred_at: DateTime<Utc>,
}

/// One nonzero variance to be resolved by an adjusting ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VarianceLine {
    pub line_no: u32,
    pub bin_id: BinId,
    pub item_id: ItemId,
    pub batch_no: Option<BatchNo>,
    /// counted - expected; positive found, negative lost.
    pub variance: i64,
}

/// Event: CountClosed. The adjustments listed here post to the ledger in the
/// same unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountClosed {
    pub tenant_id: TenantId,
    pub count_id: CycleCountId,
    pub warehouse_id: WarehouseId,
    pub adjustments: Vec<VarianceLine>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: CountCancelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountCancelled {
    pub tenant_id: TenantId,
    pub count_id: CycleCountId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CycleCountEvent {
    CountOpened(CountOpened),
    CountRecorded(CountRecorded),
    CountSubmitted(CountSubmitted),
    CountClosed(CountClosed),
    CountCancelled(CountCancelled),
}

impl Event for CycleCountEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CycleCountEvent::CountOpened(_) => "counting.cycle_count.opened",
            CycleCountEvent::CountRecorded(_) => "counting.cycle_count.recorded",
            CycleCountEvent::CountSubmitted(_) => "counting.cycle_count.submitted",
            CycleCountEvent::CountClosed(_) => "counting.cycle_count.closed",
            CycleCountEvent::CountCancelled(_) => "counting.cycle_count.cancelled",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            CycleCountEvent::CountOpened(e) => e.occurred_at,
            CycleCountEvent::CountRecorded(e) => e.occurred_at,
            CycleCountEvent::CountSubmitted(e) => e.occurred_at,
            CycleCountEvent::CountClosed(e) => e.occurred_at,
            CycleCountEvent::CountCancelled(e) => e.occurred_at,
        }
    }
}

impl Aggregate for CycleCount {
    type Command = CycleCountCommand;
    type Event = CycleCountEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            CycleCountEvent::CountOpened(e) => {
                self.id = e.count_id;
                self.tenant_id = Some(e.tenant_id);
                self.warehouse_id = Some(e.warehouse_id);
                self.status = CycleCountStatus::Open;
                self.lines = e
                    .lines
                    .iter()
                    .enumerate()
                    .map(|(i, l)| CycleCountLine {
                        line_no: (i as u32) + 1,
                        bin_id: l.bin_id,
                        item_id: l.item_id,
                        batch_no: l.batch_no.clone(),
                        qty_expected: l.qty_expected,
                        qty_counted: None,
                        variance: None,
                    })
                    .collect();
                self.created = true;
            }
            CycleCountEvent::CountRecorded(e) => {
                if let Some(line) = self.lines.iter_mut().find(|l| l.line_no == e.line_no) {
                    line.qty_counted = Some(e.qty_counted);
                }
                self.status = CycleCountStatus::InProgress;
            }
            CycleCountEvent::CountSubmitted(e) => {
                for v in &e.variances {
                    if let Some(line) = self.lines.iter_mut().find(|l| l.line_no == v.line_no) {
                        line.variance = Some(v.variance);
                    }
                }
                self.status = CycleCountStatus::PendingApproval;
            }
            CycleCountEvent::CountClosed(_) => {
                self.status = CycleCountStatus::Closed;
            }
            CycleCountEvent::CountCancelled(_) => {
                self.status = CycleCountStatus::Cancelled;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            CycleCountCommand::OpenCount(cmd) => self.handle_open(cmd),
            CycleCountCommand::RecordCount(cmd) => self.handle_record(cmd),
            CycleCountCommand::SubmitCount(cmd) => self.handle_submit(cmd),
            CycleCountCommand::CloseCount(cmd) => self.handle_close(cmd),
            CycleCountCommand::CancelCount(cmd) => self.handle_cancel(cmd),
        }
    }
}

impl CycleCount {
    fn ensure_exists(
        &self,
        tenant_id: TenantId,
        count_id: CycleCountId,
    ) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::validation("tenant mismatch"));
        }
        if self.id != count_id {
            return Err(DomainError::validation("count_id mismatch"));
        }
        Ok(())
    }

    fn handle_open(&self, cmd: &OpenCount) -> Result<Vec<CycleCountEvent>, DomainError> {
        if self.created {
            return Err(DomainError::concurrent("cycle count already exists"));
        }
        if cmd.lines.is_empty() {
            return Err(DomainError::validation(
                "cycle count scope contains no stock positions",
            ));
        }
        for l in &cmd.lines {
            if l.qty_expected < 0 {
                return Err(DomainError::validation(
                    "baseline quantity cannot be negative",
                ));
            }
        }

        Ok(vec![CycleCountEvent::CountOpened(CountOpened {
            tenant_id: cmd.tenant_id,
            count_id: cmd.count_id,
            warehouse_id: cmd.warehouse_id,
            lines: cmd.lines.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_record(&self, cmd: &RecordCount) -> Result<Vec<CycleCountEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id, cmd.count_id)?;

        if !matches!(
            self.status,
            CycleCountStatus::Open | CycleCountStatus::InProgress
        ) {
            return Err(DomainError::invalid_transition(format!(
                "cannot record counts in status {:?}",
                self.status
            )));
        }
        if cmd.qty_counted < 0 {
            return Err(DomainError::validation(
                "counted quantity cannot be negative",
            ));
        }
        if self.line(cmd.line_no).is_none() {
            return Err(DomainError::not_found());
        }

        Ok(vec![CycleCountEvent::CountRecorded(CountRecorded {
            tenant_id: cmd.tenant_id,
            count_id: cmd.count_id,
            line_no: cmd.line_no,
            qty_counted: cmd.qty_counted,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_submit(&self, cmd: &SubmitCount) -> Result<Vec<CycleCountEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id, cmd.count_id)?;

        if self.status != CycleCountStatus::InProgress {
            return Err(DomainError::invalid_transition(
                "only an in-progress count can be submitted",
            ));
        }

        let mut variances = Vec::new();
        for line in &self.lines {
            let counted = line.qty_counted.ok_or_else(|| {
                DomainError::validation(format!("line {} has not been counted", line.line_no))
            })?;
            variances.push(VarianceLine {
                line_no: line.line_no,
                bin_id: line.bin_id,
                item_id: line.item_id,
                batch_no: line.batch_no.clone(),
                variance: counted - line.qty_expected,
            });
        }

        Ok(vec![CycleCountEvent::CountSubmitted(CountSubmitted {
            tenant_id: cmd.tenant_id,
            count_id: cmd.count_id,
            variances,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_close(&self, cmd: &CloseCount) -> Result<Vec<CycleCountEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id, cmd.count_id)?;

        if self.status != CycleCountStatus::PendingApproval {
            return Err(DomainError::invalid_transition(
                "only a submitted count can be closed",
            ));
        }

        let warehouse_id = self
            .warehouse_id
            .ok_or_else(|| DomainError::validation("warehouse must be set"))?;

        // Zero variances need no ledger entry.
        let adjustments: Vec<VarianceLine> = self
            .lines
            .iter()
            .filter_map(|line| {
                let variance = line.variance?;
                (variance != 0).then(|| VarianceLine {
                    line_no: line.line_no,
                    bin_id: line.bin_id,
                    item_id: line.item_id,
                    batch_no: line.batch_no.clone(),
                    variance,
                })
            })
            .collect();

        Ok(vec![CycleCountEvent::CountClosed(CountClosed {
            tenant_id: cmd.tenant_id,
            count_id: cmd.count_id,
            warehouse_id,
            adjustments,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_cancel(&self, cmd: &CancelCount) -> Result<Vec<CycleCountEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id, cmd.count_id)?;

        if !matches!(
            self.status,
            CycleCountStatus::Open | CycleCountStatus::InProgress
        ) {
            return Err(DomainError::invalid_transition(format!(
                "cannot cancel a count in status {:?}",
                self.status
            )));
        }

        Ok(vec![CycleCountEvent::CountCancelled(CountCancelled {
            tenant_id: cmd.tenant_id,
            count_id: cmd.count_id,
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

    fn test_count_id() -> CycleCountId {
        CycleCountId::new(AggregateId::new())
    }

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn run(count: &mut CycleCount, cmd: CycleCountCommand) -> Vec<CycleCountEvent> {
        let events = count.handle(&cmd).unwrap();
        for e in &events {
            count.apply(e);
        }
        events
    }

    struct Fixture {
        count: CycleCount,
        tenant_id: TenantId,
        count_id: CycleCountId,
    }

    fn open_count(baselines: &[i64]) -> Fixture {
        let tenant_id = test_tenant_id();
        let count_id = test_count_id();
        let mut count = CycleCount::empty(count_id);

        let lines = baselines
            .iter()
            .map(|&qty| BaselineLine {
                bin_id: BinId::new(),
                item_id: ItemId::new(),
                batch_no: None,
                qty_expected: qty,
            })
            .collect();

        run(
            &mut count,
            CycleCountCommand::OpenCount(OpenCount {
                tenant_id,
                count_id,
                warehouse_id: WarehouseId::new(),
                lines,
                occurred_at: test_time(),
            }),
        );

        Fixture {
            count,
            tenant_id,
            count_id,
        }
    }

    fn record(fx: &mut Fixture, line_no: u32, qty: i64) {
        run(
            &mut fx.count,
            CycleCountCommand::RecordCount(RecordCount {
                tenant_id: fx.tenant_id,
                count_id: fx.count_id,
                line_no,
                qty_counted: qty,
                occurred_at: test_time(),
            }),
        );
    }

    #[test]
    fn recording_moves_count_to_in_progress() {
        let mut fx = open_count(&[100]);
        assert_eq!(fx.count.status(), CycleCountStatus::Open);

        record(&mut fx, 1, 92);
        assert_eq!(fx.count.status(), CycleCountStatus::InProgress);
        assert_eq!(fx.count.lines()[0].qty_counted, Some(92));
    }

    #[test]
    fn submit_computes_variance_against_frozen_baseline() {
        let mut fx = open_count(&[100, 40]);
        record(&mut fx, 1, 92);
        record(&mut fx, 2, 45);

        let events = run(
            &mut fx.count,
            CycleCountCommand::SubmitCount(SubmitCount {
                tenant_id: fx.tenant_id,
                count_id: fx.count_id,
                occurred_at: test_time(),
            }),
        );

        match &events[0] {
            CycleCountEvent::CountSubmitted(e) => {
                assert_eq!(e.variances[0].variance, -8);
                assert_eq!(e.variances[1].variance, 5);
            }
            other => panic!("expected CountSubmitted, got {other:?}"),
        }
        assert_eq!(fx.count.status(), CycleCountStatus::PendingApproval);
    }

    #[test]
    fn submit_requires_every_line_counted() {
        let mut fx = open_count(&[100, 40]);
        record(&mut fx, 1, 92);

        let err = fx
            .count
            .handle(&CycleCountCommand::SubmitCount(SubmitCount {
                tenant_id: fx.tenant_id,
                count_id: fx.count_id,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn close_emits_only_nonzero_variances() {
        let mut fx = open_count(&[100, 40]);
        record(&mut fx, 1, 92);
        record(&mut fx, 2, 40);
        run(
            &mut fx.count,
            CycleCountCommand::SubmitCount(SubmitCount {
                tenant_id: fx.tenant_id,
                count_id: fx.count_id,
                occurred_at: test_time(),
            }),
        );

        let events = run(
            &mut fx.count,
            CycleCountCommand::CloseCount(CloseCount {
                tenant_id: fx.tenant_id,
                count_id: fx.count_id,
                occurred_at: test_time(),
            }),
        );

        match &events[0] {
            CycleCountEvent::CountClosed(e) => {
                assert_eq!(e.adjustments.len(), 1);
                assert_eq!(e.adjustments[0].variance, -8);
            }
            other => panic!("expected CountClosed, got {other:?}"),
        }
        assert_eq!(fx.count.status(), CycleCountStatus::Closed);
    }

    #[test]
    fn closed_count_is_immutable() {
        let mut fx = open_count(&[10]);
        record(&mut fx, 1, 10);
        run(
            &mut fx.count,
            CycleCountCommand::SubmitCount(SubmitCount {
                tenant_id: fx.tenant_id,
                count_id: fx.count_id,
                occurred_at: test_time(),
            }),
        );
        run(
            &mut fx.count,
            CycleCountCommand::CloseCount(CloseCount {
                tenant_id: fx.tenant_id,
                count_id: fx.count_id,
                occurred_at: test_time(),
            }),
        );

        let err = fx
            .count
            .handle(&CycleCountCommand::RecordCount(RecordCount {
                tenant_id: fx.tenant_id,
                count_id: fx.count_id,
                line_no: 1,
                qty_counted: 5,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition(_)));
    }

    #[test]
    fn cancel_is_rejected_after_submission() {
        let mut fx = open_count(&[10]);
        record(&mut fx, 1, 9);
        run(
            &mut fx.count,
            CycleCountCommand::SubmitCount(SubmitCount {
                tenant_id: fx.tenant_id,
                count_id: fx.count_id,
                occurred_at: test_time(),
            }),
        );

        let err = fx
            .count
            .handle(&CycleCountCommand::CancelCount(CancelCount {
                tenant_id: fx.tenant_id,
                count_id: fx.count_id,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition(_)));
    }
}
