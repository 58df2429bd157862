use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use stockline_core::{
    AggregateId, BatchNo, BinId, DomainError, DomainResult, ItemId, TenantId, WarehouseId,
};

/// Reason code of a quantity-changing ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementReason {
    Receive,
    Pick,
    Ship,
    IbtIn,
    IbtOut,
    Adjust,
    Scrap,
    Transfer,
    Return,
}

impl MovementReason {
    pub fn as_str(self) -> &'static str {
        match self {
            MovementReason::Receive => "receive",
            MovementReason::Pick => "pick",
            MovementReason::Ship => "ship",
            MovementReason::IbtIn => "ibt_in",
            MovementReason::IbtOut => "ibt_out",
            MovementReason::Adjust => "adjust",
            MovementReason::Scrap => "scrap",
            MovementReason::Transfer => "transfer",
            MovementReason::Return => "return",
        }
    }

    /// Reasons that only ever add stock; a negative delta is malformed.
    pub fn inbound_only(self) -> bool {
        matches!(
            self,
            MovementReason::Receive | MovementReason::IbtIn | MovementReason::Return
        )
    }

    /// Decrements that must not touch reserved stock: the precondition is
    /// `qty_available >= |delta|`.
    pub fn checks_available(self) -> bool {
        matches!(
            self,
            MovementReason::Pick
                | MovementReason::Ship
                | MovementReason::IbtOut
                | MovementReason::Transfer
        )
    }

    /// Corrections bounded only by on-hand: they may drive a key to exactly
    /// zero (cutting under the reserved quantity if shrinkage demands it)
    /// but never negative.
    pub fn bounded_by_on_hand(self) -> bool {
        matches!(self, MovementReason::Adjust | MovementReason::Scrap)
    }
}

impl core::fmt::Display for MovementReason {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Link from a ledger entry back to the workflow document that caused it.
///
/// The entry outlives the document's mutability window: cancelling a header
/// later never touches entries already posted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum MovementRef {
    Grn(AggregateId),
    Ibt(AggregateId),
    CycleCount(AggregateId),
    Adjustment(AggregateId),
    Reservation(AggregateId),
}

/// One quantity change against one (bin, item, batch) key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Movement {
    pub warehouse_id: WarehouseId,
    pub bin_id: BinId,
    pub item_id: ItemId,
    pub batch_no: Option<BatchNo>,
    pub reason: MovementReason,
    /// Signed delta; never zero.
    pub qty_change: i64,
    /// Expiry of the batch, carried on the first inbound movement that
    /// introduces it.
    pub expiry_date: Option<NaiveDate>,
    pub reference: Option<MovementRef>,
}

impl Movement {
    pub fn validate(&self) -> DomainResult<()> {
        if self.qty_change == 0 {
            return Err(DomainError::validation("movement delta cannot be zero"));
        }
        if self.reason.inbound_only() && self.qty_change < 0 {
            return Err(DomainError::validation(format!(
                "{} movements must be positive",
                self.reason
            )));
        }
        if self.expiry_date.is_some() && self.batch_no.is_none() {
            return Err(DomainError::validation(
                "expiry date requires a batch number",
            ));
        }
        Ok(())
    }

    pub fn key(&self, tenant_id: TenantId) -> crate::snapshot::StockKey {
        crate::snapshot::StockKey {
            tenant_id,
            bin_id: self.bin_id,
            item_id: self.item_id,
            batch_no: self.batch_no.clone(),
        }
    }
}

/// The all-or-nothing unit of ledger writes.
///
/// Either every movement in the batch validates and posts, or none do.
/// `operation_id` is the caller-supplied idempotency handle: replaying a
/// batch with a known id returns the originally produced entries instead of
/// double-applying.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementBatch {
    pub operation_id: Uuid,
    pub tenant_id: TenantId,
    pub occurred_at: DateTime<Utc>,
    pub movements: Vec<Movement>,
}

impl MovementBatch {
    pub fn new(
        operation_id: Uuid,
        tenant_id: TenantId,
        occurred_at: DateTime<Utc>,
        movements: Vec<Movement>,
    ) -> Self {
        Self {
            operation_id,
            tenant_id,
            occurred_at,
            movements,
        }
    }

    pub fn single(
        operation_id: Uuid,
        tenant_id: TenantId,
        occurred_at: DateTime<Utc>,
        movement: Movement,
    ) -> Self {
        Self::new(operation_id, tenant_id, occurred_at, vec![movement])
    }

    pub fn validate(&self) -> DomainResult<()> {
        if self.movements.is_empty() {
            return Err(DomainError::validation(
                "movement batch must contain at least one movement",
            ));
        }
        for m in &self.movements {
            m.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn movement(reason: MovementReason, qty: i64) -> Movement {
        Movement {
            warehouse_id: WarehouseId::new(),
            bin_id: BinId::new(),
            item_id: ItemId::new(),
            batch_no: None,
            reason,
            qty_change: qty,
            expiry_date: None,
            reference: None,
        }
    }

    #[test]
    fn zero_delta_is_rejected() {
        let err = movement(MovementReason::Adjust, 0).validate().unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn negative_receive_is_rejected() {
        let err = movement(MovementReason::Receive, -5).validate().unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn expiry_without_batch_is_rejected() {
        let mut m = movement(MovementReason::Receive, 5);
        m.expiry_date = chrono::NaiveDate::from_ymd_opt(2026, 1, 1);
        let err = m.validate().unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn empty_batch_is_rejected() {
        let batch = MovementBatch::new(Uuid::now_v7(), TenantId::new(), Utc::now(), vec![]);
        assert!(batch.validate().is_err());
    }
}
