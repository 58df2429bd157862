use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use stockline_core::{BatchNo, BinId, ItemId, TenantId, WarehouseId};

use crate::movement::{MovementReason, MovementRef};

/// One immutable row of the stock ledger.
///
/// Never updated, never deleted. The ledger is both the audit trail and the
/// mathematically authoritative balance source: for any key, the snapshot
/// must equal the sum of `qty_change` over its entries, and the last
/// `qty_after` must match the snapshot exactly. `operation_id` groups the
/// entries of one movement batch and is the replay-detection handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: Uuid,
    pub operation_id: Uuid,
    pub tenant_id: TenantId,
    pub warehouse_id: WarehouseId,
    pub bin_id: BinId,
    pub item_id: ItemId,
    pub batch_no: Option<BatchNo>,
    pub reason: MovementReason,
    /// Signed delta applied to the key.
    pub qty_change: i64,
    /// Post-write on-hand balance of the key, for audit reconciliation.
    pub qty_after: i64,
    pub expiry_date: Option<NaiveDate>,
    pub reference: Option<MovementRef>,
    /// Business time of the movement (caller-supplied).
    pub occurred_at: DateTime<Utc>,
    /// Write time at the store.
    pub created_at: DateTime<Utc>,
}
