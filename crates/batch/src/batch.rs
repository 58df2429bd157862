use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use stockline_core::{BatchNo, ItemId, TenantId};

/// A batch (lot) of one item.
///
/// Unique per (tenant, item, batch_no); many stock snapshots across
/// different bins may reference the same batch. The expiry date is fixed
/// when the batch is first seen on a movement — later movements naming the
/// same batch must agree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    pub tenant_id: TenantId,
    pub item_id: ItemId,
    pub batch_no: BatchNo,
    pub expiry_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

impl Batch {
    pub fn new(
        tenant_id: TenantId,
        item_id: ItemId,
        batch_no: BatchNo,
        expiry_date: Option<NaiveDate>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            tenant_id,
            item_id,
            batch_no,
            expiry_date,
            created_at,
        }
    }
}
