//! Request DTOs and JSON mapping helpers.

use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{Value as JsonValue, json};
use uuid::Uuid;

use stockline_adjustment::Adjustment;
use stockline_core::{BatchNo, BinId, ItemId, UserId, WarehouseId};
use stockline_counting::CycleCount;
use stockline_infra::queries::{StockOverviewRow, TierCount};
use stockline_infra::reservation::Reservation;
use stockline_receiving::Grn;
use stockline_stock::{LedgerEntry, Movement};
use stockline_transfer::{Ibt, ReceiveLineQty, ShipLineQty};

#[derive(Debug, Deserialize)]
pub struct CommitMovementRequest {
    /// Idempotency handle: retrying with the same id replays safely.
    pub operation_id: Uuid,
    pub movements: Vec<Movement>,
}

#[derive(Debug, Deserialize)]
pub struct ReserveRequest {
    pub item_id: ItemId,
    pub qty: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateGrnRequest {
    pub warehouse_id: WarehouseId,
    pub supplier_ref: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AddGrnLineRequest {
    pub item_id: ItemId,
    pub qty_expected: i64,
}

#[derive(Debug, Deserialize)]
pub struct ReceiveGrnLineRequest {
    pub item_id: ItemId,
    pub qty_received: i64,
    pub receiving_bin_id: BinId,
    pub batch_no: Option<BatchNo>,
    pub expiry_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct AssignPutawayRequest {
    pub assignee: UserId,
}

#[derive(Debug, Deserialize)]
pub struct CompletePutawayRequest {
    pub to_bin_id: BinId,
}

#[derive(Debug, Deserialize)]
pub struct CreateIbtRequest {
    pub source_warehouse_id: WarehouseId,
    pub dest_warehouse_id: WarehouseId,
}

#[derive(Debug, Deserialize)]
pub struct AddIbtLineRequest {
    pub item_id: ItemId,
    pub batch_no: Option<BatchNo>,
    pub from_bin_id: BinId,
    pub qty_requested: i64,
}

#[derive(Debug, Deserialize)]
pub struct ShipIbtRequest {
    pub lines: Vec<ShipLineQty>,
}

#[derive(Debug, Deserialize)]
pub struct ReceiveIbtRequest {
    pub lines: Vec<ReceiveLineQty>,
}

#[derive(Debug, Deserialize)]
pub struct OpenCountRequest {
    pub warehouse_id: WarehouseId,
    pub item_id: Option<ItemId>,
}

#[derive(Debug, Deserialize)]
pub struct RecordCountRequest {
    pub line_no: u32,
    pub qty_counted: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateAdjustmentRequest {
    pub warehouse_id: WarehouseId,
}

#[derive(Debug, Deserialize)]
pub struct AddAdjustmentLineRequest {
    pub bin_id: BinId,
    pub item_id: ItemId,
    pub batch_no: Option<BatchNo>,
    pub qty_change: i64,
    pub reason: String,
}

pub fn ledger_entries_to_json(entries: &[LedgerEntry]) -> JsonValue {
    json!(entries)
}

pub fn grn_to_json(grn: &Grn) -> JsonValue {
    json!({
        "id": grn.id_typed().to_string(),
        "warehouse_id": grn.warehouse_id(),
        "supplier_ref": grn.supplier_ref(),
        "status": grn.status(),
        "lines": grn.lines(),
        "putaway_tasks": grn.putaway_tasks(),
    })
}

pub fn ibt_to_json(ibt: &Ibt) -> JsonValue {
    json!({
        "id": ibt.id_typed().to_string(),
        "source_warehouse_id": ibt.source_warehouse_id(),
        "dest_warehouse_id": ibt.dest_warehouse_id(),
        "status": ibt.status(),
        "lines": ibt.lines(),
    })
}

pub fn count_to_json(count: &CycleCount) -> JsonValue {
    json!({
        "id": count.id_typed().to_string(),
        "warehouse_id": count.warehouse_id(),
        "status": count.status(),
        "lines": count.lines(),
    })
}

pub fn adjustment_to_json(adjustment: &Adjustment) -> JsonValue {
    json!({
        "id": adjustment.id_typed().to_string(),
        "warehouse_id": adjustment.warehouse_id(),
        "status": adjustment.status(),
        "lines": adjustment.lines(),
    })
}

pub fn reservation_to_json(reservation: &Reservation) -> JsonValue {
    json!({
        "id": reservation.id.to_string(),
        "item_id": reservation.item_id,
        "qty": reservation.qty,
        "allocations": reservation.allocations,
        "created_at": reservation.created_at,
    })
}

pub fn tier_counts_to_json(tiers: &[TierCount]) -> JsonValue {
    json!(
        tiers
            .iter()
            .map(|t| json!({ "tier": t.tier, "count": t.count }))
            .collect::<Vec<_>>()
    )
}

pub fn overview_to_json(rows: &[StockOverviewRow]) -> JsonValue {
    json!(
        rows.iter()
            .map(|r| json!({
                "bin_id": r.key.bin_id,
                "item_id": r.key.item_id,
                "batch_no": r.key.batch_no,
                "warehouse_id": r.snapshot.warehouse_id,
                "qty_on_hand": r.snapshot.qty_on_hand,
                "qty_reserved": r.snapshot.qty_reserved,
                "qty_available": r.snapshot.qty_available(),
                "expiry_date": r.snapshot.expiry_date,
                "tier": r.tier,
            }))
            .collect::<Vec<_>>()
    )
}
