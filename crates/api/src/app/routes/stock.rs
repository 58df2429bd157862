use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::Utc;
use serde::Deserialize;

use stockline_core::{BatchNo, BinId, ItemId, WarehouseId};
use stockline_stock::{MovementBatch, StockKey};

use crate::app::routes::common::parse_id;
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::TenantContext;

pub fn router() -> Router {
    Router::new()
        .route("/movements", post(commit_movement))
        .route("/items/:id/available", get(get_available))
        .route("/expiry-alerts", get(get_expiry_alerts))
        .route("/overview", get(get_overview))
        .route("/ledger", get(get_ledger))
        .route("/reconciliation", get(get_reconciliation))
}

pub async fn commit_movement(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Json(body): Json<dto::CommitMovementRequest>,
) -> axum::response::Response {
    let batch = MovementBatch::new(
        body.operation_id,
        tenant.tenant_id(),
        Utc::now(),
        body.movements,
    );

    match services.stock.commit_movement(batch) {
        Ok(entries) => (
            StatusCode::CREATED,
            Json(serde_json::json!({
                "entries": dto::ledger_entries_to_json(&entries),
            })),
        )
            .into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

#[derive(Debug, Deserialize)]
pub struct AvailableQuery {
    pub warehouse_id: Option<WarehouseId>,
}

pub async fn get_available(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
    Query(query): Query<AvailableQuery>,
) -> axum::response::Response {
    let item_id = match parse_id(&id) {
        Ok(v) => ItemId::from_uuid(*v.as_uuid()),
        Err(resp) => return resp,
    };

    let qty = services
        .queries
        .available(tenant.tenant_id(), item_id, query.warehouse_id);

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "item_id": item_id.to_string(),
            "qty_available": qty,
        })),
    )
        .into_response()
}

#[derive(Debug, Deserialize)]
pub struct ExpiryAlertQuery {
    pub warehouse_id: Option<WarehouseId>,
    pub days_ahead: Option<i64>,
}

pub async fn get_expiry_alerts(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Query(query): Query<ExpiryAlertQuery>,
) -> axum::response::Response {
    let days_ahead = query.days_ahead.unwrap_or(30);
    if days_ahead < 0 {
        return errors::json_error(
            StatusCode::BAD_REQUEST,
            "validation_error",
            "days_ahead cannot be negative",
        );
    }

    let tiers = services.queries.expiry_alerts(
        tenant.tenant_id(),
        query.warehouse_id,
        days_ahead,
        Utc::now().date_naive(),
    );

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "days_ahead": days_ahead,
            "tiers": dto::tier_counts_to_json(&tiers),
        })),
    )
        .into_response()
}

pub async fn get_overview(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Query(query): Query<AvailableQuery>,
) -> axum::response::Response {
    let rows = services.queries.overview(
        tenant.tenant_id(),
        query.warehouse_id,
        Utc::now().date_naive(),
    );

    (StatusCode::OK, Json(dto::overview_to_json(&rows))).into_response()
}

#[derive(Debug, Deserialize)]
pub struct LedgerQuery {
    pub bin_id: BinId,
    pub item_id: ItemId,
    pub batch_no: Option<BatchNo>,
}

pub async fn get_ledger(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Query(query): Query<LedgerQuery>,
) -> axum::response::Response {
    let key = StockKey {
        tenant_id: tenant.tenant_id(),
        bin_id: query.bin_id,
        item_id: query.item_id,
        batch_no: query.batch_no,
    };

    let entries = services.queries.ledger(&key);
    (StatusCode::OK, Json(dto::ledger_entries_to_json(&entries))).into_response()
}

pub async fn get_reconciliation(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Query(query): Query<AvailableQuery>,
) -> axum::response::Response {
    let mismatches = services
        .queries
        .reconcile(tenant.tenant_id(), query.warehouse_id);

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "clean": mismatches.is_empty(),
            "mismatches": mismatches
                .iter()
                .map(|m| serde_json::json!({
                    "bin_id": m.key.bin_id,
                    "item_id": m.key.item_id,
                    "batch_no": m.key.batch_no,
                    "snapshot_qty": m.snapshot_qty,
                    "ledger_sum": m.ledger_sum,
                    "last_qty_after": m.last_qty_after,
                }))
                .collect::<Vec<_>>(),
        })),
    )
        .into_response()
}
