use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use stockline_transfer::IbtId;

use crate::app::routes::common::parse_id;
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::TenantContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_ibt))
        .route("/:id", get(get_ibt))
        .route("/:id/lines", post(add_line))
        .route("/:id/submit", post(submit))
        .route("/:id/approve", post(approve))
        .route("/:id/start-picking", post(start_picking))
        .route("/:id/ship", post(ship))
        .route("/:id/receive", post(receive))
        .route("/:id/cancel", post(cancel))
}

fn ibt_id(id: &str) -> Result<IbtId, axum::response::Response> {
    parse_id(id).map(IbtId::new)
}

pub async fn create_ibt(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Json(body): Json<dto::CreateIbtRequest>,
) -> axum::response::Response {
    match services.transfers.create(
        tenant.tenant_id(),
        body.source_warehouse_id,
        body.dest_warehouse_id,
    ) {
        Ok(id) => (
            StatusCode::CREATED,
            Json(serde_json::json!({ "id": id.to_string() })),
        )
            .into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn get_ibt(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let ibt_id = match ibt_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.transfers.get(tenant.tenant_id(), ibt_id) {
        Ok(ibt) => (StatusCode::OK, Json(dto::ibt_to_json(&ibt))).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn add_line(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::AddIbtLineRequest>,
) -> axum::response::Response {
    let ibt_id = match ibt_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.transfers.add_line(
        tenant.tenant_id(),
        ibt_id,
        body.item_id,
        body.batch_no,
        body.from_bin_id,
        body.qty_requested,
    ) {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn submit(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let ibt_id = match ibt_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.transfers.submit(tenant.tenant_id(), ibt_id) {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn approve(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let ibt_id = match ibt_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.transfers.approve(tenant.tenant_id(), ibt_id) {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn start_picking(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let ibt_id = match ibt_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.transfers.start_picking(tenant.tenant_id(), ibt_id) {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn ship(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::ShipIbtRequest>,
) -> axum::response::Response {
    let ibt_id = match ibt_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.transfers.ship(tenant.tenant_id(), ibt_id, body.lines) {
        Ok(outcome) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "entries": dto::ledger_entries_to_json(&outcome.ledger_entries),
            })),
        )
            .into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn receive(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::ReceiveIbtRequest>,
) -> axum::response::Response {
    let ibt_id = match ibt_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services
        .transfers
        .receive(tenant.tenant_id(), ibt_id, body.lines)
    {
        Ok(outcome) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "entries": dto::ledger_entries_to_json(&outcome.ledger_entries),
            })),
        )
            .into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn cancel(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let ibt_id = match ibt_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.transfers.cancel(tenant.tenant_id(), ibt_id) {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}
