use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use stockline_receiving::GrnId;

use crate::app::routes::common::parse_id;
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::TenantContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_grn))
        .route("/:id", get(get_grn))
        .route("/:id/lines", post(add_expected_line))
        .route("/:id/open", post(open_grn))
        .route("/:id/receive", post(receive_line))
        .route("/:id/putaways/:task_no/assign", post(assign_putaway))
        .route("/:id/putaways/:task_no/complete", post(complete_putaway))
        .route("/:id/putaways/:task_no/cancel", post(cancel_putaway))
        .route("/:id/complete", post(complete_grn))
        .route("/:id/cancel", post(cancel_grn))
}

fn grn_id(id: &str) -> Result<GrnId, axum::response::Response> {
    parse_id(id).map(GrnId::new)
}

pub async fn create_grn(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Json(body): Json<dto::CreateGrnRequest>,
) -> axum::response::Response {
    match services
        .receiving
        .create(tenant.tenant_id(), body.warehouse_id, body.supplier_ref)
    {
        Ok(id) => (
            StatusCode::CREATED,
            Json(serde_json::json!({ "id": id.to_string() })),
        )
            .into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn get_grn(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let grn_id = match grn_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.receiving.get(tenant.tenant_id(), grn_id) {
        Ok(grn) => (StatusCode::OK, Json(dto::grn_to_json(&grn))).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn add_expected_line(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::AddGrnLineRequest>,
) -> axum::response::Response {
    let grn_id = match grn_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.receiving.add_expected_line(
        tenant.tenant_id(),
        grn_id,
        body.item_id,
        body.qty_expected,
    ) {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn open_grn(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let grn_id = match grn_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.receiving.open(tenant.tenant_id(), grn_id) {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn receive_line(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::ReceiveGrnLineRequest>,
) -> axum::response::Response {
    let grn_id = match grn_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.receiving.receive_line(
        tenant.tenant_id(),
        grn_id,
        body.item_id,
        body.qty_received,
        body.receiving_bin_id,
        body.batch_no,
        body.expiry_date,
    ) {
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

pub async fn assign_putaway(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path((id, task_no)): Path<(String, u32)>,
    Json(body): Json<dto::AssignPutawayRequest>,
) -> axum::response::Response {
    let grn_id = match grn_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services
        .receiving
        .assign_putaway(tenant.tenant_id(), grn_id, task_no, body.assignee)
    {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn complete_putaway(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path((id, task_no)): Path<(String, u32)>,
    Json(body): Json<dto::CompletePutawayRequest>,
) -> axum::response::Response {
    let grn_id = match grn_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services
        .receiving
        .complete_putaway(tenant.tenant_id(), grn_id, task_no, body.to_bin_id)
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

pub async fn cancel_putaway(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path((id, task_no)): Path<(String, u32)>,
) -> axum::response::Response {
    let grn_id = match grn_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services
        .receiving
        .cancel_putaway(tenant.tenant_id(), grn_id, task_no)
    {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn complete_grn(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let grn_id = match grn_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.receiving.complete(tenant.tenant_id(), grn_id) {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn cancel_grn(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let grn_id = match grn_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.receiving.cancel(tenant.tenant_id(), grn_id) {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}
