use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use stockline_adjustment::AdjustmentId;

use crate::app::routes::common::parse_id;
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::TenantContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_adjustment))
        .route("/:id", get(get_adjustment))
        .route("/:id/lines", post(add_line))
        .route("/:id/submit", post(submit))
        .route("/:id/approve", post(approve))
        .route("/:id/reject", post(reject))
        .route("/:id/post", post(post_adjustment))
}

fn adjustment_id(id: &str) -> Result<AdjustmentId, axum::response::Response> {
    parse_id(id).map(AdjustmentId::new)
}

pub async fn create_adjustment(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Json(body): Json<dto::CreateAdjustmentRequest>,
) -> axum::response::Response {
    match services
        .adjustments
        .create(tenant.tenant_id(), body.warehouse_id)
    {
        Ok(id) => (
            StatusCode::CREATED,
            Json(serde_json::json!({ "id": id.to_string() })),
        )
            .into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn get_adjustment(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let adjustment_id = match adjustment_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.adjustments.get(tenant.tenant_id(), adjustment_id) {
        Ok(adjustment) => {
            (StatusCode::OK, Json(dto::adjustment_to_json(&adjustment))).into_response()
        }
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn add_line(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::AddAdjustmentLineRequest>,
) -> axum::response::Response {
    let adjustment_id = match adjustment_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.adjustments.add_line(
        tenant.tenant_id(),
        adjustment_id,
        body.bin_id,
        body.item_id,
        body.batch_no,
        body.qty_change,
        body.reason,
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
    let adjustment_id = match adjustment_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.adjustments.submit(tenant.tenant_id(), adjustment_id) {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn approve(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let adjustment_id = match adjustment_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.adjustments.approve(tenant.tenant_id(), adjustment_id) {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn reject(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let adjustment_id = match adjustment_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.adjustments.reject(tenant.tenant_id(), adjustment_id) {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn post_adjustment(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let adjustment_id = match adjustment_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.adjustments.post(tenant.tenant_id(), adjustment_id) {
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
