use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use stockline_counting::CycleCountId;

use crate::app::routes::common::parse_id;
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::TenantContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(open_count))
        .route("/:id", get(get_count))
        .route("/:id/record", post(record))
        .route("/:id/submit", post(submit))
        .route("/:id/close", post(close))
        .route("/:id/cancel", post(cancel))
}

fn count_id(id: &str) -> Result<CycleCountId, axum::response::Response> {
    parse_id(id).map(CycleCountId::new)
}

pub async fn open_count(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Json(body): Json<dto::OpenCountRequest>,
) -> axum::response::Response {
    match services
        .counting
        .open(tenant.tenant_id(), body.warehouse_id, body.item_id)
    {
        Ok(id) => (
            StatusCode::CREATED,
            Json(serde_json::json!({ "id": id.to_string() })),
        )
            .into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn get_count(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let count_id = match count_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.counting.get(tenant.tenant_id(), count_id) {
        Ok(count) => (StatusCode::OK, Json(dto::count_to_json(&count))).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn record(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::RecordCountRequest>,
) -> axum::response::Response {
    let count_id = match count_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.counting.record(
        tenant.tenant_id(),
        count_id,
        body.line_no,
        body.qty_counted,
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
    let count_id = match count_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.counting.submit(tenant.tenant_id(), count_id) {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn close(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let count_id = match count_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.counting.close(tenant.tenant_id(), count_id) {
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
    let count_id = match count_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.counting.cancel(tenant.tenant_id(), count_id) {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}
