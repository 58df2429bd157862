use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use stockline_core::ReservationId;

use crate::app::routes::common::parse_id;
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::TenantContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(reserve))
        .route("/:id", get(get_reservation).delete(release))
}

pub async fn reserve(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Json(body): Json<dto::ReserveRequest>,
) -> axum::response::Response {
    match services
        .reservations
        .reserve(tenant.tenant_id(), body.item_id, body.qty)
    {
        Ok(id) => (
            StatusCode::CREATED,
            Json(serde_json::json!({ "reservation_id": id.to_string() })),
        )
            .into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn get_reservation(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match parse_id(&id) {
        Ok(v) => ReservationId::from_uuid(*v.as_uuid()),
        Err(resp) => return resp,
    };

    match services.reservations.get(tenant.tenant_id(), id) {
        Some(reservation) => (
            StatusCode::OK,
            Json(dto::reservation_to_json(&reservation)),
        )
            .into_response(),
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", "reservation not found"),
    }
}

pub async fn release(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match parse_id(&id) {
        Ok(v) => ReservationId::from_uuid(*v.as_uuid()),
        Err(resp) => return resp,
    };

    match services.reservations.release(tenant.tenant_id(), id) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}
