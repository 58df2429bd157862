use axum::http::StatusCode;

use stockline_core::AggregateId;

use crate::app::errors;

/// Parse a path segment into an aggregate id or answer 400.
pub fn parse_id(id: &str) -> Result<AggregateId, axum::response::Response> {
    id.parse().map_err(|_| {
        errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid identifier")
    })
}
