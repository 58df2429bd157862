use axum::{
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};

use crate::context::TenantContext;

/// Resolve the tenant for the request.
///
/// The upstream gateway authenticates the caller and forwards the resolved
/// tenant in `x-tenant-id`; domain routes refuse to run without one.
pub async fn tenant_middleware(
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let tenant_id = extract_tenant(req.headers())?;

    req.extensions_mut().insert(TenantContext::new(tenant_id));

    Ok(next.run(req).await)
}

fn extract_tenant(headers: &HeaderMap) -> Result<stockline_core::TenantId, StatusCode> {
    let header = headers
        .get("x-tenant-id")
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let header = header.to_str().map_err(|_| StatusCode::UNAUTHORIZED)?;

    header
        .trim()
        .parse()
        .map_err(|_| StatusCode::UNAUTHORIZED)
}
