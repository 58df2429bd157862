use axum::Router;

pub mod adjustments;
pub mod common;
pub mod counts;
pub mod receiving;
pub mod reservations;
pub mod stock;
pub mod system;
pub mod transfers;

/// All tenant-scoped domain routes.
pub fn router() -> Router {
    Router::new()
        .nest("/stock", stock::router())
        .nest("/reservations", reservations::router())
        .nest("/grns", receiving::router())
        .nest("/transfers", transfers::router())
        .nest("/counts", counts::router())
        .nest("/adjustments", adjustments::router())
}
