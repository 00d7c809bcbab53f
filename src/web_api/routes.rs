//! API Routes

use axum::{routing::get, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Create API router
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/healthz", get(super::health_check))
        .nest("/api/v1/rfid", super::tag_routes::tag_routes())
        .nest("/api/v1/receive", super::receive_routes::receive_routes())
        .nest(
            "/api/v1/controller",
            super::controller_routes::controller_routes(),
        )
        .nest("/api/v1/devices", super::device_routes::device_routes())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
