//! WebAPI - REST API Endpoints
//!
//! ## Responsibilities
//!
//! - HTTP routes over the core components
//! - Request validation
//! - Response formatting
//!
//! Everything here is thin plumbing; the contracts live in the components.

mod controller_routes;
mod device_routes;
mod receive_routes;
mod routes;
mod tag_routes;

pub use routes::create_router;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::state::AppState;

/// Accepts either a single item or a batch, the way readers post them.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::One(item) => vec![item],
            OneOrMany::Many(items) => items,
        }
    }
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "tag_count": state.registry.count().await,
        "devices_connected": state.gateway.connections_active(),
    }))
}
