//! Box workflow routes

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use crate::state::AppState;

pub fn controller_routes() -> Router<AppState> {
    Router::new()
        .route("/inform_box", post(inform_box))
        .route("/box_info", get(box_info))
        .route("/validate_box/:device", post(validate_box))
        .route("/box_phase", get(box_phase))
}

#[derive(Debug, Deserialize)]
struct InformBoxRequest {
    box_info: String,
}

async fn inform_box(
    State(state): State<AppState>,
    Json(request): Json<InformBoxRequest>,
) -> impl IntoResponse {
    state.reconciler.update_box_info(&request.box_info).await;
    Json(json!({ "box_info": request.box_info }))
}

async fn box_info(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.reconciler.box_info().await)
}

async fn box_phase(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({ "phase": state.reconciler.phase().await }))
}

#[derive(Debug, Deserialize)]
struct ValidateParams {
    /// Act on the actuator now instead of scheduling a re-check.
    force: Option<bool>,
}

async fn validate_box(
    State(state): State<AppState>,
    Path(device): Path<String>,
    Query(params): Query<ValidateParams>,
) -> impl IntoResponse {
    let force = params.force.unwrap_or(false);
    state.reconciler.validate(&device, force).await;
    Json(json!({ "message": "Validation triggered.", "force": force }))
}
