//! Device command routes

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use crate::device_gateway::OutputMode;
use crate::state::AppState;
use crate::{Error, Result};

pub fn device_routes() -> Router<AppState> {
    Router::new()
        .route("/start_inventory/:device", post(start_inventory))
        .route("/stop_inventory/:device", post(stop_inventory))
        .route("/write_gpo/:device", post(write_gpo))
}

async fn start_inventory(
    State(state): State<AppState>,
    Path(device): Path<String>,
) -> Result<impl IntoResponse> {
    state
        .gateway
        .start_inventory(&device)
        .await
        .map_err(|e| Error::Gateway(e.to_string()))?;
    Ok(Json(json!({ "message": "Inventory started." })))
}

async fn stop_inventory(
    State(state): State<AppState>,
    Path(device): Path<String>,
) -> Result<impl IntoResponse> {
    state
        .gateway
        .stop_inventory(&device)
        .await
        .map_err(|e| Error::Gateway(e.to_string()))?;
    Ok(Json(json!({ "message": "Inventory stopped." })))
}

#[derive(Debug, Deserialize)]
struct WriteGpoRequest {
    pin: u8,
    state: bool,
    #[serde(default)]
    pulsed: bool,
    #[serde(default = "default_duration")]
    duration_ms: u64,
}

fn default_duration() -> u64 {
    300
}

async fn write_gpo(
    State(state): State<AppState>,
    Path(device): Path<String>,
    Json(request): Json<WriteGpoRequest>,
) -> Result<impl IntoResponse> {
    let mode = if request.pulsed {
        OutputMode::Pulsed
    } else {
        OutputMode::Steady
    };
    let (ok, msg) = state
        .gateway
        .write_output(&device, request.pin, request.state, mode, request.duration_ms)
        .await;
    if !ok {
        return Err(Error::Gateway(
            msg.unwrap_or_else(|| "GPO write failed".to_string()),
        ));
    }
    Ok(Json(json!({ "message": "GPO write command sent successfully." })))
}
