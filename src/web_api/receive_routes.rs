//! Ingestion routes for external sources and simulators

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use serde_json::json;

use super::OneOrMany;
use crate::event_router::{EventEnvelope, EventPayload};
use crate::state::AppState;
use crate::tag_registry::TagRead;

pub fn receive_routes() -> Router<AppState> {
    Router::new()
        .route("/tags/:device", post(receive_tags))
        .route("/events/:device", post(receive_events))
}

async fn receive_tags(
    State(state): State<AppState>,
    Path(device): Path<String>,
    Json(tags): Json<OneOrMany<TagRead>>,
) -> impl IntoResponse {
    let tags = tags.into_vec();
    let received = tags.len();
    let mut accepted = 0usize;
    for tag in tags {
        if state.router.on_tag(&device, tag).await {
            accepted += 1;
        }
    }
    Json(json!({
        "message": "Tags received successfully.",
        "received_count": received,
        "accepted_count": accepted,
    }))
}

async fn receive_events(
    State(state): State<AppState>,
    Path(device): Path<String>,
    Json(events): Json<OneOrMany<EventEnvelope>>,
) -> impl IntoResponse {
    let events = events.into_vec();
    let received = events.len();
    let mut accepted = 0usize;
    for envelope in events {
        match EventPayload::classify(&envelope.event_type, envelope.event_data) {
            Ok(payload) => {
                state.router.on_event(&device, payload).await;
                accepted += 1;
            }
            Err(e) => {
                tracing::warn!(device = %device, error = %e, "Dropping malformed event");
            }
        }
    }
    Json(json!({
        "message": "Events received successfully.",
        "received_count": received,
        "accepted_count": accepted,
    }))
}
