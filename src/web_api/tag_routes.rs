//! Tag report and maintenance routes

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use crate::state::AppState;
use crate::tag_registry::TagField;
use crate::{Error, Result};

pub fn tag_routes() -> Router<AppState> {
    Router::new()
        .route("/get_tags", get(get_tags))
        .route("/get_tag_count", get(get_tag_count))
        .route("/get_epcs", get(get_epcs))
        .route("/get_tids", get(get_tids))
        .route("/get_tag_info/:value", get(get_tag_info))
        .route("/get_distinct_count/:field", get(get_distinct_count))
        .route("/clear_tags", post(clear_tags))
        .route("/clear_tags_device/:device", post(clear_tags_device))
        .route("/generate_table_report/:table", get(generate_table_report))
}

async fn get_tags(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.registry.get_all().await)
}

async fn get_tag_count(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({ "count": state.registry.count().await }))
}

async fn get_epcs(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.registry.get_epcs().await)
}

async fn get_tids(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.registry.get_tids().await)
}

#[derive(Debug, Deserialize)]
struct TagInfoParams {
    /// Lookup field; defaults to EPC.
    field: Option<String>,
}

async fn get_tag_info(
    State(state): State<AppState>,
    Path(value): Path<String>,
    Query(params): Query<TagInfoParams>,
) -> Result<impl IntoResponse> {
    let field: TagField = params
        .field
        .as_deref()
        .unwrap_or("epc")
        .parse()
        .map_err(Error::Validation)?;
    Ok(Json(state.registry.get_by_identifier(&value, field).await))
}

async fn get_distinct_count(
    State(state): State<AppState>,
    Path(field): Path<String>,
) -> Result<impl IntoResponse> {
    let field: TagField = field.parse().map_err(Error::Validation)?;
    Ok(Json(state.registry.count_distinct_by_field(field).await))
}

async fn clear_tags(State(state): State<AppState>) -> impl IntoResponse {
    state.registry.clear().await;
    Json(json!({ "message": "All tags have been cleared." }))
}

async fn clear_tags_device(
    State(state): State<AppState>,
    Path(device): Path<String>,
) -> impl IntoResponse {
    state.registry.remove_by_device(&device).await;
    Json(json!({
        "message": format!("All tags for device {device} have been cleared.")
    }))
}

#[derive(Debug, Deserialize)]
struct ReportParams {
    limit: Option<i64>,
    offset: Option<i64>,
}

async fn generate_table_report(
    State(state): State<AppState>,
    Path(table): Path<String>,
    Query(params): Query<ReportParams>,
) -> Result<impl IntoResponse> {
    let limit = params.limit.unwrap_or(1000).clamp(1, 10_000);
    let offset = params.offset.unwrap_or(0).max(0);

    match table.as_str() {
        "tags" => {
            let repo = state
                .tag_repo
                .as_ref()
                .ok_or_else(|| Error::Config("Database integration is not configured".into()))?;
            Ok(Json(serde_json::to_value(repo.report(limit, offset).await?)?))
        }
        "events" => {
            let repo = state
                .event_repo
                .as_ref()
                .ok_or_else(|| Error::Config("Database integration is not configured".into()))?;
            Ok(Json(serde_json::to_value(repo.report(limit, offset).await?)?))
        }
        other => Err(Error::Validation(format!("Invalid table name: {other}"))),
    }
}
