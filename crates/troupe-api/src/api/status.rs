// Status ingest HTTP route
//
// Agent runtimes push status events here. The host ip is taken from the
// request peer, never from the body.

use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use serde_json::json;
use troupe_core::StatusEvent;
use troupe_engine::StatusIngest;

use super::common::map_error;

#[derive(Clone)]
pub struct AppState {
    pub ingest: StatusIngest,
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/v0.1/status-update", post(status_update))
        .with_state(state)
}

/// POST /v0.1/status-update - Apply a pushed status event
#[utoipa::path(
    post,
    path = "/v0.1/status-update",
    request_body = StatusEvent,
    responses(
        (status = 200, description = "Status applied"),
        (status = 400, description = "Unknown resource type or invalid status"),
        (status = 404, description = "Resource not found")
    ),
    tag = "events"
)]
pub async fn status_update(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Json(mut event): Json<StatusEvent>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    event.set_host_ip(peer.ip().to_string());
    state.ingest.apply(event).await.map_err(map_error)?;
    Ok(Json(json!({ "message": "OK" })))
}
