// GitHub webhook HTTP route

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use troupe_github::GithubApp;

use super::common::map_error;

#[derive(Clone)]
pub struct AppState {
    pub app: Arc<GithubApp>,
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/v0.1/github", post(handle_webhook))
        .with_state(state)
}

/// POST /v0.1/github - Receive a GitHub webhook
#[utoipa::path(
    post,
    path = "/v0.1/github",
    responses(
        (status = 200, description = "Webhook handled"),
        (status = 400, description = "Malformed webhook payload"),
        (status = 500, description = "Internal server error")
    ),
    tag = "github"
)]
pub async fn handle_webhook(
    State(state): State<AppState>,
    Json(payload): Json<serde_json::Value>,
) -> Result<StatusCode, StatusCode> {
    state
        .app
        .handle_webhook_payload(payload)
        .await
        .map_err(map_error)?;
    Ok(StatusCode::OK)
}
