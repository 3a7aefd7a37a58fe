// Activity log HTTP routes

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use troupe_core::activity::{ActivityEvent, ExecutionType};
use troupe_storage::ActivityStore;

use super::common::{map_error, ListResponse};

#[derive(Clone)]
pub struct AppState {
    pub store: ActivityStore,
}

#[derive(Debug, Deserialize)]
pub struct ActivitiesQuery {
    pub execution_id: String,
    pub execution_type: ExecutionType,
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/v0.1/activities", get(list_activities).post(store_activity))
        .with_state(state)
}

/// GET /v0.1/activities - Fetch the activity log of one execution
#[utoipa::path(
    get,
    path = "/v0.1/activities",
    params(
        ("execution_id" = String, Query, description = "Execution id"),
        ("execution_type" = String, Query, description = "workflow | task")
    ),
    responses((status = 200, body = ListResponse<ActivityEvent>)),
    tag = "activities"
)]
pub async fn list_activities(
    State(state): State<AppState>,
    Query(query): Query<ActivitiesQuery>,
) -> Result<Json<ListResponse<ActivityEvent>>, StatusCode> {
    let activities = state
        .store
        .fetch_activities(&query.execution_id, query.execution_type)
        .await
        .map_err(map_error)?;
    Ok(Json(ListResponse::new(activities)))
}

/// POST /v0.1/activities - Append one activity event
#[utoipa::path(
    post,
    path = "/v0.1/activities",
    request_body = ActivityEvent,
    responses((status = 201, description = "Activity stored")),
    tag = "activities"
)]
pub async fn store_activity(
    State(state): State<AppState>,
    Json(activity): Json<ActivityEvent>,
) -> Result<StatusCode, StatusCode> {
    state
        .store
        .store_activity(&activity)
        .await
        .map_err(map_error)?;
    Ok(StatusCode::CREATED)
}
