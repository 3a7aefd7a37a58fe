// Workflow record HTTP routes
//
// Records are created by the engine, not this surface; operators can read
// and delete them. Deleting a WorkflowSpec does not cascade here; records
// stay navigable after their workflow is gone.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use troupe_core::WorkflowRecord;
use troupe_storage::WorkflowRecordStore;

use super::common::{map_error, ListResponse};

#[derive(Clone)]
pub struct AppState {
    pub records: WorkflowRecordStore,
    pub namespace: String,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    /// Narrow the listing to one workflow
    pub workflow: Option<String>,
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/v0.1/workflow-records", get(list_records))
        .route(
            "/v0.1/workflow-records/:workflow/:record_id",
            get(get_record).delete(delete_record),
        )
        .with_state(state)
}

#[utoipa::path(
    get,
    path = "/v0.1/workflow-records",
    params(("workflow" = Option<String>, Query, description = "Only records of this workflow")),
    responses((status = 200, body = ListResponse<WorkflowRecord>)),
    tag = "workflow-records"
)]
pub async fn list_records(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ListResponse<WorkflowRecord>>, StatusCode> {
    let records = state
        .records
        .list(query.workflow.as_deref(), &state.namespace)
        .await
        .map_err(map_error)?;
    Ok(Json(ListResponse::new(records)))
}

#[utoipa::path(
    get,
    path = "/v0.1/workflow-records/{workflow}/{record_id}",
    params(
        ("workflow" = String, Path, description = "Workflow name"),
        ("record_id" = String, Path, description = "Record id")
    ),
    responses(
        (status = 200, body = WorkflowRecord),
        (status = 404, description = "Record not found")
    ),
    tag = "workflow-records"
)]
pub async fn get_record(
    State(state): State<AppState>,
    Path((workflow, record_id)): Path<(String, String)>,
) -> Result<Json<WorkflowRecord>, StatusCode> {
    let record = state
        .records
        .get(&workflow, &record_id, &state.namespace)
        .await
        .map_err(map_error)?;
    Ok(Json(record))
}

#[utoipa::path(
    delete,
    path = "/v0.1/workflow-records/{workflow}/{record_id}",
    params(
        ("workflow" = String, Path, description = "Workflow name"),
        ("record_id" = String, Path, description = "Record id")
    ),
    responses(
        (status = 204, description = "Record deleted"),
        (status = 404, description = "Record not found")
    ),
    tag = "workflow-records"
)]
pub async fn delete_record(
    State(state): State<AppState>,
    Path((workflow, record_id)): Path<(String, String)>,
) -> Result<StatusCode, StatusCode> {
    let deleted = state
        .records
        .delete(&workflow, &record_id, &state.namespace)
        .await
        .map_err(map_error)?;
    if deleted {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(StatusCode::NOT_FOUND)
    }
}
