// Workspace read HTTP routes
//
// Workspaces are created by the integration adapter, so the HTTP surface
// only reads and deletes them.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use troupe_core::resources::WorkspaceResource;
use troupe_storage::WorkspaceRegistry;

use super::common::{map_error, ListResponse};

#[derive(Clone)]
pub struct AppState {
    pub registry: WorkspaceRegistry,
    pub namespace: String,
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/v0.1/workspaces", get(list_workspaces))
        .route(
            "/v0.1/workspaces/:name",
            get(get_workspace).delete(delete_workspace),
        )
        .with_state(state)
}

#[utoipa::path(
    get,
    path = "/v0.1/workspaces",
    responses((status = 200, body = ListResponse<WorkspaceResource>)),
    tag = "workspaces"
)]
pub async fn list_workspaces(
    State(state): State<AppState>,
) -> Result<Json<ListResponse<WorkspaceResource>>, StatusCode> {
    let workspaces = state
        .registry
        .list(&state.namespace)
        .await
        .map_err(map_error)?;
    Ok(Json(ListResponse::new(workspaces)))
}

#[utoipa::path(
    get,
    path = "/v0.1/workspaces/{name}",
    params(("name" = String, Path, description = "Workspace name")),
    responses(
        (status = 200, body = WorkspaceResource),
        (status = 404, description = "Workspace not found")
    ),
    tag = "workspaces"
)]
pub async fn get_workspace(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<WorkspaceResource>, StatusCode> {
    let workspace = state
        .registry
        .get(&name, &state.namespace)
        .await
        .map_err(map_error)?;
    Ok(Json(workspace))
}

#[utoipa::path(
    delete,
    path = "/v0.1/workspaces/{name}",
    params(("name" = String, Path, description = "Workspace name")),
    responses(
        (status = 204, description = "Workspace deleted"),
        (status = 404, description = "Workspace not found")
    ),
    tag = "workspaces"
)]
pub async fn delete_workspace(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<StatusCode, StatusCode> {
    let deleted = state
        .registry
        .delete(&name, &state.namespace)
        .await
        .map_err(map_error)?;
    if deleted {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(StatusCode::NOT_FOUND)
    }
}
