// Task CRUD HTTP routes
//
// Creating a task is what sets the task controller in motion: the create
// lands in the store, the watch fires, and the controller assigns an agent.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use troupe_core::resources::{TaskResource, TaskSpec};
use troupe_storage::TaskRegistry;

use super::common::{map_error, ListResponse};

#[derive(Clone)]
pub struct AppState {
    pub registry: TaskRegistry,
    pub namespace: String,
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/v0.1/tasks", post(create_task).get(list_tasks))
        .route(
            "/v0.1/tasks/:name",
            get(get_task).patch(update_task).delete(delete_task),
        )
        .with_state(state)
}

#[utoipa::path(
    post,
    path = "/v0.1/tasks",
    request_body = TaskSpec,
    responses(
        (status = 201, description = "Task created", body = TaskResource),
        (status = 409, description = "Task already exists")
    ),
    tag = "tasks"
)]
pub async fn create_task(
    State(state): State<AppState>,
    Json(spec): Json<TaskSpec>,
) -> Result<(StatusCode, Json<TaskResource>), StatusCode> {
    let task = state
        .registry
        .create(spec, &state.namespace)
        .await
        .map_err(map_error)?;
    Ok((StatusCode::CREATED, Json(task)))
}

#[utoipa::path(
    get,
    path = "/v0.1/tasks",
    responses((status = 200, body = ListResponse<TaskResource>)),
    tag = "tasks"
)]
pub async fn list_tasks(
    State(state): State<AppState>,
) -> Result<Json<ListResponse<TaskResource>>, StatusCode> {
    let tasks = state
        .registry
        .list(&state.namespace)
        .await
        .map_err(map_error)?;
    Ok(Json(ListResponse::new(tasks)))
}

#[utoipa::path(
    get,
    path = "/v0.1/tasks/{name}",
    params(("name" = String, Path, description = "Task name")),
    responses(
        (status = 200, body = TaskResource),
        (status = 404, description = "Task not found")
    ),
    tag = "tasks"
)]
pub async fn get_task(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<TaskResource>, StatusCode> {
    let task = state
        .registry
        .get(&name, &state.namespace)
        .await
        .map_err(map_error)?;
    Ok(Json(task))
}

#[utoipa::path(
    patch,
    path = "/v0.1/tasks/{name}",
    params(("name" = String, Path, description = "Task name")),
    request_body = TaskSpec,
    responses(
        (status = 200, body = TaskResource),
        (status = 404, description = "Task not found")
    ),
    tag = "tasks"
)]
pub async fn update_task(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(spec): Json<TaskSpec>,
) -> Result<Json<TaskResource>, StatusCode> {
    if spec.name != name {
        return Err(StatusCode::BAD_REQUEST);
    }
    let task = state
        .registry
        .update(spec, &state.namespace)
        .await
        .map_err(map_error)?;
    Ok(Json(task))
}

#[utoipa::path(
    delete,
    path = "/v0.1/tasks/{name}",
    params(("name" = String, Path, description = "Task name")),
    responses(
        (status = 204, description = "Task deleted"),
        (status = 404, description = "Task not found")
    ),
    tag = "tasks"
)]
pub async fn delete_task(
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
