// Workflow CRUD HTTP routes
//
// Create and update run the step graph validation; a cyclic graph is a 400
// and nothing is written.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use troupe_core::resources::{WorkflowResource, WorkflowSpec};
use troupe_storage::WorkflowRegistry;

use super::common::{map_error, ListResponse};

#[derive(Clone)]
pub struct AppState {
    pub registry: WorkflowRegistry,
    pub namespace: String,
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/v0.1/workflows", post(create_workflow).get(list_workflows))
        .route(
            "/v0.1/workflows/:name",
            get(get_workflow)
                .patch(update_workflow)
                .delete(delete_workflow),
        )
        .with_state(state)
}

#[utoipa::path(
    post,
    path = "/v0.1/workflows",
    request_body = WorkflowSpec,
    responses(
        (status = 201, description = "Workflow created", body = WorkflowResource),
        (status = 400, description = "Step graph is invalid (e.g. cyclic)"),
        (status = 409, description = "Workflow already exists")
    ),
    tag = "workflows"
)]
pub async fn create_workflow(
    State(state): State<AppState>,
    Json(spec): Json<WorkflowSpec>,
) -> Result<(StatusCode, Json<WorkflowResource>), StatusCode> {
    let workflow = state
        .registry
        .create(spec, &state.namespace)
        .await
        .map_err(map_error)?;
    Ok((StatusCode::CREATED, Json(workflow)))
}

#[utoipa::path(
    get,
    path = "/v0.1/workflows",
    responses((status = 200, body = ListResponse<WorkflowResource>)),
    tag = "workflows"
)]
pub async fn list_workflows(
    State(state): State<AppState>,
) -> Result<Json<ListResponse<WorkflowResource>>, StatusCode> {
    let workflows = state
        .registry
        .list(&state.namespace)
        .await
        .map_err(map_error)?;
    Ok(Json(ListResponse::new(workflows)))
}

#[utoipa::path(
    get,
    path = "/v0.1/workflows/{name}",
    params(("name" = String, Path, description = "Workflow name")),
    responses(
        (status = 200, body = WorkflowResource),
        (status = 404, description = "Workflow not found")
    ),
    tag = "workflows"
)]
pub async fn get_workflow(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<WorkflowResource>, StatusCode> {
    let workflow = state
        .registry
        .get(&name, &state.namespace)
        .await
        .map_err(map_error)?;
    Ok(Json(workflow))
}

#[utoipa::path(
    patch,
    path = "/v0.1/workflows/{name}",
    params(("name" = String, Path, description = "Workflow name")),
    request_body = WorkflowSpec,
    responses(
        (status = 200, body = WorkflowResource),
        (status = 400, description = "Step graph is invalid (e.g. cyclic)"),
        (status = 404, description = "Workflow not found")
    ),
    tag = "workflows"
)]
pub async fn update_workflow(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(spec): Json<WorkflowSpec>,
) -> Result<Json<WorkflowResource>, StatusCode> {
    if spec.name != name {
        return Err(StatusCode::BAD_REQUEST);
    }
    let workflow = state
        .registry
        .update(spec, &state.namespace)
        .await
        .map_err(map_error)?;
    Ok(Json(workflow))
}

#[utoipa::path(
    delete,
    path = "/v0.1/workflows/{name}",
    params(("name" = String, Path, description = "Workflow name")),
    responses(
        (status = 204, description = "Workflow deleted"),
        (status = 404, description = "Workflow not found")
    ),
    tag = "workflows"
)]
pub async fn delete_workflow(
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

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use tower::ServiceExt;
    use troupe_storage::KvStore;

    fn app() -> Router {
        routes(AppState {
            registry: WorkflowRegistry::new(KvStore::in_memory()),
            namespace: "default".to_string(),
        })
    }

    fn post_workflow(body: serde_json::Value) -> axum::http::Request<axum::body::Body> {
        axum::http::Request::builder()
            .method("POST")
            .uri("/v0.1/workflows")
            .header("content-type", "application/json")
            .body(axum::body::Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn create_derives_sorted_steps() {
        let app = app();
        let body = serde_json::json!({
            "name": "chain",
            "description": "",
            "team": "red",
            "inputs": [{"type": "text", "name": "q", "description": ""}],
            "outputs": [{"type": "text", "name": "a", "description": ""}],
            "steps": {
                "s2": {"role": "R", "action": "A", "inputMap": {"in": "s1.out"}},
                "s1": {"role": "R", "action": "A", "inputMap": {"in": "workflow.q"}},
            },
        });
        let response = app.oneshot(post_workflow(body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        let sorted: Vec<&str> = json["spec"]["derived_state"]["sorted_steps"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap())
            .collect();
        assert_eq!(sorted, vec!["s1", "s2"]);
    }

    #[tokio::test]
    async fn cyclic_workflow_is_rejected_with_400() {
        let app = app();
        let body = serde_json::json!({
            "name": "looped",
            "description": "",
            "team": "red",
            "steps": {
                "s1": {"role": "R", "action": "A", "inputMap": {"x": "s2.y"}},
                "s2": {"role": "R", "action": "A", "inputMap": {"y": "s1.x"}},
            },
        });
        let response = app.clone().oneshot(post_workflow(body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        // Nothing was written
        let listed = app
            .oneshot(
                axum::http::Request::builder()
                    .uri("/v0.1/workflows")
                    .body(axum::body::Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let bytes = listed.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert!(json["data"].as_array().unwrap().is_empty());
    }
}
