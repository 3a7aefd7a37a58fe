// Agent CRUD HTTP routes

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use troupe_core::resources::{AgentResource, AgentSpec};
use troupe_storage::AgentRegistry;

use super::common::{map_error, ListResponse};

/// App state for agent routes
#[derive(Clone)]
pub struct AppState {
    pub registry: AgentRegistry,
    pub namespace: String,
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/v0.1/agents", post(create_agent).get(list_agents))
        .route(
            "/v0.1/agents/:name",
            get(get_agent).patch(update_agent).delete(delete_agent),
        )
        .with_state(state)
}

/// POST /v0.1/agents - Declare a new agent
#[utoipa::path(
    post,
    path = "/v0.1/agents",
    request_body = AgentSpec,
    responses(
        (status = 201, description = "Agent created", body = AgentResource),
        (status = 409, description = "Agent already exists"),
        (status = 500, description = "Internal server error")
    ),
    tag = "agents"
)]
pub async fn create_agent(
    State(state): State<AppState>,
    Json(spec): Json<AgentSpec>,
) -> Result<(StatusCode, Json<AgentResource>), StatusCode> {
    let agent = state
        .registry
        .create(spec, &state.namespace)
        .await
        .map_err(map_error)?;
    Ok((StatusCode::CREATED, Json(agent)))
}

/// GET /v0.1/agents - List agents
#[utoipa::path(
    get,
    path = "/v0.1/agents",
    responses(
        (status = 200, description = "List of agents", body = ListResponse<AgentResource>),
        (status = 500, description = "Internal server error")
    ),
    tag = "agents"
)]
pub async fn list_agents(
    State(state): State<AppState>,
) -> Result<Json<ListResponse<AgentResource>>, StatusCode> {
    let agents = state
        .registry
        .list(&state.namespace)
        .await
        .map_err(map_error)?;
    Ok(Json(ListResponse::new(agents)))
}

/// GET /v0.1/agents/{name} - Get agent by name
#[utoipa::path(
    get,
    path = "/v0.1/agents/{name}",
    params(("name" = String, Path, description = "Agent name")),
    responses(
        (status = 200, description = "Agent found", body = AgentResource),
        (status = 404, description = "Agent not found"),
        (status = 500, description = "Internal server error")
    ),
    tag = "agents"
)]
pub async fn get_agent(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<AgentResource>, StatusCode> {
    let agent = state
        .registry
        .get(&name, &state.namespace)
        .await
        .map_err(map_error)?;
    Ok(Json(agent))
}

/// PATCH /v0.1/agents/{name} - Replace the agent's spec
#[utoipa::path(
    patch,
    path = "/v0.1/agents/{name}",
    params(("name" = String, Path, description = "Agent name")),
    request_body = AgentSpec,
    responses(
        (status = 200, description = "Agent updated", body = AgentResource),
        (status = 400, description = "Spec name does not match path"),
        (status = 404, description = "Agent not found"),
        (status = 500, description = "Internal server error")
    ),
    tag = "agents"
)]
pub async fn update_agent(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(spec): Json<AgentSpec>,
) -> Result<Json<AgentResource>, StatusCode> {
    if spec.name != name {
        return Err(StatusCode::BAD_REQUEST);
    }
    let agent = state
        .registry
        .update(spec, &state.namespace)
        .await
        .map_err(map_error)?;
    Ok(Json(agent))
}

/// DELETE /v0.1/agents/{name} - Delete agent
#[utoipa::path(
    delete,
    path = "/v0.1/agents/{name}",
    params(("name" = String, Path, description = "Agent name")),
    responses(
        (status = 204, description = "Agent deleted"),
        (status = 404, description = "Agent not found"),
        (status = 500, description = "Internal server error")
    ),
    tag = "agents"
)]
pub async fn delete_agent(
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
            registry: AgentRegistry::new(KvStore::in_memory()),
            namespace: "default".to_string(),
        })
    }

    fn spec_body() -> String {
        serde_json::json!({
            "name": "alice",
            "image": "troupe/agent:latest",
            "capabilities": {"network_access": true, "messaging_access": false},
        })
        .to_string()
    }

    fn request(
        method: &str,
        uri: &str,
        body: Option<String>,
    ) -> axum::http::Request<axum::body::Body> {
        let builder = axum::http::Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json");
        match body {
            Some(body) => builder.body(axum::body::Body::from(body)).unwrap(),
            None => builder.body(axum::body::Body::empty()).unwrap(),
        }
    }

    #[tokio::test]
    async fn create_then_get_round_trips() {
        let app = app();

        let created = app
            .clone()
            .oneshot(request("POST", "/v0.1/agents", Some(spec_body())))
            .await
            .unwrap();
        assert_eq!(created.status(), StatusCode::CREATED);

        let fetched = app
            .clone()
            .oneshot(request("GET", "/v0.1/agents/alice", None))
            .await
            .unwrap();
        assert_eq!(fetched.status(), StatusCode::OK);
        let body = fetched.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["spec"]["name"], "alice");
        assert_eq!(json["status"]["status"], "pending");
        assert_eq!(json["kind"], "Agent");
    }

    #[tokio::test]
    async fn duplicate_create_conflicts() {
        let app = app();
        let first = app
            .clone()
            .oneshot(request("POST", "/v0.1/agents", Some(spec_body())))
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::CREATED);

        let second = app
            .clone()
            .oneshot(request("POST", "/v0.1/agents", Some(spec_body())))
            .await
            .unwrap();
        assert_eq!(second.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn missing_agent_is_404() {
        let app = app();
        let fetched = app
            .clone()
            .oneshot(request("GET", "/v0.1/agents/ghost", None))
            .await
            .unwrap();
        assert_eq!(fetched.status(), StatusCode::NOT_FOUND);

        let deleted = app
            .oneshot(request("DELETE", "/v0.1/agents/ghost", None))
            .await
            .unwrap();
        assert_eq!(deleted.status(), StatusCode::NOT_FOUND);
    }
}
