// Team CRUD HTTP routes

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use troupe_core::resources::{TeamResource, TeamSpec};
use troupe_storage::TeamRegistry;

use super::common::{map_error, ListResponse};

#[derive(Clone)]
pub struct AppState {
    pub registry: TeamRegistry,
    pub namespace: String,
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/v0.1/teams", post(create_team).get(list_teams))
        .route(
            "/v0.1/teams/:name",
            get(get_team).patch(update_team).delete(delete_team),
        )
        .with_state(state)
}

#[utoipa::path(
    post,
    path = "/v0.1/teams",
    request_body = TeamSpec,
    responses(
        (status = 201, description = "Team created", body = TeamResource),
        (status = 409, description = "Team already exists")
    ),
    tag = "teams"
)]
pub async fn create_team(
    State(state): State<AppState>,
    Json(spec): Json<TeamSpec>,
) -> Result<(StatusCode, Json<TeamResource>), StatusCode> {
    let team = state
        .registry
        .create(spec, &state.namespace)
        .await
        .map_err(map_error)?;
    Ok((StatusCode::CREATED, Json(team)))
}

#[utoipa::path(
    get,
    path = "/v0.1/teams",
    responses((status = 200, body = ListResponse<TeamResource>)),
    tag = "teams"
)]
pub async fn list_teams(
    State(state): State<AppState>,
) -> Result<Json<ListResponse<TeamResource>>, StatusCode> {
    let teams = state
        .registry
        .list(&state.namespace)
        .await
        .map_err(map_error)?;
    Ok(Json(ListResponse::new(teams)))
}

#[utoipa::path(
    get,
    path = "/v0.1/teams/{name}",
    params(("name" = String, Path, description = "Team name")),
    responses(
        (status = 200, body = TeamResource),
        (status = 404, description = "Team not found")
    ),
    tag = "teams"
)]
pub async fn get_team(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<TeamResource>, StatusCode> {
    let team = state
        .registry
        .get(&name, &state.namespace)
        .await
        .map_err(map_error)?;
    Ok(Json(team))
}

#[utoipa::path(
    patch,
    path = "/v0.1/teams/{name}",
    params(("name" = String, Path, description = "Team name")),
    request_body = TeamSpec,
    responses(
        (status = 200, body = TeamResource),
        (status = 404, description = "Team not found")
    ),
    tag = "teams"
)]
pub async fn update_team(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(spec): Json<TeamSpec>,
) -> Result<Json<TeamResource>, StatusCode> {
    if spec.name != name {
        return Err(StatusCode::BAD_REQUEST);
    }
    let team = state
        .registry
        .update(spec, &state.namespace)
        .await
        .map_err(map_error)?;
    Ok(Json(team))
}

#[utoipa::path(
    delete,
    path = "/v0.1/teams/{name}",
    params(("name" = String, Path, description = "Team name")),
    responses(
        (status = 204, description = "Team deleted"),
        (status = 404, description = "Team not found")
    ),
    tag = "teams"
)]
pub async fn delete_team(
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
