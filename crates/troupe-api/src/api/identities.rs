// Identity CRUD HTTP routes

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use troupe_core::resources::{IdentityResource, IdentitySpec};
use troupe_storage::IdentityRegistry;

use super::common::{map_error, ListResponse};

#[derive(Clone)]
pub struct AppState {
    pub registry: IdentityRegistry,
    pub namespace: String,
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/v0.1/identities", post(create_identity).get(list_identities))
        .route(
            "/v0.1/identities/:name",
            get(get_identity)
                .patch(update_identity)
                .delete(delete_identity),
        )
        .with_state(state)
}

#[utoipa::path(
    post,
    path = "/v0.1/identities",
    request_body = IdentitySpec,
    responses(
        (status = 201, description = "Identity created", body = IdentityResource),
        (status = 409, description = "Identity already exists")
    ),
    tag = "identities"
)]
pub async fn create_identity(
    State(state): State<AppState>,
    Json(spec): Json<IdentitySpec>,
) -> Result<(StatusCode, Json<IdentityResource>), StatusCode> {
    let identity = state
        .registry
        .create(spec, &state.namespace)
        .await
        .map_err(map_error)?;
    Ok((StatusCode::CREATED, Json(identity)))
}

#[utoipa::path(
    get,
    path = "/v0.1/identities",
    responses((status = 200, body = ListResponse<IdentityResource>)),
    tag = "identities"
)]
pub async fn list_identities(
    State(state): State<AppState>,
) -> Result<Json<ListResponse<IdentityResource>>, StatusCode> {
    let identities = state
        .registry
        .list(&state.namespace)
        .await
        .map_err(map_error)?;
    Ok(Json(ListResponse::new(identities)))
}

#[utoipa::path(
    get,
    path = "/v0.1/identities/{name}",
    params(("name" = String, Path, description = "Identity name")),
    responses(
        (status = 200, body = IdentityResource),
        (status = 404, description = "Identity not found")
    ),
    tag = "identities"
)]
pub async fn get_identity(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<IdentityResource>, StatusCode> {
    let identity = state
        .registry
        .get(&name, &state.namespace)
        .await
        .map_err(map_error)?;
    Ok(Json(identity))
}

#[utoipa::path(
    patch,
    path = "/v0.1/identities/{name}",
    params(("name" = String, Path, description = "Identity name")),
    request_body = IdentitySpec,
    responses(
        (status = 200, body = IdentityResource),
        (status = 404, description = "Identity not found")
    ),
    tag = "identities"
)]
pub async fn update_identity(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(spec): Json<IdentitySpec>,
) -> Result<Json<IdentityResource>, StatusCode> {
    if spec.name != name {
        return Err(StatusCode::BAD_REQUEST);
    }
    let identity = state
        .registry
        .update(spec, &state.namespace)
        .await
        .map_err(map_error)?;
    Ok(Json(identity))
}

#[utoipa::path(
    delete,
    path = "/v0.1/identities/{name}",
    params(("name" = String, Path, description = "Identity name")),
    responses(
        (status = 204, description = "Identity deleted"),
        (status = 404, description = "Identity not found")
    ),
    tag = "identities"
)]
pub async fn delete_identity(
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
