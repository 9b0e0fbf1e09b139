use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use serde_json::Value;

use super::read_body;
use crate::handlers::AppState;
use crate::middleware::{ApiResponse, ApiResult, Credential};
use crate::services::inventory_service::{BuildingEnvelope, DeletedBuilding};

/// POST /api/buildings - body `{id, site, designation}`
pub async fn building_create(
    State(state): State<AppState>,
    credential: Credential,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<BuildingEnvelope> {
    let body = read_body(&state.service, &credential, body)?;
    let building = state.service.create_building(credential.as_deref(), &body).await?;
    Ok(ApiResponse::created(building))
}

/// PUT /api/buildings/:id - body `{site?, designation?}`
pub async fn building_update(
    State(state): State<AppState>,
    credential: Credential,
    Path(id): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<BuildingEnvelope> {
    let body = read_body(&state.service, &credential, body)?;
    let building = state.service.update_building(credential.as_deref(), &id, &body).await?;
    Ok(ApiResponse::success(building))
}

/// DELETE /api/buildings/:id - removes the building with all its rooms
pub async fn building_delete(
    State(state): State<AppState>,
    credential: Credential,
    Path(id): Path<String>,
) -> ApiResult<DeletedBuilding> {
    let deleted = state.service.delete_building(credential.as_deref(), &id).await?;
    Ok(ApiResponse::success(deleted))
}
