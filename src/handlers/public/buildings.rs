use axum::extract::{Path, State};

use crate::handlers::AppState;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::inventory_service::{BuildingEnvelope, BuildingList};

/// GET /api/buildings - every building, ordered by id
pub async fn buildings_list(State(state): State<AppState>) -> ApiResult<BuildingList> {
    let buildings = state.service.list_buildings().await?;
    Ok(ApiResponse::success(buildings))
}

/// GET /api/buildings/:id
pub async fn building_get(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<BuildingEnvelope> {
    let building = state.service.get_building(&id).await?;
    Ok(ApiResponse::success(building))
}
