use axum::extract::{Path, Query, State};
use serde::Deserialize;

use crate::database::models::RoomAggregate;
use crate::handlers::AppState;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::inventory_service::{BuildingRooms, RoomMatches};

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub search: Option<String>,
}

/// GET /api/rooms/:id - the room with all five child collections
pub async fn room_get(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<RoomAggregate> {
    let aggregate = state.service.get_room(&id).await?;
    Ok(ApiResponse::success(aggregate))
}

/// GET /api/rooms/building/:id
pub async fn rooms_by_building(
    State(state): State<AppState>,
    Path(building_id): Path<String>,
) -> ApiResult<BuildingRooms> {
    let rooms = state.service.rooms_by_building(&building_id).await?;
    Ok(ApiResponse::success(rooms))
}

/// GET /api/rooms/search?search=term - case-insensitive match on id, function and occupant ("none" when vacant)
pub async fn rooms_search(State(state): State<AppState>, Query(query): Query<SearchQuery>) -> ApiResult<RoomMatches> {
    let rooms = state.service.search_rooms(query.search.as_deref()).await?;
    Ok(ApiResponse::success(rooms))
}
