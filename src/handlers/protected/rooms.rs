use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use serde_json::Value;

use super::read_body;
use crate::database::models::RoomAggregate;
use crate::handlers::AppState;
use crate::middleware::{ApiResponse, ApiResult, Credential};
use crate::services::inventory_service::RoomRef;

/**
 * POST /api/rooms - register a room with its child collections
 *
 * ```json
 * {
 *   "room": {"id": "S1", "function": "Office", "ceilingArea": 20.5, "buildingId": "B1"},
 *   "doors": [{"type": "Wood", "count": 1}],
 *   "windows": [],
 *   "walls": [{"type": "Plaster", "surface": 32}],
 *   "floors": [],
 *   "lamps": []
 * }
 * ```
 */
pub async fn room_create(
    State(state): State<AppState>,
    credential: Credential,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<RoomRef> {
    let body = read_body(&state.service, &credential, body)?;
    let created = state.service.create_room(credential.as_deref(), &body).await?;
    Ok(ApiResponse::created(created))
}

/// PUT /api/rooms/:id - partial room update plus type-scoped child replacement
pub async fn room_update(
    State(state): State<AppState>,
    credential: Credential,
    Path(id): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<RoomAggregate> {
    let body = read_body(&state.service, &credential, body)?;
    let aggregate = state.service.update_room(credential.as_deref(), &id, &body).await?;
    Ok(ApiResponse::success(aggregate))
}

/// DELETE /api/rooms/:id
pub async fn room_delete(
    State(state): State<AppState>,
    credential: Credential,
    Path(id): Path<String>,
) -> ApiResult<RoomRef> {
    let deleted = state.service.delete_room(credential.as_deref(), &id).await?;
    Ok(ApiResponse::success(deleted))
}
