use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::info;

use crate::auth::{AccessGate, Identity};
use crate::database::models::{Building, Room, RoomAggregate, RoomSummary};
use crate::error::ApiError;
use crate::services::validation;
use crate::store::AggregateStore;

#[derive(Debug, Serialize)]
pub struct BuildingList {
    pub buildings: Vec<Building>,
}

#[derive(Debug, Serialize)]
pub struct BuildingEnvelope {
    pub building: Building,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedBuilding {
    pub building_id: String,
    pub deleted_rooms: u64,
    pub room_ids: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildingRooms {
    pub building_id: String,
    pub count: usize,
    pub rooms: Vec<RoomSummary>,
}

#[derive(Debug, Serialize)]
pub struct RoomMatches {
    pub rooms: Vec<RoomSummary>,
}

/// Response for create-room and delete-room
#[derive(Debug, Serialize)]
pub struct RoomRef {
    pub id: String,
}

/// Stateless orchestration over the store: gate, then shape validation, then one
/// store operation, then response shaping.
#[derive(Clone)]
pub struct InventoryService {
    store: Arc<dyn AggregateStore>,
    gate: Arc<dyn AccessGate>,
}

impl InventoryService {
    pub fn new(store: Arc<dyn AggregateStore>, gate: Arc<dyn AccessGate>) -> Self {
        Self { store, gate }
    }

    pub fn store(&self) -> &Arc<dyn AggregateStore> {
        &self.store
    }

    /// Run the access gate on its own, for rejections raised before a body is read
    pub fn authorize(&self, credential: Option<&str>) -> Result<Identity, ApiError> {
        self.gate.check(credential)
    }

    pub async fn list_buildings(&self) -> Result<BuildingList, ApiError> {
        let buildings = self.store.list_buildings().await?;
        Ok(BuildingList { buildings })
    }

    pub async fn get_building(&self, id: &str) -> Result<BuildingEnvelope, ApiError> {
        let building = self
            .store
            .fetch_building(id)
            .await?
            .ok_or_else(|| ApiError::not_found(format!("Building '{}' not found", id)))?;
        Ok(BuildingEnvelope { building })
    }

    pub async fn create_building(&self, credential: Option<&str>, body: &Value) -> Result<BuildingEnvelope, ApiError> {
        let identity = self.gate.check(credential)?;
        let new = validation::new_building(body)?;

        let building = self.store.create_building(Building::from(new)).await?;
        info!("{} created building {}", identity.username, building.id);
        Ok(BuildingEnvelope { building })
    }

    pub async fn update_building(
        &self,
        credential: Option<&str>,
        id: &str,
        body: &Value,
    ) -> Result<BuildingEnvelope, ApiError> {
        let identity = self.gate.check(credential)?;
        let patch = validation::building_patch(id, body)?;

        let building = self.store.update_building(id, &patch).await?;
        info!("{} updated building {}", identity.username, id);
        Ok(BuildingEnvelope { building })
    }

    pub async fn delete_building(&self, credential: Option<&str>, id: &str) -> Result<DeletedBuilding, ApiError> {
        let identity = self.gate.check(credential)?;

        let room_ids = self.store.list_room_ids(id).await?;
        let deleted_rooms = self.store.delete_building_cascade(id).await?;
        info!(
            "{} deleted building {} with {} room(s)",
            identity.username, id, deleted_rooms
        );

        Ok(DeletedBuilding {
            building_id: id.to_string(),
            deleted_rooms,
            room_ids,
        })
    }

    pub async fn get_room(&self, id: &str) -> Result<RoomAggregate, ApiError> {
        self.store
            .fetch_aggregate(id)
            .await?
            .ok_or_else(|| ApiError::not_found(format!("Room '{}' not found", id)))
    }

    pub async fn rooms_by_building(&self, building_id: &str) -> Result<BuildingRooms, ApiError> {
        let rooms = self.store.rooms_by_building(building_id).await?;
        if rooms.is_empty() {
            return Err(ApiError::not_found(format!(
                "No rooms found for building '{}'",
                building_id
            )));
        }

        Ok(BuildingRooms {
            building_id: building_id.to_string(),
            count: rooms.len(),
            rooms,
        })
    }

    pub async fn search_rooms(&self, term: Option<&str>) -> Result<RoomMatches, ApiError> {
        let term = validation::search_term(term)?;

        let rooms = self.store.search_rooms(&term).await?;
        if rooms.is_empty() {
            return Err(ApiError::not_found(format!("No rooms match '{}'", term)));
        }
        Ok(RoomMatches { rooms })
    }

    pub async fn create_room(&self, credential: Option<&str>, body: &Value) -> Result<RoomRef, ApiError> {
        let identity = self.gate.check(credential)?;
        let (new, children) = validation::new_room(body)?;

        let room = Room::from(new);
        let id = room.id.clone();
        let rows = children.row_count();
        self.store.create_aggregate(room, children).await?;

        info!("{} created room {} with {} child row(s)", identity.username, id, rows);
        Ok(RoomRef { id })
    }

    pub async fn update_room(
        &self,
        credential: Option<&str>,
        id: &str,
        body: &Value,
    ) -> Result<RoomAggregate, ApiError> {
        let identity = self.gate.check(credential)?;
        let update = validation::room_update(id, body)?;

        let room_patch = update.room.as_ref().filter(|patch| !patch.is_empty());
        let aggregate = self.store.update_aggregate(id, room_patch, &update.children).await?;

        info!("{} updated room {}", identity.username, id);
        Ok(aggregate)
    }

    pub async fn delete_room(&self, credential: Option<&str>, id: &str) -> Result<RoomRef, ApiError> {
        let identity = self.gate.check(credential)?;

        self.store.delete_aggregate(id).await?;
        info!("{} deleted room {}", identity.username, id);
        Ok(RoomRef { id: id.to_string() })
    }
}
